use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use marquee_api::{
    app,
    middleware::Claims,
    state::{AppState, AuthConfig, Repositories},
};
use marquee_core::retry::RetryPolicy;
use marquee_hold::HoldConfig;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn test_app() -> Router {
    let state = AppState::new(
        Repositories::memory(),
        Vec::new(),
        HoldConfig::default(),
        RetryPolicy::none(),
        AuthConfig { secret: SECRET.into() },
    )
    .unwrap();
    app(state)
}

fn token(sub: &str, role: &str) -> String {
    let claims = Claims {
        sub: sub.into(),
        role: role.into(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Creates a showtime with seats A1..B3 and returns its id and seat ids in order
async fn setup_showtime(app: &Router, admin: &str) -> (String, Vec<String>) {
    let (status, showtime) = send(
        app,
        Method::POST,
        "/v1/showtimes",
        Some(admin),
        Some(json!({
            "movieTitle": "Metropolis",
            "theaterName": "Odeon",
            "roomName": "Hall 1",
            "startsAt": "2030-01-01T20:00:00Z",
            "ticketPrice": 50
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let showtime_id = showtime["id"].as_str().unwrap().to_string();

    let (status, seats) = send(
        app,
        Method::POST,
        &format!("/v1/showtimes/{}/seats", showtime_id),
        Some(admin),
        Some(json!({ "rows": ["A", "B"], "columns": [1, 2, 3] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(seats.as_array().unwrap().len(), 6);

    let (status, listed) = send(
        app,
        Method::GET,
        &format!("/v1/showtimes/{}/seats", showtime_id),
        Some(admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    let names: Vec<&str> = listed.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["A1", "A2", "A3", "B1", "B2", "B3"]);
    let ids = listed
        .iter()
        .map(|s| s["seatId"].as_str().unwrap().to_string())
        .collect();

    (showtime_id, ids)
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/v1/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/v1/orders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_clerks_cannot_create_showtimes() {
    let app = test_app();
    let clerk = token("clerk-1", "CLERK");
    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/showtimes",
        Some(&clerk),
        Some(json!({
            "movieTitle": "M",
            "theaterName": "T",
            "roomName": "R",
            "startsAt": "2030-01-01T20:00:00Z",
            "ticketPrice": 10
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_counter_sale_flow() {
    let app = test_app();
    let admin = token("admin-1", "ADMIN");
    let clerk = token("clerk-1", "CLERK");
    let rival = token("clerk-2", "CLERK");
    let (showtime_id, seats) = setup_showtime(&app, &admin).await;

    // Clerk holds A1 and A2
    let (status, hold) = send(
        &app,
        Method::POST,
        &format!("/v1/showtimes/{}/holds", showtime_id),
        Some(&clerk),
        Some(json!({ "seatIds": [seats[0], seats[1]] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let hold_token = hold["holdToken"].as_str().unwrap().to_string();

    // A second clerk loses A2 and nothing of theirs is held
    let (status, conflict) = send(
        &app,
        Method::POST,
        &format!("/v1/showtimes/{}/holds", showtime_id),
        Some(&rival),
        Some(json!({ "seatIds": [seats[1], seats[2]] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(conflict["seatIds"], json!([seats[1]]));

    let (_, map) = send(
        &app,
        Method::GET,
        &format!("/v1/showtimes/{}/seat-map", showtime_id),
        Some(&clerk),
        None,
    )
    .await;
    assert_eq!(map["held"], 2);
    assert_eq!(map["free"], 4);

    // Cash checkout
    let (status, checkout) = send(
        &app,
        Method::POST,
        "/v1/orders",
        Some(&clerk),
        Some(json!({
            "showtimeId": showtime_id,
            "holdToken": hold_token,
            "paymentMethod": "OFFLINE",
            "customerName": "Ada",
            "amountTendered": 120
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(checkout["totalAmount"], 100);
    assert_eq!(checkout["changeDue"], 20);
    assert_eq!(checkout["status"], "PAID");
    assert_eq!(checkout["tickets"].as_array().unwrap().len(), 2);
    let order_id = checkout["orderId"].as_str().unwrap().to_string();

    let (_, map) = send(
        &app,
        Method::GET,
        &format!("/v1/showtimes/{}/seat-map", showtime_id),
        Some(&clerk),
        None,
    )
    .await;
    assert_eq!(map["booked"], 2);
    assert_eq!(map["held"], 0);

    let (status, view) = send(&app, Method::GET, &format!("/v1/orders/{}", order_id), Some(&clerk), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["seatNames"], json!(["A1", "A2"]));
    assert_eq!(view["movieTitle"], "Metropolis");

    // Cancelling returns the seats to the pool
    let (status, view) = send(
        &app,
        Method::PUT,
        &format!("/v1/orders/{}/status", order_id),
        Some(&clerk),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "CANCELLED");

    let (_, map) = send(
        &app,
        Method::GET,
        &format!("/v1/showtimes/{}/seat-map", showtime_id),
        Some(&clerk),
        None,
    )
    .await;
    assert_eq!(map["free"], 6);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/v1/orders/{}/status", order_id),
        Some(&clerk),
        Some(json!({ "status": "PAID" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_release_twice_is_no_content() {
    let app = test_app();
    let admin = token("admin-1", "ADMIN");
    let clerk = token("clerk-1", "CLERK");
    let (showtime_id, seats) = setup_showtime(&app, &admin).await;

    let (_, hold) = send(
        &app,
        Method::POST,
        &format!("/v1/showtimes/{}/holds", showtime_id),
        Some(&clerk),
        Some(json!({ "seatIds": [seats[3]] })),
    )
    .await;
    let uri = format!("/v1/holds/{}", hold["holdToken"].as_str().unwrap());

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&clerk), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&clerk), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_order_listing_is_scoped_to_customer() {
    let app = test_app();
    let admin = token("admin-1", "ADMIN");
    let customer = token("cust-7", "CUSTOMER");
    let (showtime_id, seats) = setup_showtime(&app, &admin).await;

    let (_, hold) = send(
        &app,
        Method::POST,
        &format!("/v1/showtimes/{}/holds", showtime_id),
        Some(&customer),
        Some(json!({ "seatIds": [seats[5]] })),
    )
    .await;
    let (status, checkout) = send(
        &app,
        Method::POST,
        "/v1/orders",
        Some(&customer),
        Some(json!({
            "showtimeId": showtime_id,
            "holdToken": hold["holdToken"],
            "paymentMethod": "online"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(checkout["status"], "PENDING");

    let (status, _) = send(&app, Method::GET, "/v1/orders?all=true", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/v1/orders?customerId=cust-8", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, mine) = send(&app, Method::GET, "/v1/orders", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["customerId"], "cust-7");

    let (status, all) = send(&app, Method::GET, "/v1/orders?all=true", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::GET, "/v1/orders", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Only staff can confirm payment
    let uri = format!("/v1/orders/{}/status", checkout["orderId"].as_str().unwrap());
    let (status, _) = send(&app, Method::PUT, &uri, Some(&customer), Some(json!({ "status": "PAID" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Showtimes with orders cannot be deleted
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/v1/showtimes/{}", showtime_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_checkout_with_expired_hold_is_gone() {
    let app = test_app();
    let admin = token("admin-1", "ADMIN");
    let clerk = token("clerk-1", "CLERK");
    let (showtime_id, seats) = setup_showtime(&app, &admin).await;

    let (status, hold) = send(
        &app,
        Method::POST,
        &format!("/v1/showtimes/{}/holds", showtime_id),
        Some(&clerk),
        Some(json!({ "seatIds": [seats[0]], "ttlSeconds": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/orders",
        Some(&clerk),
        Some(json!({
            "showtimeId": showtime_id,
            "holdToken": hold["holdToken"],
            "paymentMethod": "offline"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn test_health_and_metrics_are_public() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("marquee_holds_acquired_total"));
}
