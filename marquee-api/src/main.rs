use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use marquee_api::{
    app,
    state::{AppState, AuthConfig, Repositories},
    worker,
};
use marquee_core::events::EventPublisher;
use marquee_hold::HoldConfig;
use marquee_store::app_config::{Config, StorageBackend};
use marquee_store::{
    DbClient, RedisClient, StoreOrderRepository, StoreSeatRepository, StoreShowtimeRepository,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    let repos = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; state is lost on restart");
            Repositories::memory()
        }
        StorageBackend::Postgres => connect_stores(&config).await?,
    };

    let publishers = event_publishers(&config)?;

    let reservation = &config.reservation;
    let hold_config = HoldConfig {
        default_ttl: chrono::Duration::seconds(i64::try_from(reservation.hold_ttl_seconds)?),
        max_seats_per_hold: reservation.max_seats_per_hold,
    };

    let state = AppState::new(
        repos,
        publishers,
        hold_config,
        config.retry,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    )?;

    worker::start_hold_sweeper(
        state.holds.clone(),
        Duration::from_secs(reservation.sweep_interval_seconds),
        state.metrics.clone(),
    );

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn connect_stores(config: &Config) -> anyhow::Result<Repositories> {
    let db_url = config
        .database
        .url
        .as_deref()
        .context("database.url is required for the postgres backend")?;
    let redis_url = config
        .redis
        .url
        .as_deref()
        .context("redis.url is required for the postgres backend")?;

    let db = DbClient::new(db_url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await?;

    let redis = RedisClient::new(redis_url).context("Invalid Redis URL")?;
    redis.ping().await.context("Failed to reach Redis")?;

    Ok(Repositories {
        showtimes: Arc::new(StoreShowtimeRepository::new(db.pool.clone())),
        seats: Arc::new(StoreSeatRepository::new(db.pool.clone())),
        holds: Arc::new(redis),
        orders: Arc::new(StoreOrderRepository::new(db.pool.clone())),
    })
}

#[cfg(feature = "kafka")]
fn event_publishers(config: &Config) -> anyhow::Result<Vec<Arc<dyn EventPublisher>>> {
    match config.kafka.brokers.as_deref() {
        Some(brokers) => {
            let producer = marquee_store::KafkaPublisher::new(brokers)
                .context("Failed to create Kafka producer")?;
            tracing::info!("Publishing domain events to Kafka at {}", brokers);
            Ok(vec![Arc::new(producer)])
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(not(feature = "kafka"))]
fn event_publishers(config: &Config) -> anyhow::Result<Vec<Arc<dyn EventPublisher>>> {
    if config.kafka.brokers.is_some() {
        tracing::warn!("kafka.brokers is set but the kafka feature is disabled");
    }
    Ok(Vec::new())
}
