use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use marquee_catalog::{PricingPolicy, SeatInventory};
use marquee_core::events::{DomainEvent, EventPublisher};
use marquee_core::identity::{Principal, Role};
use marquee_core::repository::OrderRepository;
use marquee_core::retry::{retry_read, RetryPolicy};
use marquee_core::{CoreError, CoreResult};
use marquee_hold::HoldManager;
use marquee_shared::models::events::{OrderPlacedEvent, OrderStatusChangedEvent};
use marquee_shared::pii::Masked;
use marquee_shared::{
    HoldToken, Order, OrderFilter, OrderStatus, PaymentMethod, Seat, SeatStatus, SeatTransition,
    Ticket,
};

/// Checkout request: turn a live hold into an order
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub showtime_id: Uuid,
    pub hold_token: HoldToken,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    /// Cash handed over at the counter, offline payment only
    pub amount_tendered: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct Checkout {
    pub order: Order,
    pub change_due: Option<i64>,
}

/// Durable orders and their lifecycle
#[derive(Clone)]
pub struct OrderLedger {
    inventory: SeatInventory,
    holds: HoldManager,
    orders: Arc<dyn OrderRepository>,
    pricing: PricingPolicy,
    events: Arc<dyn EventPublisher>,
    retry: RetryPolicy,
}

impl OrderLedger {
    pub fn new(
        inventory: SeatInventory,
        holds: HoldManager,
        orders: Arc<dyn OrderRepository>,
        events: Arc<dyn EventPublisher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inventory,
            holds,
            orders,
            pricing: PricingPolicy::new(),
            events,
            retry,
        }
    }

    pub async fn create_order(&self, principal: &Principal, req: CreateOrder) -> CoreResult<Checkout> {
        let hold = self.holds.commit(req.hold_token).await?;
        if hold.showtime_id != req.showtime_id {
            return Err(CoreError::ValidationError(format!(
                "hold {} belongs to another showtime",
                hold.token
            )));
        }

        let showtime = self.inventory.get_showtime(req.showtime_id).await?;
        let total = self.pricing.compute_total(&showtime, hold.seat_ids.len())?;

        let change_due = match (req.payment_method, req.amount_tendered) {
            (PaymentMethod::Offline, Some(tendered)) => Some(self.pricing.change_due(total, tendered)?),
            (PaymentMethod::Online, Some(_)) => {
                return Err(CoreError::ValidationError(
                    "amount tendered only applies to offline payment".into(),
                ));
            }
            (_, None) => None,
        };

        // Seat order, not selection order, so receipts read A1, A2, A10
        let held: HashSet<Uuid> = hold.seat_ids.iter().copied().collect();
        let seats: Vec<Seat> = self
            .inventory
            .list_seats(req.showtime_id)
            .await?
            .into_iter()
            .filter(|seat| held.contains(&seat.id))
            .collect();
        if seats.len() != held.len() {
            return Err(CoreError::NotFound(format!(
                "seats of hold {} in showtime {}",
                hold.token, req.showtime_id
            )));
        }

        // Customers can only buy for themselves
        let customer_id = match principal.role {
            Role::Customer => Some(principal.subject.clone()),
            _ => req.customer_id,
        };

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let tickets: Vec<Ticket> = seats
            .iter()
            .map(|seat| Ticket::new(order_id, seat.id, seat.name()))
            .collect();

        let order = Order {
            id: order_id,
            showtime_id: req.showtime_id,
            customer_id,
            customer_name: req.customer_name.map(Masked),
            clerk_id: principal.subject.clone(),
            payment_method: req.payment_method,
            status: req.payment_method.initial_status(),
            total_amount: total,
            tickets,
            created_at: now,
            updated_at: now,
        };

        // Single unit of work, never retried
        self.orders
            .commit_order(&order, &SeatTransition::book(hold.token, order.id))
            .await?;

        if let Err(e) = self.holds.finish(hold.token).await {
            warn!("Order {} placed but hold {} record not dropped: {}", order.id, hold.token, e);
        }

        info!(
            "Order {} placed by {}: {} seats, total {}, status {}",
            order.id,
            principal.subject,
            order.tickets.len(),
            order.total_amount,
            order.status
        );

        self.events
            .publish(DomainEvent::seats_changed(order.showtime_id, order.seat_ids(), SeatStatus::Booked))
            .await;
        self.events
            .publish(DomainEvent::OrderPlaced(OrderPlacedEvent {
                order_id: order.id,
                showtime_id: order.showtime_id,
                customer_id: order.customer_id.clone(),
                total_amount: order.total_amount,
                seat_count: order.tickets.len(),
                timestamp: now.timestamp(),
            }))
            .await;

        Ok(Checkout { order, change_due })
    }

    pub async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> CoreResult<Order> {
        let current = self.get_order(order_id).await?;
        if !current.status.can_transition_to(status) {
            return Err(CoreError::InvalidTransition {
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        let order = self
            .orders
            .update_order_status(order_id, current.status, status)
            .await?;
        info!("Order {} {} -> {}", order_id, current.status, status);

        if status == OrderStatus::Cancelled {
            let seat_ids = order.seat_ids();
            match self
                .inventory
                .transition_seats(order.showtime_id, &seat_ids, &SeatTransition::unbook(order.id))
                .await
            {
                Ok(()) => {
                    self.events
                        .publish(DomainEvent::seats_changed(order.showtime_id, seat_ids, SeatStatus::Free))
                        .await;
                }
                // The order record is what matters; seats are reconciled by hand
                Err(e) => warn!("Cancelled order {} but could not release its seats: {}", order_id, e),
            }
        }

        self.events
            .publish(DomainEvent::OrderStatusChanged(OrderStatusChangedEvent {
                order_id,
                from: current.status,
                to: status,
                timestamp: Utc::now().timestamp(),
            }))
            .await;

        Ok(order)
    }

    /// Hard delete; still-booked seats go back to FREE in the same transaction
    pub async fn delete_order(&self, order_id: Uuid) -> CoreResult<()> {
        let order = self.get_order(order_id).await?;
        let released = self.orders.delete_order(order_id).await?;
        info!("Order {} deleted, {} seats released", order_id, released.len());

        if !released.is_empty() {
            self.events
                .publish(DomainEvent::seats_changed(order.showtime_id, released, SeatStatus::Free))
                .await;
        }
        Ok(())
    }

    pub async fn get_order(&self, order_id: Uuid) -> CoreResult<Order> {
        let orders = &self.orders;
        retry_read(&self.retry, move || orders.get_order(order_id))
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))
    }

    /// Newest first
    pub async fn list_orders(&self, filter: &OrderFilter) -> CoreResult<Vec<Order>> {
        let orders = &self.orders;
        retry_read(&self.retry, move || orders.list_orders(filter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marquee_catalog::SeatLayout;
    use marquee_core::events::NoopPublisher;
    use marquee_core::repository::ShowtimeRepository;
    use marquee_hold::HoldConfig;
    use marquee_shared::{Seat, Showtime};
    use marquee_store::MemoryStore;

    struct Fixture {
        ledger: OrderLedger,
        holds: HoldManager,
        inventory: SeatInventory,
        showtime: Showtime,
        seats: Vec<Seat>,
        clerk: Principal,
    }

    impl Fixture {
        fn seat(&self, name: &str) -> Uuid {
            self.seats.iter().find(|s| s.name() == name).map(|s| s.id).unwrap()
        }

        async fn status(&self, name: &str) -> SeatStatus {
            self.inventory.get_seat(self.seat(name)).await.unwrap().status
        }

        async fn hold(&self, names: &[&str]) -> HoldToken {
            let ids: Vec<Uuid> = names.iter().map(|n| self.seat(n)).collect();
            self.holds
                .acquire(&self.clerk, self.showtime.id, &ids, None)
                .await
                .unwrap()
                .token
        }

        fn checkout(&self, token: HoldToken, method: PaymentMethod) -> CreateOrder {
            CreateOrder {
                showtime_id: self.showtime.id,
                hold_token: token,
                payment_method: method,
                customer_id: Some("cust-1".into()),
                customer_name: Some("Tran Thi B".into()),
                amount_tendered: None,
            }
        }
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let showtime = Showtime {
            id: Uuid::new_v4(),
            movie_title: "Nha Ba Nu".into(),
            theater_name: "Galaxy Tan Binh".into(),
            room_name: "Room 4".into(),
            starts_at: Utc::now() + Duration::hours(4),
            ticket_price: 100_000,
        };
        store.create_showtime(&showtime).await.unwrap();

        let inventory = SeatInventory::new(store.clone(), store.clone(), RetryPolicy::none());
        let seats = inventory
            .provision_seats(showtime.id, &SeatLayout::grid(3, 2))
            .await
            .unwrap();
        let events: Arc<dyn EventPublisher> = Arc::new(NoopPublisher);
        let holds = HoldManager::new(inventory.clone(), store.clone(), events.clone(), HoldConfig::default());
        let ledger = OrderLedger::new(inventory.clone(), holds.clone(), store, events, RetryPolicy::none());

        Fixture {
            ledger,
            holds,
            inventory,
            showtime,
            seats,
            clerk: Principal::new("clerk-1", Role::Clerk),
        }
    }

    #[tokio::test]
    async fn test_tickets_follow_seat_order() {
        let f = fixture().await;
        let token = f.hold(&["B1", "A2", "A1"]).await;

        let order = f
            .ledger
            .create_order(&f.clerk, f.checkout(token, PaymentMethod::Offline))
            .await
            .unwrap()
            .order;

        let names: Vec<&str> = order.tickets.iter().map(|t| t.seat_name.as_str()).collect();
        assert_eq!(names, vec!["A1", "A2", "B1"]);
        let stored = f.ledger.get_order(order.id).await.unwrap();
        assert_eq!(stored.tickets, order.tickets);
    }

    #[tokio::test]
    async fn test_offline_checkout_books_seats() {
        let f = fixture().await;
        let token = f.hold(&["A1", "A2"]).await;
        assert_eq!(f.status("A1").await, SeatStatus::Held);

        let checkout = f
            .ledger
            .create_order(&f.clerk, f.checkout(token, PaymentMethod::Offline))
            .await
            .unwrap();

        let order = checkout.order;
        assert_eq!(order.total_amount, 200_000);
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.clerk_id, "clerk-1");
        assert_eq!(order.tickets.len(), 2);
        assert_eq!(f.status("A1").await, SeatStatus::Booked);
        assert_eq!(f.status("A2").await, SeatStatus::Booked);
        assert_eq!(f.inventory.get_seat(f.seat("A1")).await.unwrap().holder, Some(order.id));

        // the hold is consumed
        assert!(matches!(f.holds.commit(token).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_online_checkout_is_pending() {
        let f = fixture().await;
        let token = f.hold(&["B1"]).await;

        let order = f
            .ledger
            .create_order(&f.clerk, f.checkout(token, PaymentMethod::Online))
            .await
            .unwrap()
            .order;

        assert_eq!(order.status, OrderStatus::Pending);
        let paid = f.ledger.update_status(order.id, OrderStatus::Paid).await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_total_matches_price_for_any_seat_count() {
        let f = fixture().await;
        let names = ["A1", "A2", "B1", "B2", "C1", "C2"];
        let mut start = 0;
        for count in 1..=3 {
            let token = f.hold(&names[start..start + count]).await;
            let order = f
                .ledger
                .create_order(&f.clerk, f.checkout(token, PaymentMethod::Offline))
                .await
                .unwrap()
                .order;
            assert_eq!(order.total_amount, f.showtime.ticket_price * count as i64);
            start += count;
        }
    }

    #[tokio::test]
    async fn test_change_due_and_insufficient_cash() {
        let f = fixture().await;
        let token = f.hold(&["C1", "C2"]).await;

        let mut req = f.checkout(token, PaymentMethod::Offline);
        req.amount_tendered = Some(150_000);
        let err = f.ledger.create_order(&f.clerk, req.clone()).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(f.status("C1").await, SeatStatus::Held);
        assert!(f.ledger.list_orders(&OrderFilter { all: true, ..Default::default() }).await.unwrap().is_empty());

        req.amount_tendered = Some(250_000);
        let checkout = f.ledger.create_order(&f.clerk, req).await.unwrap();
        assert_eq!(checkout.change_due, Some(50_000));
    }

    #[tokio::test]
    async fn test_lost_race_creates_nothing() {
        let f = fixture().await;
        let token = f.hold(&["A1", "A2"]).await;

        // another path freed A2 behind the hold's back and someone else took it
        f.inventory
            .transition_seats(f.showtime.id, &[f.seat("A2")], &SeatTransition::release(token))
            .await
            .unwrap();
        f.hold(&["A2"]).await;

        let err = f
            .ledger
            .create_order(&f.clerk, f.checkout(token, PaymentMethod::Offline))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::SeatUnavailable { ref seat_ids } if seat_ids == &vec![f.seat("A2")]));
        assert_eq!(f.status("A1").await, SeatStatus::Held);
        assert!(f.ledger.list_orders(&OrderFilter { all: true, ..Default::default() }).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_hold_cannot_checkout() {
        let f = fixture().await;
        let hold = f
            .holds
            .acquire(&f.clerk, f.showtime.id, &[f.seat("B2")], Some(Duration::milliseconds(10)))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        let err = f
            .ledger
            .create_order(&f.clerk, f.checkout(hold.token, PaymentMethod::Offline))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::HoldExpired(_)));
    }

    #[tokio::test]
    async fn test_hold_for_other_showtime_rejected() {
        let f = fixture().await;
        let token = f.hold(&["A1"]).await;
        let mut req = f.checkout(token, PaymentMethod::Offline);
        req.showtime_id = Uuid::new_v4();

        assert!(matches!(
            f.ledger.create_order(&f.clerk, req).await,
            Err(CoreError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_releases_only_own_seats() {
        let f = fixture().await;
        let first = f.hold(&["C1", "C2"]).await;
        let second = f.hold(&["B1"]).await;
        let order = f
            .ledger
            .create_order(&f.clerk, f.checkout(first, PaymentMethod::Offline))
            .await
            .unwrap()
            .order;
        f.ledger
            .create_order(&f.clerk, f.checkout(second, PaymentMethod::Offline))
            .await
            .unwrap();

        let cancelled = f.ledger.update_status(order.id, OrderStatus::Cancelled).await.unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.tickets.len(), 2);
        assert_eq!(f.status("C1").await, SeatStatus::Free);
        assert_eq!(f.status("C2").await, SeatStatus::Free);
        assert_eq!(f.status("B1").await, SeatStatus::Booked);
    }

    #[tokio::test]
    async fn test_pay_cancelled_order_is_invalid() {
        let f = fixture().await;
        let token = f.hold(&["A1"]).await;
        let order = f
            .ledger
            .create_order(&f.clerk, f.checkout(token, PaymentMethod::Offline))
            .await
            .unwrap()
            .order;
        f.ledger.update_status(order.id, OrderStatus::Cancelled).await.unwrap();

        let err = f.ledger.update_status(order.id, OrderStatus::Paid).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        let unchanged = f.ledger.get_order(order.id).await.unwrap();
        assert_eq!(unchanged.status, OrderStatus::Cancelled);
        assert_eq!(f.status("A1").await, SeatStatus::Free);
    }

    #[tokio::test]
    async fn test_delete_frees_seats() {
        let f = fixture().await;
        let token = f.hold(&["B1", "B2"]).await;
        let order = f
            .ledger
            .create_order(&f.clerk, f.checkout(token, PaymentMethod::Offline))
            .await
            .unwrap()
            .order;

        f.ledger.delete_order(order.id).await.unwrap();

        assert_eq!(f.status("B1").await, SeatStatus::Free);
        assert_eq!(f.status("B2").await, SeatStatus::Free);
        assert!(matches!(f.ledger.get_order(order.id).await, Err(CoreError::NotFound(_))));
        assert!(matches!(f.ledger.delete_order(order.id).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_customer_orders_are_their_own() {
        let f = fixture().await;
        let customer = Principal::new("cust-9", Role::Customer);
        let token = f
            .holds
            .acquire(&customer, f.showtime.id, &[f.seat("A2")], None)
            .await
            .unwrap()
            .token;

        let order = f
            .ledger
            .create_order(&customer, f.checkout(token, PaymentMethod::Online))
            .await
            .unwrap()
            .order;
        assert_eq!(order.customer_id.as_deref(), Some("cust-9"));

        let mine = f
            .ledger
            .list_orders(&OrderFilter { customer_id: Some("cust-9".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        let theirs = f
            .ledger
            .list_orders(&OrderFilter { customer_id: Some("cust-1".into()), ..Default::default() })
            .await
            .unwrap();
        assert!(theirs.is_empty());
    }
}
