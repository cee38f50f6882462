use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use marquee_catalog::inventory::{dedup, SeatInventory};
use marquee_core::events::{DomainEvent, EventPublisher};
use marquee_core::identity::Principal;
use marquee_core::repository::HoldRepository;
use marquee_core::{CoreError, CoreResult};
use marquee_shared::{HoldToken, ReservationHold, SeatStatus, SeatTransition};

#[derive(Debug, Clone, Copy)]
pub struct HoldConfig {
    pub default_ttl: Duration,
    pub max_seats_per_hold: usize,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::minutes(10),
            max_seats_per_hold: 10,
        }
    }
}

/// Short-lived exclusive claims on seats, ahead of checkout.
///
/// Seat exclusivity comes from the guarded FREE -> HELD transition, not from
/// the hold record; the record only remembers which seats a token covers and
/// until when.
#[derive(Clone)]
pub struct HoldManager {
    inventory: SeatInventory,
    holds: Arc<dyn HoldRepository>,
    events: Arc<dyn EventPublisher>,
    config: HoldConfig,
}

impl HoldManager {
    pub fn new(
        inventory: SeatInventory,
        holds: Arc<dyn HoldRepository>,
        events: Arc<dyn EventPublisher>,
        config: HoldConfig,
    ) -> Self {
        Self { inventory, holds, events, config }
    }

    pub fn config(&self) -> &HoldConfig {
        &self.config
    }

    pub async fn acquire(
        &self,
        principal: &Principal,
        showtime_id: Uuid,
        seat_ids: &[Uuid],
        ttl: Option<Duration>,
    ) -> CoreResult<ReservationHold> {
        let seat_ids = dedup(seat_ids);
        if seat_ids.is_empty() {
            return Err(CoreError::ValidationError("no seats selected".into()));
        }
        if seat_ids.len() > self.config.max_seats_per_hold {
            return Err(CoreError::ValidationError(format!(
                "at most {} seats per hold",
                self.config.max_seats_per_hold
            )));
        }
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        if ttl <= Duration::zero() {
            return Err(CoreError::ValidationError("hold ttl must be positive".into()));
        }

        self.inventory.get_showtime(showtime_id).await?;

        let now = Utc::now();
        let hold = ReservationHold {
            token: HoldToken::new(),
            showtime_id,
            seat_ids,
            owner: principal.subject.clone(),
            created_at: now,
            expires_at: now + ttl,
        };

        // Record first: a stale record whose seats were never held is
        // harmless, its guarded release matches nothing.
        self.holds.insert_hold(&hold).await?;

        let transition = SeatTransition::hold(hold.token);
        let mut result = self
            .inventory
            .transition_seats(showtime_id, &hold.seat_ids, &transition)
            .await;

        if let Err(CoreError::SeatUnavailable { seat_ids }) = &result {
            if self.reclaim_expired(seat_ids, now).await? > 0 {
                result = self
                    .inventory
                    .transition_seats(showtime_id, &hold.seat_ids, &transition)
                    .await;
            }
        }

        if let Err(e) = result {
            if let Err(cleanup) = self.holds.remove_hold(hold.token).await {
                warn!("Failed to discard hold record {}: {}", hold.token, cleanup);
            }
            debug!("Hold rejected for {}: {}", principal.subject, e);
            return Err(e);
        }

        // A sweep may have dropped the record while the seats were not yet
        // HELD; without a record nothing could ever release them.
        if self.holds.get_hold(hold.token).await?.is_none() {
            self.release_seats(&hold).await?;
            return Err(CoreError::HoldExpired(format!(
                "hold {} expired before its seats were held",
                hold.token
            )));
        }

        info!(
            "Hold {} acquired by {}: {} seats of showtime {} until {}",
            hold.token,
            principal.subject,
            hold.seat_ids.len(),
            showtime_id,
            hold.expires_at
        );
        self.events
            .publish(DomainEvent::seats_changed(showtime_id, hold.seat_ids.clone(), SeatStatus::Held))
            .await;

        Ok(hold)
    }

    /// Give the seats back. Unknown, expired, released or committed holds
    /// are a no-op.
    pub async fn release(&self, token: HoldToken) -> CoreResult<()> {
        match self.holds.get_hold(token).await? {
            Some(hold) => {
                self.release_hold(&hold).await?;
                info!("Hold {} released", token);
            }
            None => debug!("Release of unknown hold {}", token),
        }
        Ok(())
    }

    /// Validate a hold for checkout. Seats stay HELD; the ledger books them.
    pub async fn commit(&self, token: HoldToken) -> CoreResult<ReservationHold> {
        self.commit_at(token, Utc::now()).await
    }

    pub async fn commit_at(&self, token: HoldToken, now: DateTime<Utc>) -> CoreResult<ReservationHold> {
        let hold = self
            .holds
            .get_hold(token)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("hold {}", token)))?;

        if hold.is_expired(now) {
            return Err(CoreError::HoldExpired(format!(
                "hold {} expired at {}",
                token, hold.expires_at
            )));
        }
        Ok(hold)
    }

    /// Drop the record of a hold whose seats were booked
    pub async fn finish(&self, token: HoldToken) -> CoreResult<()> {
        self.holds.remove_hold(token).await
    }

    /// Release every hold that expired at `now`; returns how many were swept
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let expired = self.holds.list_expired(now).await?;
        let mut swept = 0;

        for hold in expired {
            match self.release_hold(&hold).await {
                Ok(()) => swept += 1,
                Err(e) => warn!("Failed to sweep hold {}: {}", hold.token, e),
            }
        }

        if swept > 0 {
            info!("Swept {} expired holds", swept);
        }
        Ok(swept)
    }

    /// Guarded HELD -> FREE for the hold's own seats, then drop the record.
    ///
    /// When nothing matched, the seats are released once more after the
    /// record is gone: an `acquire` still in flight may have held them in
    /// between, and it only checks for its record before that point.
    async fn release_hold(&self, hold: &ReservationHold) -> CoreResult<()> {
        let released = self.release_seats(hold).await?;
        self.holds.remove_hold(hold.token).await?;

        if !released && self.release_seats(hold).await? {
            debug!("Hold {} was held during its own release", hold.token);
        }
        Ok(())
    }

    /// Returns false when the seats are not HELD by this hold (already
    /// booked, released, or not yet held).
    async fn release_seats(&self, hold: &ReservationHold) -> CoreResult<bool> {
        let result = self
            .inventory
            .transition_seats(hold.showtime_id, &hold.seat_ids, &SeatTransition::release(hold.token))
            .await;

        match result {
            Ok(()) => {
                self.events
                    .publish(DomainEvent::seats_changed(
                        hold.showtime_id,
                        hold.seat_ids.clone(),
                        SeatStatus::Free,
                    ))
                    .await;
                Ok(true)
            }
            Err(CoreError::SeatUnavailable { .. }) | Err(CoreError::NotFound(_)) => {
                debug!("Hold {} does not own its seats", hold.token);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Release expired holds blocking `seat_ids` ahead of the next sweep
    async fn reclaim_expired(&self, seat_ids: &[Uuid], now: DateTime<Utc>) -> CoreResult<usize> {
        let mut reclaimed = 0;
        let mut checked: Vec<Uuid> = Vec::new();

        for seat_id in seat_ids {
            let seat = match self.inventory.get_seat(*seat_id).await {
                Ok(seat) => seat,
                Err(CoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            let holder = match (seat.status, seat.holder) {
                (SeatStatus::Held, Some(holder)) if !checked.contains(&holder) => holder,
                _ => continue,
            };
            checked.push(holder);

            if let Some(stale) = self.holds.get_hold(HoldToken(holder)).await? {
                if stale.is_expired(now) {
                    self.release_hold(&stale).await?;
                    debug!("Reclaimed expired hold {}", stale.token);
                    reclaimed += 1;
                }
            }
        }
        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_catalog::SeatLayout;
    use marquee_core::events::NoopPublisher;
    use marquee_core::identity::Role;
    use marquee_core::repository::ShowtimeRepository;
    use marquee_core::retry::RetryPolicy;
    use marquee_shared::{Seat, Showtime};
    use marquee_store::MemoryStore;
    use std::time::Duration as StdDuration;
    use async_trait::async_trait;

    struct Fixture {
        manager: HoldManager,
        inventory: SeatInventory,
        showtime: Showtime,
        seats: Vec<Seat>,
    }

    impl Fixture {
        fn seat(&self, name: &str) -> Uuid {
            self.seats.iter().find(|s| s.name() == name).map(|s| s.id).unwrap()
        }
    }

    /// Hold records whose writes take a while, to open the gap between a
    /// record and its seats.
    struct SlowHolds {
        inner: Arc<MemoryStore>,
        insert_delay: StdDuration,
        remove_delay: StdDuration,
    }

    #[async_trait]
    impl HoldRepository for SlowHolds {
        async fn insert_hold(&self, hold: &ReservationHold) -> CoreResult<()> {
            self.inner.insert_hold(hold).await?;
            tokio::time::sleep(self.insert_delay).await;
            Ok(())
        }

        async fn get_hold(&self, token: HoldToken) -> CoreResult<Option<ReservationHold>> {
            self.inner.get_hold(token).await
        }

        async fn remove_hold(&self, token: HoldToken) -> CoreResult<()> {
            tokio::time::sleep(self.remove_delay).await;
            self.inner.remove_hold(token).await
        }

        async fn list_expired(&self, now: DateTime<Utc>) -> CoreResult<Vec<ReservationHold>> {
            self.inner.list_expired(now).await
        }
    }

    fn slow_holds(
        insert_ms: u64,
        remove_ms: u64,
    ) -> impl FnOnce(Arc<MemoryStore>) -> Arc<dyn HoldRepository> {
        move |inner: Arc<MemoryStore>| -> Arc<dyn HoldRepository> {
            Arc::new(SlowHolds {
                inner,
                insert_delay: StdDuration::from_millis(insert_ms),
                remove_delay: StdDuration::from_millis(remove_ms),
            })
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(|store| store as Arc<dyn HoldRepository>).await
    }

    async fn fixture_with<F>(holds: F) -> Fixture
    where
        F: FnOnce(Arc<MemoryStore>) -> Arc<dyn HoldRepository>,
    {
        let store = Arc::new(MemoryStore::new());
        let showtime = Showtime {
            id: Uuid::new_v4(),
            movie_title: "Bo Gia".into(),
            theater_name: "Lotte Cinema".into(),
            room_name: "Room 2".into(),
            starts_at: Utc::now() + Duration::hours(5),
            ticket_price: 75_000,
        };
        store.create_showtime(&showtime).await.unwrap();

        let inventory = SeatInventory::new(store.clone(), store.clone(), RetryPolicy::none());
        let seats = inventory.provision_seats(showtime.id, &SeatLayout::grid(2, 3)).await.unwrap();
        let manager = HoldManager::new(
            inventory.clone(),
            holds(store),
            Arc::new(NoopPublisher),
            HoldConfig { default_ttl: Duration::minutes(10), max_seats_per_hold: 4 },
        );

        Fixture { manager, inventory, showtime, seats }
    }

    fn clerk(name: &str) -> Principal {
        Principal::new(name, Role::Clerk)
    }

    #[tokio::test]
    async fn test_acquire_marks_seats_held() {
        let f = fixture().await;
        let a1 = f.seat("A1");

        let hold = f.manager.acquire(&clerk("c1"), f.showtime.id, &[a1, a1], None).await.unwrap();

        assert_eq!(hold.seat_ids, vec![a1]);
        assert_eq!(hold.owner, "c1");
        let seat = f.inventory.get_seat(a1).await.unwrap();
        assert_eq!(seat.status, SeatStatus::Held);
        assert_eq!(seat.holder, Some(hold.token.0));
    }

    #[tokio::test]
    async fn test_concurrent_acquire_exactly_one_wins() {
        let f = fixture().await;
        let (a1, a2) = (f.seat("A1"), f.seat("A2"));
        let (x, y) = (clerk("x"), clerk("y"));

        let (wide, narrow) = ([a1, a2], [a2]);

        let (first, second) = tokio::join!(
            f.manager.acquire(&x, f.showtime.id, &wide, None),
            f.manager.acquire(&y, f.showtime.id, &narrow, None),
        );

        assert!(first.is_ok() != second.is_ok());
        let loser = if first.is_err() { first.unwrap_err() } else { second.unwrap_err() };
        match loser {
            CoreError::SeatUnavailable { seat_ids } => assert!(seat_ids.contains(&a2)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_acquire_changes_nothing() {
        let f = fixture().await;
        let (a1, a2) = (f.seat("A1"), f.seat("A2"));
        f.manager.acquire(&clerk("x"), f.showtime.id, &[a2], None).await.unwrap();

        let err = f
            .manager
            .acquire(&clerk("y"), f.showtime.id, &[a1, a2], None)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::SeatUnavailable { ref seat_ids } if seat_ids == &vec![a2]));
        assert_eq!(f.inventory.get_seat(a1).await.unwrap().status, SeatStatus::Free);
    }

    #[tokio::test]
    async fn test_acquire_validation() {
        let f = fixture().await;
        let ids: Vec<Uuid> = f.seats.iter().map(|s| s.id).collect();

        assert!(matches!(
            f.manager.acquire(&clerk("x"), f.showtime.id, &[], None).await,
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            f.manager.acquire(&clerk("x"), f.showtime.id, &ids, None).await,
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            f.manager
                .acquire(&clerk("x"), f.showtime.id, &ids[..1], Some(Duration::zero()))
                .await,
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            f.manager.acquire(&clerk("x"), Uuid::new_v4(), &ids[..1], None).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let f = fixture().await;
        let b1 = f.seat("B1");
        let hold = f.manager.acquire(&clerk("x"), f.showtime.id, &[b1], None).await.unwrap();

        f.manager.release(hold.token).await.unwrap();
        f.manager.release(hold.token).await.unwrap();
        f.manager.release(HoldToken::new()).await.unwrap();

        assert_eq!(f.inventory.get_seat(b1).await.unwrap().status, SeatStatus::Free);
        assert!(matches!(f.manager.commit(hold.token).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_commit_expired_hold() {
        let f = fixture().await;
        let b2 = f.seat("B2");
        let hold = f.manager.acquire(&clerk("x"), f.showtime.id, &[b2], None).await.unwrap();

        assert!(f.manager.commit(hold.token).await.is_ok());
        let later = hold.expires_at + Duration::seconds(1);
        assert!(matches!(
            f.manager.commit_at(hold.token, later).await,
            Err(CoreError::HoldExpired(_))
        ));
        // commit never touches seat status
        assert_eq!(f.inventory.get_seat(b2).await.unwrap().status, SeatStatus::Held);
    }

    #[tokio::test]
    async fn test_sweep_releases_expired_hold() {
        let f = fixture().await;
        let b1 = f.seat("B1");
        let hold = f
            .manager
            .acquire(&clerk("x"), f.showtime.id, &[b1], Some(Duration::seconds(1)))
            .await
            .unwrap();

        assert_eq!(f.manager.sweep_expired(Utc::now()).await.unwrap(), 0);
        let swept = f.manager.sweep_expired(hold.expires_at + Duration::seconds(1)).await.unwrap();
        assert_eq!(swept, 1);

        assert_eq!(f.inventory.get_seat(b1).await.unwrap().status, SeatStatus::Free);
        f.manager.acquire(&clerk("y"), f.showtime.id, &[b1], None).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_leaves_booked_seats_alone() {
        let f = fixture().await;
        let a3 = f.seat("A3");
        let hold = f
            .manager
            .acquire(&clerk("x"), f.showtime.id, &[a3], Some(Duration::seconds(1)))
            .await
            .unwrap();

        let order_id = Uuid::new_v4();
        f.inventory
            .transition_seats(f.showtime.id, &[a3], &SeatTransition::book(hold.token, order_id))
            .await
            .unwrap();

        f.manager.sweep_expired(hold.expires_at + Duration::seconds(1)).await.unwrap();

        let seat = f.inventory.get_seat(a3).await.unwrap();
        assert_eq!(seat.status, SeatStatus::Booked);
        assert_eq!(seat.holder, Some(order_id));
    }

    #[tokio::test]
    async fn test_acquire_reclaims_expired_hold_before_sweep() {
        let f = fixture().await;
        let b3 = f.seat("B3");
        f.manager
            .acquire(&clerk("x"), f.showtime.id, &[b3], Some(Duration::milliseconds(20)))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;

        let hold = f.manager.acquire(&clerk("y"), f.showtime.id, &[b3], None).await.unwrap();
        assert_eq!(f.inventory.get_seat(b3).await.unwrap().holder, Some(hold.token.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_acquires_on_one_seat() {
        let f = fixture().await;
        let a1 = f.seat("A1");

        let mut handles = Vec::new();
        for i in 0..8 {
            let manager = f.manager.clone();
            let showtime_id = f.showtime.id;
            handles.push(tokio::spawn(async move {
                let seats = [a1];
                manager.acquire(&clerk(&format!("c{}", i)), showtime_id, &seats, None).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(CoreError::SeatUnavailable { seat_ids }) => assert_eq!(seat_ids, vec![a1]),
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_sweep_before_seats_are_held_strands_nothing() {
        let f = fixture_with(slow_holds(50, 0)).await;
        let a1 = f.seat("A1");
        let seats = [a1];

        let sweep = async {
            tokio::time::sleep(StdDuration::from_millis(20)).await;
            f.manager.sweep_expired(Utc::now()).await
        };
        let clerk_x = clerk("x");
        let (acquired, swept) = tokio::join!(
            f.manager.acquire(&clerk_x, f.showtime.id, &seats, Some(Duration::milliseconds(10))),
            sweep,
        );

        assert_eq!(swept.unwrap(), 1);
        assert!(matches!(acquired, Err(CoreError::HoldExpired(_))));
        let seat = f.inventory.get_seat(a1).await.unwrap();
        assert_eq!(seat.status, SeatStatus::Free);
        assert_eq!(seat.holder, None);
        f.manager.acquire(&clerk("y"), f.showtime.id, &seats, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_finishing_after_acquire_frees_seats() {
        let f = fixture_with(slow_holds(30, 60)).await;
        let a2 = f.seat("A2");
        let seats = [a2];

        let sweep = async {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            f.manager.sweep_expired(Utc::now()).await
        };
        let clerk_x = clerk("x");
        let (acquired, swept) = tokio::join!(
            f.manager.acquire(&clerk_x, f.showtime.id, &seats, Some(Duration::milliseconds(5))),
            sweep,
        );

        // The acquire saw its record, the sweep then dropped it and let go
        // of the seat on its second attempt.
        let hold = acquired.unwrap();
        assert_eq!(swept.unwrap(), 1);
        assert_eq!(f.inventory.get_seat(a2).await.unwrap().status, SeatStatus::Free);
        f.manager.release(hold.token).await.unwrap();
        f.manager.acquire(&clerk("y"), f.showtime.id, &seats, None).await.unwrap();
    }
}
