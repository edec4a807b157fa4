//! End-to-end booking flows against the in-memory store.
//!
//! Covers creation, placement, timeout, cancellation and per-ticket refunds,
//! including the rollback guarantees of each operation.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use cinema_booking_core::{
    BookingConfig, BookingError, BookingService, CancelOutcome, Cinema, CinemaId, ClassCounts,
    FilmId, Money, PaymentStatus, PlaceOutcome, Provisioning, Screen, ScreenId, Screening,
    ScreeningId, Seat, SeatClass, SeatId,
};
use cinema_booking_testing::fixtures::{self, CinemaFixture};
use cinema_booking_testing::{InMemoryBookingStore, ManualClock, init_test_tracing};
use std::sync::Arc;

struct Harness {
    service: BookingService<InMemoryBookingStore>,
    clock: ManualClock,
    cinema: CinemaFixture,
}

async fn harness() -> Harness {
    init_test_tracing();
    let store = Arc::new(InMemoryBookingStore::new());
    let cinema = fixtures::provision(store.as_ref()).await.unwrap();
    let clock = ManualClock::new(fixtures::booking_time());
    let service = BookingService::new(store, Arc::new(clock.clone()), BookingConfig::default());
    Harness {
        service,
        clock,
        cinema,
    }
}

impl Harness {
    fn seats_a_b(&self) -> [SeatId; 2] {
        [self.cinema.seat_a.id, self.cinema.seat_b.id]
    }

    async fn sold(&self) -> ClassCounts {
        self.service
            .get_screening(self.cinema.screening.id)
            .await
            .unwrap()
            .unwrap()
            .sold
    }

    async fn available(&self, seat_id: SeatId) -> bool {
        self.service
            .is_seat_available(self.cinema.screening.id, seat_id)
            .await
            .unwrap()
    }

    async fn status(&self, booking_id: cinema_booking_core::BookingId) -> PaymentStatus {
        self.service
            .get_booking_by_id(booking_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }
}

// ============================================================================
// create_booking
// ============================================================================

#[tokio::test]
async fn create_booking_prices_each_seat() {
    let h = harness().await;

    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();

    assert_eq!(booking.status, PaymentStatus::Pending);
    assert_eq!(booking.total_price, Money::from_cents(4500));
    let prices: Vec<Money> = booking.tickets.iter().map(|t| t.price).collect();
    assert_eq!(
        prices,
        vec![fixtures::LOWER_AFTERNOON, fixtures::UPPER_AFTERNOON]
    );
    assert!(booking.tickets.iter().all(|t| t.price == t.original_ticket_price));
    assert!(booking.tickets.iter().all(|t| t.qr_code.is_some()));

    // Creation does not hold seats.
    assert!(h.available(h.cinema.seat_a.id).await);
    assert!(h.available(h.cinema.seat_b.id).await);
    assert_eq!(h.sold().await, ClassCounts::default());

    let stored = h.service.get_booking_by_id(booking.id).await.unwrap();
    assert_eq!(stored, Some(booking));
}

#[tokio::test]
async fn create_booking_without_seats_is_rejected() {
    let h = harness().await;

    let result = h
        .service
        .create_booking(h.cinema.screening.id, &[], fixtures::customer())
        .await;

    assert!(matches!(result, Err(BookingError::NoSeatsSelected)));
    assert_eq!(h.service.store().booking_count().await, 0);
}

#[tokio::test]
async fn create_booking_for_unknown_screening_is_rejected() {
    let h = harness().await;
    let missing = ScreeningId::new();

    let result = h
        .service
        .create_booking(missing, &h.seats_a_b(), fixtures::customer())
        .await;

    assert!(matches!(result, Err(BookingError::InvalidScreening(id)) if id == missing));
    assert_eq!(h.service.store().booking_count().await, 0);
}

#[tokio::test]
async fn create_booking_rejects_duplicate_seat() {
    let h = harness().await;
    let seat = h.cinema.seat_a.id;

    let result = h
        .service
        .create_booking(h.cinema.screening.id, &[seat, seat], fixtures::customer())
        .await;

    assert!(matches!(result, Err(BookingError::DuplicateSeat(id)) if id == seat));
}

#[tokio::test]
async fn create_booking_rejects_seat_from_another_screen() {
    let h = harness().await;
    let other = fixtures::provision(h.service.store()).await.unwrap();

    let result = h
        .service
        .create_booking(
            h.cinema.screening.id,
            &[h.cinema.seat_a.id, other.seat_a.id],
            fixtures::customer(),
        )
        .await;

    assert!(matches!(
        result,
        Err(BookingError::SeatNotInScreen { seat_id, .. }) if seat_id == other.seat_a.id
    ));
    assert_eq!(h.service.store().booking_count().await, 0);
}

#[tokio::test]
async fn pricing_failure_persists_nothing() {
    let h = harness().await;

    // The VIP seat has no price rule.
    let result = h
        .service
        .create_booking(
            h.cinema.screening.id,
            &[h.cinema.seat_a.id, h.cinema.vip_seat.id],
            fixtures::customer(),
        )
        .await;

    assert!(matches!(result, Err(BookingError::PriceNotFound { .. })));
    assert_eq!(h.service.store().booking_count().await, 0);
    assert_eq!(h.service.store().ticket_count().await, 0);
}

#[tokio::test]
async fn create_booking_rejects_unknown_seat() {
    let h = harness().await;
    let stray = SeatId::for_position(h.cinema.cinema.id, h.cinema.screen.id, "Z", 99);

    let result = h
        .service
        .create_booking(
            h.cinema.screening.id,
            &[h.cinema.seat_a.id, stray],
            fixtures::customer(),
        )
        .await;

    assert!(matches!(result, Err(BookingError::UnknownSeat(id)) if id == stray));
    assert_eq!(h.service.store().booking_count().await, 0);
}

#[tokio::test]
async fn create_booking_without_cinema_city_is_rejected() {
    let h = harness().await;
    let orphan_cinema = CinemaId::new();
    let screening = Screening {
        id: ScreeningId::new(),
        film_id: FilmId::new(),
        screen_id: h.cinema.screen.id,
        cinema_id: orphan_cinema,
        date: fixtures::screening_date(),
        start_time: fixtures::afternoon(),
        sold: ClassCounts::default(),
    };
    h.service.store().add_screening(&screening).await.unwrap();

    let result = h
        .service
        .create_booking(screening.id, &[h.cinema.seat_a.id], fixtures::customer())
        .await;

    assert!(matches!(result, Err(BookingError::CityNotFound(id)) if id == orphan_cinema));
    assert_eq!(h.service.store().booking_count().await, 0);
    assert_eq!(h.service.store().ticket_count().await, 0);
}

// ============================================================================
// place_booking
// ============================================================================

#[tokio::test]
async fn placing_holds_seats_and_counts_them() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();

    let outcome = h.service.place_booking(booking.id).await.unwrap();

    assert_eq!(outcome, PlaceOutcome::Placed);
    assert_eq!(h.status(booking.id).await, PaymentStatus::Paid);
    assert!(!h.available(h.cinema.seat_a.id).await);
    assert!(!h.available(h.cinema.seat_b.id).await);
    assert!(h.available(h.cinema.seat_a2.id).await);
    assert_eq!(h.sold().await, ClassCounts::new(1, 1, 0));
}

#[tokio::test]
async fn placing_twice_is_a_no_op() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();
    h.service.place_booking(booking.id).await.unwrap();

    let outcome = h.service.place_booking(booking.id).await.unwrap();

    assert_eq!(outcome, PlaceOutcome::AlreadyPlaced);
    assert!(outcome.is_placed());
    assert_eq!(h.sold().await, ClassCounts::new(1, 1, 0));
}

#[tokio::test]
async fn placing_after_timeout_fails_booking() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(31));
    let result = h.service.place_booking(booking.id).await;

    assert!(matches!(
        result,
        Err(BookingError::BookingTimeout { booking_id, timeout_minutes: 30, .. })
            if booking_id == booking.id
    ));
    // The FAILED transition is committed even though the call errors.
    assert_eq!(h.status(booking.id).await, PaymentStatus::Failed);
    assert!(h.available(h.cinema.seat_a.id).await);
    assert!(h.available(h.cinema.seat_b.id).await);
    assert_eq!(h.sold().await, ClassCounts::default());

    let retry = h.service.place_booking(booking.id).await.unwrap();
    assert_eq!(retry, PlaceOutcome::Closed(PaymentStatus::Failed));
    assert!(!retry.is_placed());
}

#[tokio::test]
async fn timeout_boundary_is_exclusive() {
    let h = harness().await;
    let early = h
        .service
        .create_booking(h.cinema.screening.id, &[h.cinema.seat_a.id], fixtures::customer())
        .await
        .unwrap();
    let late = h
        .service
        .create_booking(h.cinema.screening.id, &[h.cinema.seat_b.id], fixtures::customer())
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(29));
    assert_eq!(
        h.service.place_booking(early.id).await.unwrap(),
        PlaceOutcome::Placed
    );

    h.clock.advance(Duration::minutes(1));
    assert!(matches!(
        h.service.place_booking(late.id).await,
        Err(BookingError::BookingTimeout { .. })
    ));
}

#[tokio::test]
async fn custom_timeout_overrides_config() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &[h.cinema.seat_a.id], fixtures::customer())
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(45));
    let outcome = h
        .service
        .place_booking_within(booking.id, Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(outcome, PlaceOutcome::Placed);
}

#[tokio::test]
async fn conflicting_placement_rolls_back_every_seat() {
    let h = harness().await;
    let first = h
        .service
        .create_booking(h.cinema.screening.id, &[h.cinema.seat_a.id], fixtures::customer())
        .await
        .unwrap();
    // A2 is reserved before A is found taken; it must not stay held.
    let second = h
        .service
        .create_booking(
            h.cinema.screening.id,
            &[h.cinema.seat_a2.id, h.cinema.seat_a.id],
            fixtures::customer(),
        )
        .await
        .unwrap();

    h.service.place_booking(first.id).await.unwrap();
    let result = h.service.place_booking(second.id).await;

    assert!(matches!(
        result,
        Err(BookingError::SeatUnavailable { seat_id, held_by: Some(holder), .. })
            if seat_id == h.cinema.seat_a.id && holder == first.id
    ));
    assert!(h.available(h.cinema.seat_a2.id).await);
    assert_eq!(h.status(second.id).await, PaymentStatus::Pending);
    assert_eq!(h.sold().await, ClassCounts::new(1, 0, 0));
}

#[tokio::test]
async fn placing_unknown_booking_fails() {
    let h = harness().await;
    let missing = cinema_booking_core::BookingId::new();

    let result = h.service.place_booking(missing).await;

    assert!(matches!(result, Err(BookingError::BookingNotFound(id)) if id == missing));
}

#[tokio::test]
async fn placing_seat_added_after_screening_fails_unprovisioned() {
    let h = harness().await;
    let late_seat = Seat::new(h.cinema.cinema.id, h.cinema.screen.id, "A", 3, SeatClass::Lower);
    h.service.store().add_seat(&late_seat).await.unwrap();
    let booking = h
        .service
        .create_booking(
            h.cinema.screening.id,
            &[h.cinema.seat_a.id, late_seat.id],
            fixtures::customer(),
        )
        .await
        .unwrap();

    let result = h.service.place_booking(booking.id).await;

    assert!(matches!(
        result,
        Err(BookingError::SeatNotProvisioned { seat_id, .. }) if seat_id == late_seat.id
    ));
    assert_eq!(h.status(booking.id).await, PaymentStatus::Pending);
    assert!(h.available(h.cinema.seat_a.id).await);
    assert!(h.service.store().held_seats(h.cinema.screening.id).await.is_empty());
    assert_eq!(h.sold().await, ClassCounts::default());
}

#[tokio::test]
async fn placing_beyond_class_capacity_rolls_back_reservations() {
    init_test_tracing();
    let store = Arc::new(InMemoryBookingStore::new());
    let cinema = Cinema {
        id: CinemaId::new(),
        name: "Bijou".to_string(),
        city: fixtures::CITY.to_string(),
    };
    // Two Lower seats on a screen that only counts one.
    let screen = Screen {
        id: ScreenId::new(),
        cinema_id: cinema.id,
        name: "Studio".to_string(),
        capacity: ClassCounts::new(1, 1, 1),
    };
    let first = Seat::new(cinema.id, screen.id, "A", 1, SeatClass::Lower);
    let second = Seat::new(cinema.id, screen.id, "A", 2, SeatClass::Lower);
    let screening = Screening {
        id: ScreeningId::new(),
        film_id: FilmId::new(),
        screen_id: screen.id,
        cinema_id: cinema.id,
        date: fixtures::screening_date(),
        start_time: fixtures::afternoon(),
        sold: ClassCounts::default(),
    };
    store.add_cinema(&cinema).await.unwrap();
    store.add_screen(&screen).await.unwrap();
    store.add_seat(&first).await.unwrap();
    store.add_seat(&second).await.unwrap();
    store.add_screening(&screening).await.unwrap();
    for rule in fixtures::default_price_rules() {
        store.add_price_rule(&rule).await.unwrap();
    }
    let service = BookingService::new(
        Arc::clone(&store),
        Arc::new(ManualClock::new(fixtures::booking_time())),
        BookingConfig::default(),
    );
    let booking = service
        .create_booking(screening.id, &[first.id, second.id], fixtures::customer())
        .await
        .unwrap();

    let result = service.place_booking(booking.id).await;

    assert!(matches!(
        result,
        Err(BookingError::SoldCounterOutOfRange {
            seat_class: SeatClass::Lower,
            current: 0,
            delta: 2,
            capacity: 1,
            ..
        })
    ));
    assert!(store.held_seats(screening.id).await.is_empty());
    let stored = service.get_screening(screening.id).await.unwrap().unwrap();
    assert_eq!(stored.sold, ClassCounts::default());
    let booking = service.get_booking_by_id(booking.id).await.unwrap().unwrap();
    assert_eq!(booking.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn oversized_timeout_setting_does_not_break_placement() {
    let store = Arc::new(InMemoryBookingStore::new());
    let cinema = fixtures::provision(store.as_ref()).await.unwrap();
    let config = BookingConfig {
        booking_timeout_minutes: i64::MAX / 2,
        ..BookingConfig::default()
    };
    let service = BookingService::new(
        store,
        Arc::new(ManualClock::new(fixtures::booking_time())),
        config,
    );
    let booking = service
        .create_booking(cinema.screening.id, &[cinema.seat_a.id], fixtures::customer())
        .await
        .unwrap();

    let outcome = service.place_booking(booking.id).await.unwrap();

    assert_eq!(outcome, PlaceOutcome::Placed);
}

// ============================================================================
// cancel_booking
// ============================================================================

#[tokio::test]
async fn cancelling_paid_booking_restores_seats_and_counters() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();
    h.service.place_booking(booking.id).await.unwrap();

    let outcome = h.service.cancel_booking(booking.id).await.unwrap();

    assert_eq!(outcome, CancelOutcome::Refunded);
    assert_eq!(h.status(booking.id).await, PaymentStatus::Refunded);
    assert!(h.available(h.cinema.seat_a.id).await);
    assert!(h.available(h.cinema.seat_b.id).await);
    assert_eq!(h.sold().await, ClassCounts::default());
}

#[tokio::test]
async fn cancellation_is_idempotent() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();
    h.service.place_booking(booking.id).await.unwrap();

    h.service.cancel_booking(booking.id).await.unwrap();
    let after_first = h.service.get_booking_by_id(booking.id).await.unwrap();
    let sold_after_first = h.sold().await;

    let outcome = h.service.cancel_booking(booking.id).await.unwrap();

    assert_eq!(outcome, CancelOutcome::AlreadyClosed(PaymentStatus::Refunded));
    assert!(outcome.is_cancelled());
    assert_eq!(h.service.get_booking_by_id(booking.id).await.unwrap(), after_first);
    assert_eq!(h.sold().await, sold_after_first);
}

#[tokio::test]
async fn cancelling_pending_booking_fails_it() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();

    let outcome = h.service.cancel_booking(booking.id).await.unwrap();

    assert_eq!(outcome, CancelOutcome::Voided);
    assert_eq!(h.status(booking.id).await, PaymentStatus::Failed);
    assert_eq!(
        h.service.place_booking(booking.id).await.unwrap(),
        PlaceOutcome::Closed(PaymentStatus::Failed)
    );
    assert_eq!(h.sold().await, ClassCounts::default());
}

#[tokio::test]
async fn cancelling_unknown_booking_fails() {
    let h = harness().await;

    let result = h
        .service
        .cancel_booking(cinema_booking_core::BookingId::new())
        .await;

    assert!(matches!(result, Err(BookingError::BookingNotFound(_))));
}

// ============================================================================
// cancel_ticket
// ============================================================================

#[tokio::test]
async fn cancelling_ticket_charges_and_releases_its_seat() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();
    h.service.place_booking(booking.id).await.unwrap();
    let lower_ticket = booking.tickets[0].clone();

    let cancelled = h.service.cancel_ticket(lower_ticket.id).await.unwrap();

    assert_eq!(cancelled.price, Money::from_cents(1000));
    assert_eq!(cancelled.original_ticket_price, fixtures::LOWER_AFTERNOON);
    assert_eq!(cancelled.refunded_at, Some(fixtures::booking_time()));
    assert!(h.available(h.cinema.seat_a.id).await);
    assert!(!h.available(h.cinema.seat_b.id).await);
    assert_eq!(h.sold().await, ClassCounts::new(0, 1, 0));
    // One ticket left, so the booking stays paid.
    assert_eq!(h.status(booking.id).await, PaymentStatus::Paid);
}

#[tokio::test]
async fn cancelling_last_ticket_refunds_booking() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();
    h.service.place_booking(booking.id).await.unwrap();

    for ticket in &booking.tickets {
        h.service.cancel_ticket(ticket.id).await.unwrap();
    }

    assert_eq!(h.status(booking.id).await, PaymentStatus::Refunded);
    assert_eq!(h.sold().await, ClassCounts::default());
    // Cancelling the whole booking afterwards changes nothing.
    assert_eq!(
        h.service.cancel_booking(booking.id).await.unwrap(),
        CancelOutcome::AlreadyClosed(PaymentStatus::Refunded)
    );
}

#[tokio::test]
async fn cancelling_ticket_twice_returns_it_unchanged() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &h.seats_a_b(), fixtures::customer())
        .await
        .unwrap();
    h.service.place_booking(booking.id).await.unwrap();
    let first = h.service.cancel_ticket(booking.tickets[0].id).await.unwrap();

    h.clock.advance(Duration::hours(1));
    let second = h.service.cancel_ticket(booking.tickets[0].id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.sold().await, ClassCounts::new(0, 1, 0));
}

#[tokio::test]
async fn late_ticket_cancellation_is_rejected() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &[h.cinema.seat_a.id], fixtures::customer())
        .await
        .unwrap();
    h.service.place_booking(booking.id).await.unwrap();

    h.clock
        .set(h.cinema.screening.starts_at() - Duration::hours(23));
    let result = h.service.cancel_ticket(booking.tickets[0].id).await;

    assert!(matches!(result, Err(BookingError::LateCancellation { .. })));
    assert!(!h.available(h.cinema.seat_a.id).await);
    assert_eq!(h.sold().await, ClassCounts::new(1, 0, 0));
}

#[tokio::test]
async fn ticket_of_pending_booking_cannot_be_cancelled() {
    let h = harness().await;
    let booking = h
        .service
        .create_booking(h.cinema.screening.id, &[h.cinema.seat_a.id], fixtures::customer())
        .await
        .unwrap();

    let result = h.service.cancel_ticket(booking.tickets[0].id).await;

    assert!(matches!(
        result,
        Err(BookingError::BookingNotPaid { status: PaymentStatus::Pending, .. })
    ));
}

#[tokio::test]
async fn unknown_ticket_cannot_be_cancelled() {
    let h = harness().await;

    let result = h
        .service
        .cancel_ticket(cinema_booking_core::TicketId::new())
        .await;

    assert!(matches!(result, Err(BookingError::TicketNotFound(_))));
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn all_bookings_are_listed_oldest_first() {
    let h = harness().await;
    let first = h
        .service
        .create_booking(h.cinema.screening.id, &[h.cinema.seat_a.id], fixtures::customer())
        .await
        .unwrap();
    h.clock.advance(Duration::minutes(1));
    let second = h
        .service
        .create_booking(h.cinema.screening.id, &[h.cinema.seat_b.id], fixtures::customer())
        .await
        .unwrap();

    let all = h.service.get_all_bookings().await.unwrap();

    let ids: Vec<_> = all.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert_eq!(all[0].tickets.len(), 1);
}

#[tokio::test]
async fn missing_booking_reads_as_none() {
    let h = harness().await;

    let booking = h
        .service
        .get_booking_by_id(cinema_booking_core::BookingId::new())
        .await
        .unwrap();

    assert!(booking.is_none());
}
