//! Persistence collaborator for the booking core.
//!
//! The orchestrator never talks to a database directly. Every operation opens
//! a [`BookingTransaction`] from a [`BookingStore`], performs all of its reads
//! and writes through it, and then commits or rolls back as a unit.
//!
//! # Implementations
//!
//! - `PostgresBookingStore` (in `cinema-booking-postgres`): production storage
//! - `InMemoryBookingStore` (in `cinema-booking-testing`): fast, deterministic tests
//!
//! # Isolation
//!
//! Implementations must make [`BookingTransaction::reserve_seat`] a
//! compare-and-set: when two transactions race for the same seat, exactly one
//! of them may observe `true`. The `lock_*` reads must block concurrent
//! writers to the same row until the transaction ends.
//!
//! Dropping a transaction without calling [`BookingTransaction::commit`]
//! discards its writes.

use crate::error::StoreError;
use crate::types::{
    Booking, BookingId, Cinema, CinemaId, CityPricing, Money, Screen, ScreenId, Screening,
    ScreeningId, Seat, SeatAvailability, SeatClass, SeatId, Ticket, TicketId, TimeOfDay,
};
use std::future::Future;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Factory for units of work.
pub trait BookingStore: Send + Sync {
    /// Transaction type produced by [`begin`](Self::begin).
    type Transaction: BookingTransaction;

    /// Open a new transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no connection is available.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Transaction>> + Send;
}

/// A single atomic unit of work over the booking tables.
///
/// Lookups return `Ok(None)` for missing rows; errors are reserved for storage
/// failures.
pub trait BookingTransaction: Send {
    // ------------------------------------------------------------------
    // Collaborator lookups
    // ------------------------------------------------------------------

    /// Load a screening.
    fn screening(
        &mut self,
        id: ScreeningId,
    ) -> impl Future<Output = StoreResult<Option<Screening>>> + Send;

    /// Load a screening and lock it against concurrent counter updates.
    fn lock_screening(
        &mut self,
        id: ScreeningId,
    ) -> impl Future<Output = StoreResult<Option<Screening>>> + Send;

    /// Load a seat.
    fn seat(&mut self, id: SeatId) -> impl Future<Output = StoreResult<Option<Seat>>> + Send;

    /// Capacity of one seat class on a screen.
    fn screen_capacity(
        &mut self,
        screen_id: ScreenId,
        class: SeatClass,
    ) -> impl Future<Output = StoreResult<Option<u32>>> + Send;

    /// City a cinema prices against.
    fn city_of_cinema(
        &mut self,
        cinema_id: CinemaId,
    ) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Exact-match price lookup.
    fn price_rule(
        &mut self,
        city: &str,
        class: SeatClass,
        time_of_day: TimeOfDay,
    ) -> impl Future<Output = StoreResult<Option<Money>>> + Send;

    // ------------------------------------------------------------------
    // Seat availability ledger
    // ------------------------------------------------------------------

    /// Availability record for a seat, `None` if never provisioned.
    fn seat_availability(
        &mut self,
        screening_id: ScreeningId,
        seat_id: SeatId,
    ) -> impl Future<Output = StoreResult<Option<SeatAvailability>>> + Send;

    /// Conditionally mark a seat held by `booking_id`.
    ///
    /// Succeeds (returns `true`) only if the record exists and is free or
    /// already held by the same booking. Must be atomic per (screening, seat).
    fn reserve_seat(
        &mut self,
        screening_id: ScreeningId,
        seat_id: SeatId,
        booking_id: BookingId,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Mark a seat free. No-op if it already is.
    fn release_seat(
        &mut self,
        screening_id: ScreeningId,
        seat_id: SeatId,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Overwrite one class's sold counter on a screening.
    fn set_sold_count(
        &mut self,
        screening_id: ScreeningId,
        class: SeatClass,
        value: u32,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    // ------------------------------------------------------------------
    // Bookings and tickets
    // ------------------------------------------------------------------

    /// Insert a booking row. Tickets are inserted separately.
    fn insert_booking(&mut self, booking: &Booking) -> impl Future<Output = StoreResult<()>> + Send;

    /// Persist a booking's status and total price.
    fn update_booking(&mut self, booking: &Booking) -> impl Future<Output = StoreResult<()>> + Send;

    /// Load a booking with its tickets and lock it.
    fn lock_booking(
        &mut self,
        id: BookingId,
    ) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// Load a booking with its tickets.
    fn booking(&mut self, id: BookingId) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// All bookings with their tickets, oldest first.
    fn bookings(&mut self) -> impl Future<Output = StoreResult<Vec<Booking>>> + Send;

    /// Insert a ticket row.
    fn insert_ticket(&mut self, ticket: &Ticket) -> impl Future<Output = StoreResult<()>> + Send;

    /// Persist a ticket's price and refund stamp.
    fn update_ticket(&mut self, ticket: &Ticket) -> impl Future<Output = StoreResult<()>> + Send;

    /// Load a ticket.
    fn ticket(&mut self, id: TicketId) -> impl Future<Output = StoreResult<Option<Ticket>>> + Send;

    // ------------------------------------------------------------------
    // Unit of work
    // ------------------------------------------------------------------

    /// Make every write of this transaction durable.
    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Discard every write of this transaction.
    fn rollback(self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Scheduling-side writes that set up what the booking core consumes.
///
/// Cinema, screen and seat management live outside the core; this trait is the
/// narrow slice of it that fixtures, demos and integration tests need.
pub trait Provisioning: Send + Sync {
    /// Register a cinema.
    fn add_cinema(&self, cinema: &Cinema) -> impl Future<Output = StoreResult<()>> + Send;

    /// Register a screen. The cinema must exist.
    fn add_screen(&self, screen: &Screen) -> impl Future<Output = StoreResult<()>> + Send;

    /// Register a seat. The screen must exist.
    fn add_seat(&self, seat: &Seat) -> impl Future<Output = StoreResult<()>> + Send;

    /// Schedule a screening and create a free availability record for every
    /// seat currently on its screen.
    fn add_screening(&self, screening: &Screening) -> impl Future<Output = StoreResult<()>> + Send;

    /// Insert or replace a price rule.
    fn add_price_rule(&self, rule: &CityPricing) -> impl Future<Output = StoreResult<()>> + Send;
}
