//! # Cinema Booking Core
//!
//! Seat reservation and booking consistency for a cinema chain.
//!
//! This crate owns the rules that keep bookings, tickets, seat holds and the
//! per-screening sold counters consistent with each other, no matter how many
//! customers race for the same seats.
//!
//! ## Core Concepts
//!
//! - **Screening**: one showing of a film on a screen, with sold counters per seat class
//! - **Seat availability**: one record per (screening, seat), free or held by a booking
//! - **Booking**: a customer's set of tickets, moving `PENDING → PAID → REFUNDED`
//!   or `PENDING → FAILED`
//! - **Ticket**: one seat of a booking, with its price frozen at creation
//! - **Store**: transactional persistence behind [`store::BookingStore`]
//!
//! ## Architecture
//!
//! - [`orchestrator::BookingService`] is the only writer of availability and counters
//! - Every operation runs in exactly one transaction; failures roll back entirely
//! - Seat conflicts are resolved by a compare-and-set in [`ledger::reserve`]
//! - Time is injected through [`environment::Clock`]
//!
//! ## Example
//!
//! ```ignore
//! use cinema_booking_core::*;
//!
//! let service = BookingService::new(store, Arc::new(SystemClock), BookingConfig::default());
//!
//! let booking = service
//!     .create_booking(screening_id, &[seat_id], Customer::new("Ada", "ada@example.com", "555-0100"))
//!     .await?;
//!
//! match service.place_booking(booking.id).await {
//!     Ok(outcome) => assert!(outcome.is_placed()),
//!     Err(BookingError::SeatUnavailable { .. }) => { /* somebody was faster */ }
//!     Err(e) => return Err(e),
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod pricing;
pub mod screening;
pub mod store;
pub mod tickets;
pub mod types;

pub use config::BookingConfig;
pub use environment::{Clock, SystemClock};
pub use error::{BookingError, ErrorKind, Result, StoreError};
pub use orchestrator::{BookingService, CancelOutcome, PlaceOutcome};
pub use store::{BookingStore, BookingTransaction, Provisioning, StoreResult};
pub use types::*;

/// Environment module - injected dependencies
///
/// Everything that would make the core non-deterministic is behind a trait
/// here so tests can substitute a fixed implementation.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
