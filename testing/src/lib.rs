//! # Cinema Booking Testing
//!
//! Testing utilities for the cinema booking core.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - An in-memory [`BookingStore`](cinema_booking_core::BookingStore)
//! - Fixtures that provision a small cinema through any
//!   [`Provisioning`](cinema_booking_core::Provisioning) store
//!
//! ## Example
//!
//! ```ignore
//! use cinema_booking_testing::{fixtures, InMemoryBookingStore, ManualClock};
//!
//! #[tokio::test]
//! async fn test_booking_flow() {
//!     let store = Arc::new(InMemoryBookingStore::new());
//!     let cinema = fixtures::provision(store.as_ref()).await.unwrap();
//!     let clock = ManualClock::new(fixtures::booking_time());
//!     let service = BookingService::new(store, Arc::new(clock), BookingConfig::default());
//!
//!     let booking = service
//!         .create_booking(cinema.screening.id, &[cinema.seat_a.id], fixtures::customer())
//!         .await
//!         .unwrap();
//!     assert_eq!(booking.total_price, Money::from_cents(2000));
//! }
//! ```

use chrono::{DateTime, Utc};
use cinema_booking_core::environment::Clock;

pub mod fixtures;
pub mod memory_store;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use cinema_booking_testing::mocks::FixedClock;
    /// use cinema_booking_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the service under test.
    ///
    /// # Example
    ///
    /// ```
    /// use cinema_booking_testing::mocks::ManualClock;
    /// use cinema_booking_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = ManualClock::new(Utc::now());
    /// let handle = clock.clone();
    /// let before = clock.now();
    ///
    /// handle.advance(Duration::minutes(31));
    /// assert_eq!(clock.now() - before, Duration::minutes(31));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities
pub mod helpers {
    /// Route `tracing` output through the test harness.
    ///
    /// Honours `RUST_LOG`; safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use helpers::init_test_tracing;
pub use memory_store::{InMemoryBookingStore, InMemoryTransaction};
pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn manual_clock_handles_share_time() {
        let clock = ManualClock::new(test_clock().now());
        let handle = clock.clone();

        handle.advance(Duration::hours(2));

        assert_eq!(clock.now(), test_clock().now() + Duration::hours(2));
    }
}
