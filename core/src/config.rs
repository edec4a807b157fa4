//! Booking policy configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_TIMEOUT_MINUTES: i64 = 30;
const DEFAULT_NOTICE_HOURS: i64 = 24;

/// Policy knobs for the booking orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Minutes a pending booking may wait before placement fails it (default: 30)
    pub booking_timeout_minutes: i64,
    /// Hours before the screening after which tickets can no longer be cancelled (default: 24)
    pub cancellation_notice_hours: i64,
    /// Percentage of the ticket price kept on cancellation (default: 50)
    pub cancellation_charge_percent: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            booking_timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            cancellation_notice_hours: DEFAULT_NOTICE_HOURS,
            cancellation_charge_percent: 50,
        }
    }
}

impl BookingConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset, unparsable or out-of-range variables fall back to the defaults:
    ///
    /// - `BOOKING_TIMEOUT_MINUTES` (30)
    /// - `CANCELLATION_NOTICE_HOURS` (24)
    /// - `CANCELLATION_CHARGE_PERCENT` (50, capped at 100)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            booking_timeout_minutes: env::var("BOOKING_TIMEOUT_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|minutes| timeout_from_minutes(*minutes).is_some())
                .unwrap_or(defaults.booking_timeout_minutes),
            cancellation_notice_hours: env::var("CANCELLATION_NOTICE_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|hours| notice_from_hours(*hours).is_some())
                .unwrap_or(defaults.cancellation_notice_hours),
            cancellation_charge_percent: env::var("CANCELLATION_CHARGE_PERCENT")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .map_or(defaults.cancellation_charge_percent, |percent| percent.min(100)),
        }
    }

    /// Placement timeout as a duration.
    ///
    /// Falls back to 30 minutes when `booking_timeout_minutes` is not positive
    /// or does not fit in a [`Duration`].
    #[must_use]
    pub fn booking_timeout(&self) -> Duration {
        timeout_from_minutes(self.booking_timeout_minutes)
            .unwrap_or_else(|| Duration::minutes(DEFAULT_TIMEOUT_MINUTES))
    }

    /// Minimum notice for a ticket cancellation.
    ///
    /// Falls back to 24 hours when `cancellation_notice_hours` is negative or
    /// does not fit in a [`Duration`].
    #[must_use]
    pub fn cancellation_notice(&self) -> Duration {
        notice_from_hours(self.cancellation_notice_hours)
            .unwrap_or_else(|| Duration::hours(DEFAULT_NOTICE_HOURS))
    }
}

fn timeout_from_minutes(minutes: i64) -> Option<Duration> {
    Duration::try_minutes(minutes).filter(|timeout| *timeout > Duration::zero())
}

fn notice_from_hours(hours: i64) -> Option<Duration> {
    Duration::try_hours(hours).filter(|notice| *notice >= Duration::zero())
}
