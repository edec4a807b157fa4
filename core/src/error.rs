//! Error types for booking operations.
//!
//! Every failure the orchestrator can report is a variant of [`BookingError`].
//! Variants are grouped by [`ErrorKind`] so callers can decide how to present
//! them without matching every case.

use crate::types::{
    BookingId, CinemaId, PaymentStatus, ScreenId, ScreeningId, SeatClass, SeatId, TicketId,
    TimeOfDay,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by a persistence backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped to a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Provisioning referenced a record that does not exist.
    #[error("Missing reference: {0}")]
    MissingReference(String),
}

/// Broad category of a [`BookingError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller input is structurally invalid; nothing was written.
    Validation,
    /// Another booking won the race for a seat.
    Conflict,
    /// No price could be resolved; configuration gap.
    Pricing,
    /// Operation not valid for the booking's state or timing.
    Lifecycle,
    /// An internal invariant would have been broken.
    Consistency,
    /// The storage layer failed.
    Persistence,
}

/// Errors returned by the booking orchestrator.
#[derive(Error, Debug)]
pub enum BookingError {
    /// The screening does not exist.
    #[error("Invalid screening: {0}")]
    InvalidScreening(ScreeningId),

    /// The booking request named no seats.
    #[error("No seats selected")]
    NoSeatsSelected,

    /// The same seat was requested twice.
    #[error("Seat {0} requested more than once")]
    DuplicateSeat(SeatId),

    /// The seat does not exist.
    #[error("Unknown seat: {0}")]
    UnknownSeat(SeatId),

    /// The seat exists but belongs to a different screen.
    #[error("Seat {seat_id} is not part of screen {screen_id}")]
    SeatNotInScreen {
        /// Requested seat
        seat_id: SeatId,
        /// Screen of the screening
        screen_id: ScreenId,
    },

    /// Another booking holds the seat.
    #[error("Seat {seat_id} is unavailable for screening {screening_id}")]
    SeatUnavailable {
        /// Screening
        screening_id: ScreeningId,
        /// Seat that could not be reserved
        seat_id: SeatId,
        /// Current holder, when known
        held_by: Option<BookingId>,
    },

    /// No pricing rule for the combination.
    #[error("No price for {seat_class} seats in {city} ({time_of_day})")]
    PriceNotFound {
        /// City
        city: String,
        /// Seat class
        seat_class: SeatClass,
        /// Time-of-day bucket
        time_of_day: TimeOfDay,
    },

    /// The cinema's city could not be resolved.
    #[error("No city recorded for cinema {0}")]
    CityNotFound(CinemaId),

    /// The booking does not exist.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// The ticket does not exist.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// The booking was not placed within its timeout and is now failed.
    #[error("Booking {booking_id} timed out after {timeout_minutes} minutes")]
    BookingTimeout {
        /// Expired booking
        booking_id: BookingId,
        /// When it was created
        created_at: DateTime<Utc>,
        /// Timeout that applied
        timeout_minutes: i64,
    },

    /// The screening starts too soon to cancel.
    #[error("Ticket {ticket_id} can no longer be cancelled (screening starts {starts_at})")]
    LateCancellation {
        /// Ticket
        ticket_id: TicketId,
        /// Screening start
        starts_at: DateTime<Utc>,
    },

    /// The operation needs a paid booking.
    #[error("Booking {booking_id} is {status}, not PAID")]
    BookingNotPaid {
        /// Booking
        booking_id: BookingId,
        /// Its current status
        status: PaymentStatus,
    },

    /// A payment status change outside the state machine.
    #[error("Booking {booking_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Booking
        booking_id: BookingId,
        /// Current status
        from: PaymentStatus,
        /// Requested status
        to: PaymentStatus,
    },

    /// A sold counter would leave `[0, capacity]`.
    #[error(
        "Sold counter for {seat_class} seats on screening {screening_id} out of range: \
         {current} {delta:+} (capacity {capacity})"
    )]
    SoldCounterOutOfRange {
        /// Screening
        screening_id: ScreeningId,
        /// Seat class
        seat_class: SeatClass,
        /// Counter before the change
        current: u32,
        /// Requested change
        delta: i64,
        /// Capacity for the class
        capacity: u32,
    },

    /// No availability record exists for the seat and screening.
    #[error("Seat {seat_id} is not provisioned for screening {screening_id}")]
    SeatNotProvisioned {
        /// Screening
        screening_id: ScreeningId,
        /// Seat
        seat_id: SeatId,
    },

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidScreening(_)
            | Self::NoSeatsSelected
            | Self::DuplicateSeat(_)
            | Self::UnknownSeat(_)
            | Self::SeatNotInScreen { .. } => ErrorKind::Validation,
            Self::SeatUnavailable { .. } => ErrorKind::Conflict,
            Self::PriceNotFound { .. } | Self::CityNotFound(_) => ErrorKind::Pricing,
            Self::BookingNotFound(_)
            | Self::TicketNotFound(_)
            | Self::BookingTimeout { .. }
            | Self::LateCancellation { .. }
            | Self::BookingNotPaid { .. } => ErrorKind::Lifecycle,
            Self::InvalidTransition { .. }
            | Self::SoldCounterOutOfRange { .. }
            | Self::SeatNotProvisioned { .. } => ErrorKind::Consistency,
            Self::Store(_) => ErrorKind::Persistence,
        }
    }
}

/// Result alias for booking operations.
pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_not_found_display() {
        let error = BookingError::PriceNotFound {
            city: "Leeds".to_string(),
            seat_class: SeatClass::Vip,
            time_of_day: TimeOfDay::Morning,
        };

        let display = format!("{error}");
        assert!(display.contains("vip"));
        assert!(display.contains("Leeds"));
        assert!(display.contains("morning"));
        assert_eq!(error.kind(), ErrorKind::Pricing);
    }

    #[test]
    fn counter_out_of_range_shows_signed_delta() {
        let error = BookingError::SoldCounterOutOfRange {
            screening_id: ScreeningId::new(),
            seat_class: SeatClass::Lower,
            current: 0,
            delta: -1,
            capacity: 10,
        };

        assert!(format!("{error}").contains("0 -1"));
        assert_eq!(error.kind(), ErrorKind::Consistency);
    }

    #[test]
    fn store_errors_are_persistence() {
        let error = BookingError::from(StoreError::Database("connection reset".to_string()));
        assert_eq!(error.kind(), ErrorKind::Persistence);
        assert_eq!(error.to_string(), "Database error: connection reset");
    }
}
