//! Business metrics for the booking core.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `cinema_bookings_total{status}` - Bookings by outcome (created, placed, expired, failed, refunded)
//! - `cinema_seat_conflicts_total` - Reservations lost to another booking
//! - `cinema_tickets_refunded_total` - Individually cancelled tickets
//! - `cinema_revenue_cents_total` - Value of placed bookings in cents

use ::metrics::{counter, describe_counter};

/// Register metric descriptions. Call once at startup, before any metric is recorded.
pub fn register_booking_metrics() {
    describe_counter!(
        "cinema_bookings_total",
        "Total number of bookings by status (created, placed, expired, failed, refunded)"
    );
    describe_counter!(
        "cinema_seat_conflicts_total",
        "Seat reservations rejected because another booking holds the seat"
    );
    describe_counter!(
        "cinema_tickets_refunded_total",
        "Tickets cancelled individually with a cancellation charge"
    );
    describe_counter!(
        "cinema_revenue_cents_total",
        "Total value of placed bookings in cents"
    );
}

pub(crate) fn record_booking(status: &'static str) {
    counter!("cinema_bookings_total", "status" => status).increment(1);
}

pub(crate) fn record_seat_conflict() {
    counter!("cinema_seat_conflicts_total").increment(1);
}

pub(crate) fn record_revenue(cents: u64) {
    counter!("cinema_revenue_cents_total").increment(cents);
}

pub(crate) fn record_ticket_refund() {
    counter!("cinema_tickets_refunded_total").increment(1);
}
