//! Ticket factory.
//!
//! Issues one ticket per booked seat, freezing the resolved price, and applies
//! the cancellation policy to individual tickets.

use crate::config::BookingConfig;
use crate::error::{BookingError, Result};
use crate::store::BookingTransaction;
use crate::types::{BookingId, Money, Screening, Seat, Ticket, TicketId};
use chrono::{DateTime, Duration, Utc};

/// Creates and cancels tickets.
#[derive(Debug, Clone)]
pub struct TicketFactory {
    cancellation_notice: Duration,
    cancellation_charge_percent: u32,
}

impl TicketFactory {
    /// Create a factory with an explicit cancellation policy.
    #[must_use]
    pub fn new(cancellation_notice: Duration, cancellation_charge_percent: u32) -> Self {
        Self {
            cancellation_notice,
            cancellation_charge_percent: cancellation_charge_percent.min(100),
        }
    }

    /// Create a factory from the booking configuration.
    #[must_use]
    pub fn from_config(config: &BookingConfig) -> Self {
        Self::new(config.cancellation_notice(), config.cancellation_charge_percent)
    }

    /// Issue and persist the ticket for one seat.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on storage failure.
    pub async fn issue<T: BookingTransaction>(
        &self,
        tx: &mut T,
        booking_id: BookingId,
        seat: &Seat,
        screening: &Screening,
        price: Money,
        now: DateTime<Utc>,
    ) -> Result<Ticket> {
        let id = TicketId::new();
        let ticket = Ticket {
            id,
            booking_id,
            screening_id: screening.id,
            seat_id: seat.id,
            seat_class: seat.class,
            original_ticket_price: price,
            price,
            issue_date: now,
            qr_code: Some(qr_payload(id, booking_id, screening, seat)),
            refunded_at: None,
        };
        tx.insert_ticket(&ticket).await?;
        Ok(ticket)
    }

    /// Whether a ticket for a screening starting at `starts_at` may still be
    /// cancelled at `now`.
    #[must_use]
    pub fn can_cancel(&self, starts_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        starts_at - now > self.cancellation_notice
    }

    /// Apply the cancellation charge to a ticket and mark it refunded.
    ///
    /// Does not persist; the caller writes the ticket back together with the
    /// seat release. A ticket that is already refunded is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::LateCancellation`] when the screening starts
    /// within the cancellation notice.
    pub fn cancel(
        &self,
        ticket: &mut Ticket,
        starts_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if ticket.is_refunded() {
            return Ok(());
        }
        if !self.can_cancel(starts_at, now) {
            return Err(BookingError::LateCancellation {
                ticket_id: ticket.id,
                starts_at,
            });
        }

        ticket.price = ticket
            .price
            .deduct_percent(100 - self.cancellation_charge_percent);
        ticket.refunded_at = Some(now);
        Ok(())
    }
}

impl Default for TicketFactory {
    fn default() -> Self {
        Self::from_config(&BookingConfig::default())
    }
}

/// Text encoded into the ticket's QR code.
fn qr_payload(ticket_id: TicketId, booking_id: BookingId, screening: &Screening, seat: &Seat) -> String {
    format!(
        "TICKET:{ticket_id}|BOOKING:{booking_id}|SCREENING:{}|SEAT:{}|START:{}",
        screening.id,
        seat.label(),
        screening.starts_at().to_rfc3339(),
    )
}
