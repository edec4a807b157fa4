//! Booking orchestrator.
//!
//! The only component that mutates seat availability and sold counters. Each
//! public operation runs in exactly one [`BookingTransaction`]: it either
//! commits as a whole or rolls back as a whole.
//!
//! # Booking lifecycle
//!
//! ```text
//! create_booking ──► PENDING ──place_booking──► PAID ──cancel_booking──► REFUNDED
//!                       │
//!                       ├──place_booking after timeout──► FAILED
//!                       └──cancel_booking───────────────► FAILED
//! ```
//!
//! Seats are held when a booking is placed, not when it is created. A
//! pending booking therefore never blocks anybody else's seats.
//!
//! # Expiry
//!
//! Expiry is pull-based. A pending booking only becomes FAILED when someone
//! tries to place it after the timeout. Nothing sweeps abandoned bookings; they
//! stay PENDING until revisited.

use crate::config::BookingConfig;
use crate::environment::Clock;
use crate::error::{BookingError, Result};
use crate::metrics::{record_booking, record_revenue, record_ticket_refund};
use crate::store::{BookingStore, BookingTransaction};
use crate::tickets::TicketFactory;
use crate::types::{
    Booking, BookingId, ClassCounts, Customer, Money, PaymentStatus, Screening, ScreeningId, Seat,
    SeatClass, SeatId, Ticket, TicketId,
};
use crate::{ledger, pricing, screening};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of [`BookingService::place_booking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// Seats are now held and the booking is paid.
    Placed,
    /// The booking was already paid; nothing changed.
    AlreadyPlaced,
    /// The booking is failed or refunded and cannot be placed.
    Closed(PaymentStatus),
}

impl PlaceOutcome {
    /// Whether the booking is paid after the call.
    #[must_use]
    pub const fn is_placed(&self) -> bool {
        matches!(self, Self::Placed | Self::AlreadyPlaced)
    }
}

/// Result of [`BookingService::cancel_booking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A paid booking released its seats and is now refunded.
    Refunded,
    /// A pending booking was abandoned and is now failed.
    Voided,
    /// The booking was already terminal; nothing changed.
    AlreadyClosed(PaymentStatus),
}

impl CancelOutcome {
    /// Whether the booking is closed after the call. Always true: cancelling
    /// an existing booking never fails.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Refunded | Self::Voided | Self::AlreadyClosed(_))
    }
}

/// What a placement attempt did inside its transaction.
enum Placement {
    Placed { total: Money },
    Expired { created_at: DateTime<Utc> },
    Unchanged(PlaceOutcome),
}

/// Creates, places and cancels bookings.
///
/// # Example
///
/// ```ignore
/// let service = BookingService::new(store, Arc::new(SystemClock), BookingConfig::from_env());
///
/// let booking = service
///     .create_booking(screening_id, &[seat_a, seat_b], customer)
///     .await?;
/// service.place_booking(booking.id).await?;
/// ```
pub struct BookingService<S: BookingStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
    tickets: TicketFactory,
}

impl<S: BookingStore> BookingService<S> {
    /// Create a service over a store.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: BookingConfig) -> Self {
        let tickets = TicketFactory::from_config(&config);
        Self {
            store,
            clock,
            config,
            tickets,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BookingConfig {
        &self.config
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Create a pending booking with one priced ticket per seat.
    ///
    /// Seats are validated and priced but not held.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidScreening`] if the screening does not exist
    /// - [`BookingError::NoSeatsSelected`] if `seat_ids` is empty
    /// - [`BookingError::DuplicateSeat`], [`BookingError::UnknownSeat`],
    ///   [`BookingError::SeatNotInScreen`] for bad seat selections
    /// - [`BookingError::PriceNotFound`] / [`BookingError::CityNotFound`] if any
    ///   seat cannot be priced; nothing is persisted
    /// - [`BookingError::Store`] on storage failure
    #[tracing::instrument(
        skip_all,
        fields(screening_id = %screening_id, seats = seat_ids.len())
    )]
    pub async fn create_booking(
        &self,
        screening_id: ScreeningId,
        seat_ids: &[SeatId],
        customer: Customer,
    ) -> Result<Booking> {
        let mut tx = self.store.begin().await?;
        let result = self.create_in(&mut tx, screening_id, seat_ids, customer).await;
        let booking = finish(tx, result).await?;

        record_booking("created");
        tracing::info!(
            booking_id = %booking.id,
            total = %booking.total_price,
            tickets = booking.tickets.len(),
            "Booking created"
        );
        Ok(booking)
    }

    /// Place a booking using the configured timeout.
    ///
    /// # Errors
    ///
    /// See [`place_booking_within`](Self::place_booking_within).
    pub async fn place_booking(&self, booking_id: BookingId) -> Result<PlaceOutcome> {
        self.place_booking_within(booking_id, self.config.booking_timeout())
            .await
    }

    /// Place a pending booking: hold all its seats and count them as sold.
    ///
    /// Either every seat becomes held or none does. Placing a paid booking is
    /// a no-op; failed and refunded bookings report [`PlaceOutcome::Closed`].
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] if the booking does not exist
    /// - [`BookingError::BookingTimeout`] if `timeout` has elapsed since creation;
    ///   the booking is marked FAILED before this is returned
    /// - [`BookingError::SeatUnavailable`] if another booking holds one of the seats
    /// - [`BookingError::SoldCounterOutOfRange`] if placing would exceed capacity
    /// - [`BookingError::Store`] on storage failure
    #[tracing::instrument(skip_all, fields(booking_id = %booking_id))]
    pub async fn place_booking_within(
        &self,
        booking_id: BookingId,
        timeout: Duration,
    ) -> Result<PlaceOutcome> {
        let mut tx = self.store.begin().await?;
        let result = self.place_in(&mut tx, booking_id, timeout).await;

        match finish(tx, result).await? {
            Placement::Placed { total } => {
                record_booking("placed");
                record_revenue(total.cents());
                tracing::info!(total = %total, "Booking placed");
                Ok(PlaceOutcome::Placed)
            }
            Placement::Expired { created_at } => {
                record_booking("expired");
                tracing::warn!(created_at = %created_at, "Booking expired before placement");
                Err(BookingError::BookingTimeout {
                    booking_id,
                    created_at,
                    timeout_minutes: timeout.num_minutes(),
                })
            }
            Placement::Unchanged(outcome) => {
                tracing::debug!(?outcome, "Placement left booking unchanged");
                Ok(outcome)
            }
        }
    }

    /// Cancel a booking.
    ///
    /// Paid bookings release their seats and become REFUNDED; pending bookings
    /// become FAILED; terminal bookings are left alone. Repeating a
    /// cancellation is always safe.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] if the booking does not exist
    /// - [`BookingError::Store`] on storage failure
    #[tracing::instrument(skip_all, fields(booking_id = %booking_id))]
    pub async fn cancel_booking(&self, booking_id: BookingId) -> Result<CancelOutcome> {
        let mut tx = self.store.begin().await?;
        let result = self.cancel_in(&mut tx, booking_id).await;
        let outcome = finish(tx, result).await?;

        match outcome {
            CancelOutcome::Refunded => {
                record_booking("refunded");
                tracing::info!("Booking refunded");
            }
            CancelOutcome::Voided => {
                record_booking("failed");
                tracing::info!("Pending booking cancelled");
            }
            CancelOutcome::AlreadyClosed(status) => {
                tracing::debug!(%status, "Booking already closed");
            }
        }
        Ok(outcome)
    }

    /// Cancel a single ticket of a paid booking.
    ///
    /// The cancellation charge is applied to the ticket, its seat is released
    /// and its class counter decremented. Once every ticket of the booking is
    /// refunded the booking itself becomes REFUNDED. Cancelling a refunded
    /// ticket returns it unchanged.
    ///
    /// # Errors
    ///
    /// - [`BookingError::TicketNotFound`] if the ticket does not exist
    /// - [`BookingError::BookingNotPaid`] if the booking is not PAID
    /// - [`BookingError::LateCancellation`] inside the cancellation notice
    /// - [`BookingError::Store`] on storage failure
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket_id))]
    pub async fn cancel_ticket(&self, ticket_id: TicketId) -> Result<Ticket> {
        let mut tx = self.store.begin().await?;
        let result = self.cancel_ticket_in(&mut tx, ticket_id).await;
        let (ticket, newly_refunded) = finish(tx, result).await?;

        if newly_refunded {
            record_ticket_refund();
            tracing::info!(
                booking_id = %ticket.booking_id,
                charge = %ticket.price,
                "Ticket cancelled"
            );
        }
        Ok(ticket)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Load a booking with its tickets.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on storage failure.
    pub async fn get_booking_by_id(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let mut tx = self.store.begin().await?;
        let result = tx.booking(booking_id).await.map_err(BookingError::from);
        finish_read(tx, result).await
    }

    /// Load every booking with its tickets.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on storage failure.
    pub async fn get_all_bookings(&self) -> Result<Vec<Booking>> {
        let mut tx = self.store.begin().await?;
        let result = tx.bookings().await.map_err(BookingError::from);
        finish_read(tx, result).await
    }

    /// Whether a seat is free for a screening.
    ///
    /// For display only: writers re-check inside their own transaction.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on storage failure.
    pub async fn is_seat_available(
        &self,
        screening_id: ScreeningId,
        seat_id: SeatId,
    ) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        let result = ledger::is_available(&mut tx, screening_id, seat_id).await;
        finish_read(tx, result).await
    }

    /// Load a screening, including its sold counters.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Store`] on storage failure.
    pub async fn get_screening(&self, screening_id: ScreeningId) -> Result<Option<Screening>> {
        let mut tx = self.store.begin().await?;
        let result = tx.screening(screening_id).await.map_err(BookingError::from);
        finish_read(tx, result).await
    }

    // ========================================================================
    // Transaction bodies
    // ========================================================================

    async fn create_in(
        &self,
        tx: &mut S::Transaction,
        screening_id: ScreeningId,
        seat_ids: &[SeatId],
        customer: Customer,
    ) -> Result<Booking> {
        let screening = tx
            .screening(screening_id)
            .await?
            .ok_or(BookingError::InvalidScreening(screening_id))?;
        if seat_ids.is_empty() {
            return Err(BookingError::NoSeatsSelected);
        }
        let seats = load_seats(tx, &screening, seat_ids).await?;

        let city = pricing::city_for(tx, screening.cinema_id).await?;
        let time_of_day = screening.time_of_day();
        let now = self.clock.now();

        let mut booking = Booking::pending(screening_id, customer, now);
        tx.insert_booking(&booking).await?;

        let mut total = Money::ZERO;
        for seat in &seats {
            let price = pricing::resolve_price(tx, &city, seat.class, time_of_day).await?;
            let ticket = self
                .tickets
                .issue(tx, booking.id, seat, &screening, price, now)
                .await?;
            total = total.saturating_add(price);
            booking.tickets.push(ticket);
        }

        booking.total_price = total;
        tx.update_booking(&booking).await?;
        Ok(booking)
    }

    async fn place_in(
        &self,
        tx: &mut S::Transaction,
        booking_id: BookingId,
        timeout: Duration,
    ) -> Result<Placement> {
        let mut booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        match booking.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Paid => return Ok(Placement::Unchanged(PlaceOutcome::AlreadyPlaced)),
            status @ (PaymentStatus::Failed | PaymentStatus::Refunded) => {
                return Ok(Placement::Unchanged(PlaceOutcome::Closed(status)));
            }
        }

        if self.clock.now() - booking.created_at >= timeout {
            transition(&mut booking, PaymentStatus::Failed)?;
            tx.update_booking(&booking).await?;
            return Ok(Placement::Expired {
                created_at: booking.created_at,
            });
        }

        let screening_id = booking.screening_id;
        tx.lock_screening(screening_id)
            .await?
            .ok_or(BookingError::InvalidScreening(screening_id))?;

        let mut seats_by_class = ClassCounts::default();
        for ticket in booking.active_tickets() {
            ledger::reserve(tx, screening_id, ticket.seat_id, booking.id).await?;
            seats_by_class.add(ticket.seat_class, 1);
        }
        for class in SeatClass::ALL {
            let count = seats_by_class.get(class);
            if count > 0 {
                screening::increment_sold(tx, screening_id, class, count).await?;
            }
        }

        transition(&mut booking, PaymentStatus::Paid)?;
        tx.update_booking(&booking).await?;
        Ok(Placement::Placed {
            total: booking.total_price,
        })
    }

    async fn cancel_in(
        &self,
        tx: &mut S::Transaction,
        booking_id: BookingId,
    ) -> Result<CancelOutcome> {
        let mut booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        match booking.status {
            PaymentStatus::Paid => {
                let screening_id = booking.screening_id;
                tx.lock_screening(screening_id)
                    .await?
                    .ok_or(BookingError::InvalidScreening(screening_id))?;

                let mut seats_by_class = ClassCounts::default();
                for ticket in booking.active_tickets() {
                    ledger::release(tx, screening_id, ticket.seat_id).await?;
                    seats_by_class.add(ticket.seat_class, 1);
                }
                for class in SeatClass::ALL {
                    let count = seats_by_class.get(class);
                    if count > 0 {
                        screening::decrement_sold(tx, screening_id, class, count).await?;
                    }
                }

                transition(&mut booking, PaymentStatus::Refunded)?;
                tx.update_booking(&booking).await?;
                Ok(CancelOutcome::Refunded)
            }
            PaymentStatus::Pending => {
                transition(&mut booking, PaymentStatus::Failed)?;
                tx.update_booking(&booking).await?;
                Ok(CancelOutcome::Voided)
            }
            status @ (PaymentStatus::Failed | PaymentStatus::Refunded) => {
                Ok(CancelOutcome::AlreadyClosed(status))
            }
        }
    }

    async fn cancel_ticket_in(
        &self,
        tx: &mut S::Transaction,
        ticket_id: TicketId,
    ) -> Result<(Ticket, bool)> {
        let booking_id = tx
            .ticket(ticket_id)
            .await?
            .ok_or(BookingError::TicketNotFound(ticket_id))?
            .booking_id;
        let mut booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        // Re-read the ticket now that the booking is locked.
        let Some(index) = booking.tickets.iter().position(|t| t.id == ticket_id) else {
            return Err(BookingError::TicketNotFound(ticket_id));
        };
        if booking.tickets[index].is_refunded() {
            return Ok((booking.tickets[index].clone(), false));
        }
        if booking.status != PaymentStatus::Paid {
            return Err(BookingError::BookingNotPaid {
                booking_id,
                status: booking.status,
            });
        }

        let screening = tx
            .lock_screening(booking.screening_id)
            .await?
            .ok_or(BookingError::InvalidScreening(booking.screening_id))?;

        let mut ticket = booking.tickets[index].clone();
        self.tickets
            .cancel(&mut ticket, screening.starts_at(), self.clock.now())?;

        ledger::release(tx, screening.id, ticket.seat_id).await?;
        screening::decrement_sold(tx, screening.id, ticket.seat_class, 1).await?;
        tx.update_ticket(&ticket).await?;
        booking.tickets[index] = ticket.clone();

        if booking.tickets.iter().all(Ticket::is_refunded) {
            transition(&mut booking, PaymentStatus::Refunded)?;
            tx.update_booking(&booking).await?;
            record_booking("refunded");
        }
        Ok((ticket, true))
    }
}

/// Load and validate the requested seats, preserving request order.
async fn load_seats<T: BookingTransaction>(
    tx: &mut T,
    screening: &Screening,
    seat_ids: &[SeatId],
) -> Result<Vec<Seat>> {
    let mut seen = HashSet::with_capacity(seat_ids.len());
    let mut seats = Vec::with_capacity(seat_ids.len());

    for &seat_id in seat_ids {
        if !seen.insert(seat_id) {
            return Err(BookingError::DuplicateSeat(seat_id));
        }
        let seat = tx
            .seat(seat_id)
            .await?
            .ok_or(BookingError::UnknownSeat(seat_id))?;
        if seat.screen_id != screening.screen_id {
            return Err(BookingError::SeatNotInScreen {
                seat_id,
                screen_id: screening.screen_id,
            });
        }
        seats.push(seat);
    }
    Ok(seats)
}

/// Move a booking along the payment state machine.
fn transition(booking: &mut Booking, next: PaymentStatus) -> Result<()> {
    if !booking.status.can_transition_to(next) {
        return Err(BookingError::InvalidTransition {
            booking_id: booking.id,
            from: booking.status,
            to: next,
        });
    }
    tracing::debug!(from = %booking.status, to = %next, "Booking status transition");
    booking.status = next;
    Ok(())
}

/// Commit on success, roll back on failure.
///
/// A failed rollback is logged; the caller still gets the original error.
async fn finish<T: BookingTransaction, R>(tx: T, result: Result<R>) -> Result<R> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::error!(error = %rollback_error, "Rollback failed");
            }
            tracing::warn!(error = %error, kind = ?error.kind(), "Transaction rolled back");
            Err(error)
        }
    }
}

/// Close a read-only transaction.
async fn finish_read<T: BookingTransaction, R>(tx: T, result: Result<R>) -> Result<R> {
    if let Err(error) = tx.rollback().await {
        tracing::warn!(error = %error, "Failed to close read transaction");
    }
    result
}
