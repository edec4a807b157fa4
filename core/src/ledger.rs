//! Seat availability ledger.
//!
//! The ledger is the only mutual-exclusion point in the system: "no seat is
//! sold twice" reduces to [`reserve`] being a compare-and-set per
//! (screening, seat). Everything here runs inside the caller's transaction.

use crate::error::{BookingError, Result};
use crate::store::BookingTransaction;
use crate::types::{BookingId, ScreeningId, SeatId};

/// Whether nobody holds the seat for the screening.
///
/// Unprovisioned seats report unavailable.
///
/// # Errors
///
/// Returns [`BookingError::Store`] on storage failure.
pub async fn is_available<T: BookingTransaction>(
    tx: &mut T,
    screening_id: ScreeningId,
    seat_id: SeatId,
) -> Result<bool> {
    Ok(tx
        .seat_availability(screening_id, seat_id)
        .await?
        .is_some_and(|record| record.is_free()))
}

/// Hold a seat for a booking.
///
/// Re-reserving a seat the same booking already holds succeeds.
///
/// # Errors
///
/// - [`BookingError::SeatUnavailable`] if a different booking holds it
/// - [`BookingError::SeatNotProvisioned`] if the screening has no record for the seat
/// - [`BookingError::Store`] on storage failure
pub async fn reserve<T: BookingTransaction>(
    tx: &mut T,
    screening_id: ScreeningId,
    seat_id: SeatId,
    booking_id: BookingId,
) -> Result<()> {
    if tx.reserve_seat(screening_id, seat_id, booking_id).await? {
        return Ok(());
    }

    // Lost the compare-and-set; find out why for the caller.
    match tx.seat_availability(screening_id, seat_id).await? {
        None => Err(BookingError::SeatNotProvisioned {
            screening_id,
            seat_id,
        }),
        Some(record) => {
            crate::metrics::record_seat_conflict();
            Err(BookingError::SeatUnavailable {
                screening_id,
                seat_id,
                held_by: record.held_by,
            })
        }
    }
}

/// Free a seat. Releasing a free seat is a no-op.
///
/// # Errors
///
/// Returns [`BookingError::Store`] on storage failure.
pub async fn release<T: BookingTransaction>(
    tx: &mut T,
    screening_id: ScreeningId,
    seat_id: SeatId,
) -> Result<()> {
    tx.release_seat(screening_id, seat_id).await?;
    Ok(())
}
