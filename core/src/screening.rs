//! Screening aggregate: per-class sold counters.
//!
//! Counters move only in the transaction that places or cancels the bookings
//! behind them. A change that would take a counter outside `[0, capacity]`
//! means the orchestrator is about to double-count or double-release, so it is
//! reported as [`BookingError::SoldCounterOutOfRange`] instead of clamped.

use crate::error::{BookingError, Result};
use crate::store::BookingTransaction;
use crate::types::{ScreeningId, SeatClass};

/// Apply `delta` to a counter, checking the `[0, capacity]` range.
///
/// # Errors
///
/// Returns [`BookingError::SoldCounterOutOfRange`] if the result leaves the range.
pub fn apply_delta(
    screening_id: ScreeningId,
    seat_class: SeatClass,
    current: u32,
    delta: i64,
    capacity: u32,
) -> Result<u32> {
    let out_of_range = || BookingError::SoldCounterOutOfRange {
        screening_id,
        seat_class,
        current,
        delta,
        capacity,
    };

    let next = i64::from(current)
        .checked_add(delta)
        .ok_or_else(out_of_range)?;
    if next < 0 || next > i64::from(capacity) {
        return Err(out_of_range());
    }
    u32::try_from(next).map_err(|_| out_of_range())
}

/// Add `count` confirmed seats of `seat_class`. Returns the new counter.
///
/// # Errors
///
/// - [`BookingError::InvalidScreening`] if the screening does not exist
/// - [`BookingError::SoldCounterOutOfRange`] if capacity would be exceeded
/// - [`BookingError::Store`] on storage failure
pub async fn increment_sold<T: BookingTransaction>(
    tx: &mut T,
    screening_id: ScreeningId,
    seat_class: SeatClass,
    count: u32,
) -> Result<u32> {
    adjust_sold(tx, screening_id, seat_class, i64::from(count)).await
}

/// Remove `count` confirmed seats of `seat_class`. Returns the new counter.
///
/// # Errors
///
/// - [`BookingError::InvalidScreening`] if the screening does not exist
/// - [`BookingError::SoldCounterOutOfRange`] if the counter would go negative
/// - [`BookingError::Store`] on storage failure
pub async fn decrement_sold<T: BookingTransaction>(
    tx: &mut T,
    screening_id: ScreeningId,
    seat_class: SeatClass,
    count: u32,
) -> Result<u32> {
    adjust_sold(tx, screening_id, seat_class, -i64::from(count)).await
}

async fn adjust_sold<T: BookingTransaction>(
    tx: &mut T,
    screening_id: ScreeningId,
    seat_class: SeatClass,
    delta: i64,
) -> Result<u32> {
    let screening = tx
        .lock_screening(screening_id)
        .await?
        .ok_or(BookingError::InvalidScreening(screening_id))?;
    // A screen without a capacity entry for the class has no such seats.
    let capacity = tx
        .screen_capacity(screening.screen_id, seat_class)
        .await?
        .unwrap_or(0);

    let current = screening.sold.get(seat_class);
    let next = apply_delta(screening_id, seat_class, current, delta, capacity)?;
    tx.set_sold_count(screening_id, seat_class, next).await?;

    tracing::debug!(
        screening_id = %screening_id,
        seat_class = %seat_class,
        from = current,
        to = next,
        "Sold counter updated"
    );
    Ok(next)
}
