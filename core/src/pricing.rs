//! Pricing resolver.
//!
//! Maps (city, seat class, time of day) to a ticket price by exact lookup in
//! the city pricing table. There is no fallback price: a missing rule aborts
//! the booking that needed it.

use crate::error::{BookingError, Result};
use crate::store::BookingTransaction;
use crate::types::{CinemaId, Money, SeatClass, TimeOfDay};

/// Resolve the price of one seat.
///
/// # Errors
///
/// - [`BookingError::PriceNotFound`] if no rule matches
/// - [`BookingError::Store`] on storage failure
pub async fn resolve_price<T: BookingTransaction>(
    tx: &mut T,
    city: &str,
    seat_class: SeatClass,
    time_of_day: TimeOfDay,
) -> Result<Money> {
    tx.price_rule(city, seat_class, time_of_day)
        .await?
        .ok_or_else(|| BookingError::PriceNotFound {
            city: city.to_string(),
            seat_class,
            time_of_day,
        })
}

/// City a cinema's tickets are priced against.
///
/// # Errors
///
/// - [`BookingError::CityNotFound`] if the cinema has no city
/// - [`BookingError::Store`] on storage failure
pub async fn city_for<T: BookingTransaction>(tx: &mut T, cinema_id: CinemaId) -> Result<String> {
    tx.city_of_cinema(cinema_id)
        .await?
        .ok_or(BookingError::CityNotFound(cinema_id))
}
