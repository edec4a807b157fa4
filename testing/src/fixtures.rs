//! Seeded test data.
//!
//! [`provision`] registers one cinema in Springfield with a single screen:
//!
//! | Seat | Class |
//! |------|-------|
//! | A1   | Lower |
//! | A2   | Lower |
//! | B1   | Upper |
//! | V1   | VIP   |
//!
//! and one afternoon screening on 2025-06-15 at 14:00. Lower and Upper seats
//! are priced for the afternoon (20.00 and 25.00); VIP deliberately has no
//! price rule so tests can trigger a pricing failure.
//!
//! Every call creates fresh ids, so several fixtures can live in one store.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use cinema_booking_core::store::{Provisioning, StoreResult};
use cinema_booking_core::{
    Cinema, CinemaId, CityPricing, ClassCounts, Customer, FilmId, Money, Screen, ScreenId,
    Screening, ScreeningId, Seat, SeatClass, TimeOfDay,
};

/// City every fixture cinema prices against.
pub const CITY: &str = "Springfield";

/// Afternoon price of a Lower seat.
pub const LOWER_AFTERNOON: Money = Money::from_cents(2000);

/// Afternoon price of an Upper seat.
pub const UPPER_AFTERNOON: Money = Money::from_cents(2500);

/// Handles to everything [`provision`] created.
#[derive(Debug, Clone)]
pub struct CinemaFixture {
    /// The cinema
    pub cinema: Cinema,
    /// Its only screen
    pub screen: Screen,
    /// Seat A1 (Lower)
    pub seat_a: Seat,
    /// Seat A2 (Lower)
    pub seat_a2: Seat,
    /// Seat B1 (Upper)
    pub seat_b: Seat,
    /// Seat V1 (VIP, unpriced)
    pub vip_seat: Seat,
    /// The screening
    pub screening: Screening,
}

impl CinemaFixture {
    /// All seats on the screen.
    #[must_use]
    pub fn seats(&self) -> [&Seat; 4] {
        [&self.seat_a, &self.seat_a2, &self.seat_b, &self.vip_seat]
    }
}

/// Afternoon price rules for Lower and Upper seats.
#[must_use]
pub fn default_price_rules() -> Vec<CityPricing> {
    vec![
        price_rule(SeatClass::Lower, TimeOfDay::Afternoon, LOWER_AFTERNOON),
        price_rule(SeatClass::Upper, TimeOfDay::Afternoon, UPPER_AFTERNOON),
    ]
}

/// A price rule for [`CITY`].
#[must_use]
pub fn price_rule(seat_class: SeatClass, time_of_day: TimeOfDay, price: Money) -> CityPricing {
    CityPricing {
        city: CITY.to_string(),
        seat_class,
        time_of_day,
        price,
    }
}

/// Provision the standard fixture with the default price rules.
///
/// # Errors
///
/// Returns any error from the store.
pub async fn provision<P: Provisioning>(store: &P) -> StoreResult<CinemaFixture> {
    provision_at(store, afternoon(), &default_price_rules()).await
}

/// Provision the standard fixture with a custom start time and price rules.
///
/// # Errors
///
/// Returns any error from the store.
pub async fn provision_at<P: Provisioning>(
    store: &P,
    start_time: NaiveTime,
    rules: &[CityPricing],
) -> StoreResult<CinemaFixture> {
    let cinema = Cinema {
        id: CinemaId::new(),
        name: "Roxy".to_string(),
        city: CITY.to_string(),
    };
    let screen = Screen {
        id: ScreenId::new(),
        cinema_id: cinema.id,
        name: "Screen 1".to_string(),
        capacity: ClassCounts::new(2, 1, 1),
    };
    let seat_a = Seat::new(cinema.id, screen.id, "A", 1, SeatClass::Lower);
    let seat_a2 = Seat::new(cinema.id, screen.id, "A", 2, SeatClass::Lower);
    let seat_b = Seat::new(cinema.id, screen.id, "B", 1, SeatClass::Upper);
    let vip_seat = Seat::new(cinema.id, screen.id, "V", 1, SeatClass::Vip);
    let screening = Screening {
        id: ScreeningId::new(),
        film_id: FilmId::new(),
        screen_id: screen.id,
        cinema_id: cinema.id,
        date: screening_date(),
        start_time,
        sold: ClassCounts::default(),
    };

    store.add_cinema(&cinema).await?;
    store.add_screen(&screen).await?;
    for seat in [&seat_a, &seat_a2, &seat_b, &vip_seat] {
        store.add_seat(seat).await?;
    }
    store.add_screening(&screening).await?;
    for rule in rules {
        store.add_price_rule(rule).await?;
    }

    Ok(CinemaFixture {
        cinema,
        screen,
        seat_a,
        seat_a2,
        seat_b,
        vip_seat,
        screening,
    })
}

/// A customer for bookings.
#[must_use]
pub fn customer() -> Customer {
    Customer::new("Ada Lovelace", "ada@example.com", "555-0100")
}

/// Date of the fixture screening.
///
/// # Panics
///
/// Never in practice; the date is hardcoded.
#[must_use]
#[allow(clippy::expect_used)]
pub fn screening_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).expect("hardcoded date is valid")
}

/// 14:00, an afternoon start.
///
/// # Panics
///
/// Never in practice; the time is hardcoded.
#[must_use]
#[allow(clippy::expect_used)]
pub fn afternoon() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).expect("hardcoded time is valid")
}

/// Two weeks before the fixture screening, well outside every deadline.
///
/// # Panics
///
/// Never in practice; the timestamp is hardcoded.
#[must_use]
#[allow(clippy::expect_used)]
pub fn booking_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0)
        .single()
        .expect("hardcoded timestamp is valid")
}
