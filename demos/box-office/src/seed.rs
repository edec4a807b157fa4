//! Demo data: one cinema, one screen and an afternoon screening next week.

use chrono::{Duration, NaiveTime, Utc};
use cinema_booking_core::{
    Cinema, CinemaId, CityPricing, ClassCounts, FilmId, Money, Provisioning, Screen, ScreenId,
    Screening, ScreeningId, Seat, SeatClass, StoreResult, TimeOfDay,
};

const CITY: &str = "Springfield";

/// What [`seed`] created.
pub struct BoxOffice {
    pub cinema: Cinema,
    pub screening: Screening,
    pub seat_a1: Seat,
    pub seat_b1: Seat,
}

/// Provision the demo cinema and its afternoon prices.
///
/// The screening starts a week from now at 14:00 UTC, far enough ahead for
/// ticket cancellations to be accepted.
pub async fn seed<P: Provisioning>(store: &P) -> Result<BoxOffice, Box<dyn std::error::Error>> {
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
    let seats = [
        Seat::new(cinema.id, screen.id, "A", 1, SeatClass::Lower),
        Seat::new(cinema.id, screen.id, "A", 2, SeatClass::Lower),
        Seat::new(cinema.id, screen.id, "B", 1, SeatClass::Upper),
        Seat::new(cinema.id, screen.id, "V", 1, SeatClass::Vip),
    ];
    let start_time = NaiveTime::from_hms_opt(14, 0, 0).ok_or("invalid start time")?;
    let screening = Screening {
        id: ScreeningId::new(),
        film_id: FilmId::new(),
        screen_id: screen.id,
        cinema_id: cinema.id,
        date: (Utc::now() + Duration::days(7)).date_naive(),
        start_time,
        sold: ClassCounts::default(),
    };

    store.add_cinema(&cinema).await?;
    store.add_screen(&screen).await?;
    for seat in &seats {
        store.add_seat(seat).await?;
    }
    store.add_screening(&screening).await?;
    add_afternoon_prices(store).await?;

    let [seat_a1, _, seat_b1, _] = seats;
    Ok(BoxOffice {
        cinema,
        screening,
        seat_a1,
        seat_b1,
    })
}

async fn add_afternoon_prices<P: Provisioning>(store: &P) -> StoreResult<()> {
    for (seat_class, cents) in [
        (SeatClass::Lower, 2000),
        (SeatClass::Upper, 2500),
        (SeatClass::Vip, 4000),
    ] {
        store
            .add_price_rule(&CityPricing {
                city: CITY.to_string(),
                seat_class,
                time_of_day: TimeOfDay::Afternoon,
                price: Money::from_cents(cents),
            })
            .await?;
    }
    Ok(())
}
