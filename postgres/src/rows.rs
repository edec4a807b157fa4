//! Row decoding and column conversions.
//!
//! Queries fetch plain tuples; these helpers turn them into domain records and
//! reject values the schema should never have let through.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use cinema_booking_core::{
    Booking, BookingId, CinemaId, ClassCounts, Customer, FilmId, Money, PaymentStatus, ScreenId,
    Screening, ScreeningId, Seat, SeatClass, SeatId, StoreError, StoreResult, Ticket, TicketId,
};
use uuid::Uuid;

pub(crate) type ScreeningRow = (Uuid, Uuid, Uuid, Uuid, NaiveDate, NaiveTime, i32, i32, i32);

pub(crate) type SeatRow = (Uuid, Uuid, Uuid, String, i32, String);

pub(crate) type BookingRow = (Uuid, Uuid, String, String, String, i64, String, DateTime<Utc>);

pub(crate) type TicketRow = (
    Uuid,
    Uuid,
    Uuid,
    Uuid,
    String,
    i64,
    i64,
    DateTime<Utc>,
    Option<String>,
    Option<DateTime<Utc>>,
);

/// Map a `sqlx` error, singling out foreign-key violations.
pub(crate) fn db_error(error: sqlx::Error) -> StoreError {
    match error.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => {
            StoreError::MissingReference(db.message().to_string())
        }
        _ => StoreError::Database(error.to_string()),
    }
}

pub(crate) fn money_to_db(money: Money) -> StoreResult<i64> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Corrupt(format!("amount {money} does not fit in BIGINT")))
}

pub(crate) fn money_from_db(cents: i64) -> StoreResult<Money> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Corrupt(format!("negative amount: {cents}")))
}

pub(crate) fn count_to_db(count: u32) -> StoreResult<i32> {
    i32::try_from(count).map_err(|_| StoreError::Corrupt(format!("count {count} out of range")))
}

pub(crate) fn count_from_db(count: i32) -> StoreResult<u32> {
    u32::try_from(count).map_err(|_| StoreError::Corrupt(format!("negative count: {count}")))
}

pub(crate) fn seat_class_from_db(value: &str) -> StoreResult<SeatClass> {
    SeatClass::parse(value).ok_or_else(|| StoreError::Corrupt(format!("unknown seat class: {value}")))
}

pub(crate) fn status_from_db(value: &str) -> StoreResult<PaymentStatus> {
    PaymentStatus::parse(value)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown payment status: {value}")))
}

pub(crate) fn screening_from_row(row: ScreeningRow) -> StoreResult<Screening> {
    let (id, film_id, screen_id, cinema_id, date, start_time, lower, upper, vip) = row;
    Ok(Screening {
        id: ScreeningId::from_uuid(id),
        film_id: FilmId::from_uuid(film_id),
        screen_id: ScreenId::from_uuid(screen_id),
        cinema_id: CinemaId::from_uuid(cinema_id),
        date,
        start_time,
        sold: ClassCounts::new(
            count_from_db(lower)?,
            count_from_db(upper)?,
            count_from_db(vip)?,
        ),
    })
}

pub(crate) fn seat_from_row(row: SeatRow) -> StoreResult<Seat> {
    let (id, cinema_id, screen_id, seat_row, number, class) = row;
    Ok(Seat {
        id: SeatId::from_uuid(id),
        cinema_id: CinemaId::from_uuid(cinema_id),
        screen_id: ScreenId::from_uuid(screen_id),
        row: seat_row,
        number: u16::try_from(number)
            .map_err(|_| StoreError::Corrupt(format!("seat number out of range: {number}")))?,
        class: seat_class_from_db(&class)?,
    })
}

/// Decode a booking row. Tickets are attached by the caller.
pub(crate) fn booking_from_row(row: BookingRow) -> StoreResult<Booking> {
    let (id, screening_id, name, email, phone, total, status, created_at) = row;
    Ok(Booking {
        id: BookingId::from_uuid(id),
        screening_id: ScreeningId::from_uuid(screening_id),
        customer: Customer::new(name, email, phone),
        total_price: money_from_db(total)?,
        status: status_from_db(&status)?,
        created_at,
        tickets: Vec::new(),
    })
}

pub(crate) fn ticket_from_row(row: TicketRow) -> StoreResult<Ticket> {
    let (id, booking_id, screening_id, seat_id, class, original, price, issue_date, qr_code, refunded_at) =
        row;
    Ok(Ticket {
        id: TicketId::from_uuid(id),
        booking_id: BookingId::from_uuid(booking_id),
        screening_id: ScreeningId::from_uuid(screening_id),
        seat_id: SeatId::from_uuid(seat_id),
        seat_class: seat_class_from_db(&class)?,
        original_ticket_price: money_from_db(original)?,
        price: money_from_db(price)?,
        issue_date,
        qr_code,
        refunded_at,
    })
}
