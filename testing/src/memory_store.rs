//! In-memory booking store for fast, deterministic testing.
//!
//! Provides a [`BookingStore`] whose transactions work on a private copy of
//! the tables:
//! - [`InMemoryBookingStore`]: shared tables behind a single async mutex
//! - [`InMemoryTransaction`]: holds the mutex for its whole lifetime
//!
//! Transactions are fully serialized. That is a stronger guarantee than the
//! Postgres store gives, but it honours the same contract: writes become
//! visible on commit and vanish on rollback or drop.

use cinema_booking_core::store::{BookingStore, BookingTransaction, Provisioning, StoreResult};
use cinema_booking_core::{
    Booking, BookingId, Cinema, CinemaId, CityPricing, Money, Screen, ScreenId, Screening,
    ScreeningId, Seat, SeatAvailability, SeatClass, SeatId, StoreError, Ticket, TicketId,
    TimeOfDay,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type PriceKey = (String, SeatClass, TimeOfDay);

#[derive(Clone, Debug, Default)]
struct Tables {
    cinemas: HashMap<CinemaId, Cinema>,
    screens: HashMap<ScreenId, Screen>,
    seats: HashMap<SeatId, Seat>,
    screenings: HashMap<ScreeningId, Screening>,
    prices: HashMap<PriceKey, Money>,
    availability: HashMap<(ScreeningId, SeatId), Option<BookingId>>,
    // Insertion order doubles as creation order.
    bookings: Vec<Booking>,
    tickets: Vec<Ticket>,
}

impl Tables {
    fn booking_with_tickets(&self, id: BookingId) -> Option<Booking> {
        let mut booking = self.bookings.iter().find(|b| b.id == id)?.clone();
        booking.tickets = self
            .tickets
            .iter()
            .filter(|t| t.booking_id == id)
            .cloned()
            .collect();
        Some(booking)
    }
}

/// In-memory booking store.
///
/// Cloning the store shares the underlying tables.
///
/// # Example
///
/// ```
/// use cinema_booking_testing::InMemoryBookingStore;
/// use cinema_booking_core::store::{BookingStore, BookingTransaction};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryBookingStore::new();
///
/// let mut tx = store.begin().await?;
/// assert!(tx.bookings().await?.is_empty());
/// tx.rollback().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryBookingStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryBookingStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed bookings
    pub async fn booking_count(&self) -> usize {
        self.tables.lock().await.bookings.len()
    }

    /// Number of committed tickets
    pub async fn ticket_count(&self) -> usize {
        self.tables.lock().await.tickets.len()
    }

    /// Seats currently held for a screening, with their holders
    pub async fn held_seats(&self, screening_id: ScreeningId) -> Vec<(SeatId, BookingId)> {
        let tables = self.tables.lock().await;
        let mut held: Vec<_> = tables
            .availability
            .iter()
            .filter(|((screening, _), _)| *screening == screening_id)
            .filter_map(|((_, seat), holder)| holder.map(|booking| (*seat, booking)))
            .collect();
        held.sort();
        held
    }
}

impl BookingStore for InMemoryBookingStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<InMemoryTransaction> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

impl Provisioning for InMemoryBookingStore {
    async fn add_cinema(&self, cinema: &Cinema) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .cinemas
            .insert(cinema.id, cinema.clone());
        Ok(())
    }

    async fn add_screen(&self, screen: &Screen) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.cinemas.contains_key(&screen.cinema_id) {
            return Err(StoreError::MissingReference(format!(
                "cinema {} for screen {}",
                screen.cinema_id, screen.id
            )));
        }
        tables.screens.insert(screen.id, screen.clone());
        Ok(())
    }

    async fn add_seat(&self, seat: &Seat) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.screens.contains_key(&seat.screen_id) {
            return Err(StoreError::MissingReference(format!(
                "screen {} for seat {}",
                seat.screen_id, seat.id
            )));
        }
        tables.seats.insert(seat.id, seat.clone());
        Ok(())
    }

    async fn add_screening(&self, screening: &Screening) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.screens.contains_key(&screening.screen_id) {
            return Err(StoreError::MissingReference(format!(
                "screen {} for screening {}",
                screening.screen_id, screening.id
            )));
        }

        let seat_ids: Vec<SeatId> = tables
            .seats
            .values()
            .filter(|seat| seat.screen_id == screening.screen_id)
            .map(|seat| seat.id)
            .collect();
        for seat_id in seat_ids {
            tables.availability.insert((screening.id, seat_id), None);
        }
        tables.screenings.insert(screening.id, screening.clone());
        Ok(())
    }

    async fn add_price_rule(&self, rule: &CityPricing) -> StoreResult<()> {
        self.tables.lock().await.prices.insert(
            (rule.city.clone(), rule.seat_class, rule.time_of_day),
            rule.price,
        );
        Ok(())
    }
}

/// Unit of work over an [`InMemoryBookingStore`].
///
/// Holds the store lock until committed, rolled back or dropped.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl std::fmt::Debug for InMemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransaction")
            .field("bookings", &self.working.bookings.len())
            .field("tickets", &self.working.tickets.len())
            .finish_non_exhaustive()
    }
}

impl BookingTransaction for InMemoryTransaction {
    async fn screening(&mut self, id: ScreeningId) -> StoreResult<Option<Screening>> {
        Ok(self.working.screenings.get(&id).cloned())
    }

    async fn lock_screening(&mut self, id: ScreeningId) -> StoreResult<Option<Screening>> {
        // The whole store is already locked.
        self.screening(id).await
    }

    async fn seat(&mut self, id: SeatId) -> StoreResult<Option<Seat>> {
        Ok(self.working.seats.get(&id).cloned())
    }

    async fn screen_capacity(
        &mut self,
        screen_id: ScreenId,
        class: SeatClass,
    ) -> StoreResult<Option<u32>> {
        Ok(self
            .working
            .screens
            .get(&screen_id)
            .map(|screen| screen.capacity.get(class)))
    }

    async fn city_of_cinema(&mut self, cinema_id: CinemaId) -> StoreResult<Option<String>> {
        Ok(self
            .working
            .cinemas
            .get(&cinema_id)
            .map(|cinema| cinema.city.clone()))
    }

    async fn price_rule(
        &mut self,
        city: &str,
        class: SeatClass,
        time_of_day: TimeOfDay,
    ) -> StoreResult<Option<Money>> {
        Ok(self
            .working
            .prices
            .get(&(city.to_string(), class, time_of_day))
            .copied())
    }

    async fn seat_availability(
        &mut self,
        screening_id: ScreeningId,
        seat_id: SeatId,
    ) -> StoreResult<Option<SeatAvailability>> {
        Ok(self
            .working
            .availability
            .get(&(screening_id, seat_id))
            .map(|held_by| SeatAvailability {
                screening_id,
                seat_id,
                held_by: *held_by,
            }))
    }

    async fn reserve_seat(
        &mut self,
        screening_id: ScreeningId,
        seat_id: SeatId,
        booking_id: BookingId,
    ) -> StoreResult<bool> {
        match self.working.availability.get_mut(&(screening_id, seat_id)) {
            Some(holder) if holder.is_none() || *holder == Some(booking_id) => {
                *holder = Some(booking_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_seat(&mut self, screening_id: ScreeningId, seat_id: SeatId) -> StoreResult<()> {
        if let Some(holder) = self.working.availability.get_mut(&(screening_id, seat_id)) {
            *holder = None;
        }
        Ok(())
    }

    async fn set_sold_count(
        &mut self,
        screening_id: ScreeningId,
        class: SeatClass,
        value: u32,
    ) -> StoreResult<()> {
        let screening = self
            .working
            .screenings
            .get_mut(&screening_id)
            .ok_or_else(|| StoreError::MissingReference(format!("screening {screening_id}")))?;
        screening.sold.set(class, value);
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        if !self.working.screenings.contains_key(&booking.screening_id) {
            return Err(StoreError::MissingReference(format!(
                "screening {} for booking {}",
                booking.screening_id, booking.id
            )));
        }
        let mut row = booking.clone();
        row.tickets.clear();
        self.working.bookings.push(row);
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let row = self
            .working
            .bookings
            .iter_mut()
            .find(|b| b.id == booking.id)
            .ok_or_else(|| StoreError::MissingReference(format!("booking {}", booking.id)))?;
        row.status = booking.status;
        row.total_price = booking.total_price;
        Ok(())
    }

    async fn lock_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        self.booking(id).await
    }

    async fn booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.working.booking_with_tickets(id))
    }

    async fn bookings(&mut self) -> StoreResult<Vec<Booking>> {
        let ids: Vec<BookingId> = self.working.bookings.iter().map(|b| b.id).collect();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.working.booking_with_tickets(id))
            .collect())
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        if !self.working.bookings.iter().any(|b| b.id == ticket.booking_id) {
            return Err(StoreError::MissingReference(format!(
                "booking {} for ticket {}",
                ticket.booking_id, ticket.id
            )));
        }
        self.working.tickets.push(ticket.clone());
        Ok(())
    }

    async fn update_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        let row = self
            .working
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket.id)
            .ok_or_else(|| StoreError::MissingReference(format!("ticket {}", ticket.id)))?;
        row.price = ticket.price;
        row.refunded_at = ticket.refunded_at;
        Ok(())
    }

    async fn ticket(&mut self, id: TicketId) -> StoreResult<Option<Ticket>> {
        Ok(self.working.tickets.iter().find(|t| t.id == id).cloned())
    }

    async fn commit(mut self) -> StoreResult<()> {
        *self.guard = self.working;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use cinema_booking_core::{ClassCounts, Customer, FilmId};
    use chrono::{NaiveDate, NaiveTime, Utc};

    async fn provisioned() -> (InMemoryBookingStore, Screening, Seat) {
        let store = InMemoryBookingStore::new();
        let cinema = Cinema {
            id: CinemaId::new(),
            name: "Roxy".to_string(),
            city: "Springfield".to_string(),
        };
        let screen = Screen {
            id: ScreenId::new(),
            cinema_id: cinema.id,
            name: "1".to_string(),
            capacity: ClassCounts::new(1, 0, 0),
        };
        let seat = Seat::new(cinema.id, screen.id, "A", 1, SeatClass::Lower);
        let screening = Screening {
            id: ScreeningId::new(),
            film_id: FilmId::new(),
            screen_id: screen.id,
            cinema_id: cinema.id,
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            sold: ClassCounts::default(),
        };
        store.add_cinema(&cinema).await.unwrap();
        store.add_screen(&screen).await.unwrap();
        store.add_seat(&seat).await.unwrap();
        store.add_screening(&screening).await.unwrap();
        (store, screening, seat)
    }

    fn booking_for(screening: &Screening) -> Booking {
        Booking::pending(
            screening.id,
            Customer::new("Ada", "ada@example.com", "555-0100"),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn add_screening_provisions_free_seats() {
        let (store, screening, seat) = provisioned().await;

        let mut tx = store.begin().await.unwrap();
        let record = tx.seat_availability(screening.id, seat.id).await.unwrap();

        assert_eq!(record, Some(SeatAvailability::free(screening.id, seat.id)));
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let (store, screening, _) = provisioned().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking_for(&screening)).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let (store, screening, _) = provisioned().await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_booking(&booking_for(&screening)).await.unwrap();
        }

        assert_eq!(store.booking_count().await, 0);
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let (store, screening, _) = provisioned().await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking_for(&screening)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.booking_count().await, 1);
    }

    #[tokio::test]
    async fn reserve_is_compare_and_set() {
        let (store, screening, seat) = provisioned().await;
        let first = BookingId::new();
        let second = BookingId::new();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.reserve_seat(screening.id, seat.id, first).await.unwrap());
        assert!(tx.reserve_seat(screening.id, seat.id, first).await.unwrap());
        assert!(!tx.reserve_seat(screening.id, seat.id, second).await.unwrap());

        tx.release_seat(screening.id, seat.id).await.unwrap();
        assert!(tx.reserve_seat(screening.id, seat.id, second).await.unwrap());
    }

    #[tokio::test]
    async fn reserve_unprovisioned_seat_fails() {
        let (store, screening, _) = provisioned().await;
        let stranger = SeatId::for_position(CinemaId::new(), ScreenId::new(), "Z", 99);

        let mut tx = store.begin().await.unwrap();
        let reserved = tx
            .reserve_seat(screening.id, stranger, BookingId::new())
            .await
            .unwrap();

        assert!(!reserved);
    }

    #[tokio::test]
    async fn ticket_requires_booking() {
        let (store, screening, seat) = provisioned().await;
        let ticket = Ticket {
            id: TicketId::new(),
            booking_id: BookingId::new(),
            screening_id: screening.id,
            seat_id: seat.id,
            seat_class: seat.class,
            original_ticket_price: Money::from_cents(100),
            price: Money::from_cents(100),
            issue_date: Utc::now(),
            qr_code: None,
            refunded_at: None,
        };

        let mut tx = store.begin().await.unwrap();
        let result = tx.insert_ticket(&ticket).await;

        assert!(matches!(result, Err(StoreError::MissingReference(_))));
    }
}
