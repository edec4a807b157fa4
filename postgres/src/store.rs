//! `PostgreSQL` implementation of the booking store.
//!
//! Every [`PostgresTransaction`] wraps one `sqlx` transaction. Rows that the
//! orchestrator mutates are locked with `SELECT ... FOR NO KEY UPDATE` in a
//! fixed order (booking, then screening, then seat availability) so concurrent
//! operations queue instead of deadlocking. Only non-key columns are written
//! under those locks, so foreign-key checks from concurrent inserts still pass.
//!
//! Seat reservation is a single conditional `UPDATE`; the row lock it takes
//! makes the second of two racing transactions re-check `held_by` after the
//! first commits, so only one of them can win.

use crate::config::DatabaseConfig;
use crate::rows::{
    BookingRow, ScreeningRow, SeatRow, TicketRow, booking_from_row, count_from_db, count_to_db,
    db_error, money_from_db, money_to_db, screening_from_row, seat_from_row, ticket_from_row,
};
use cinema_booking_core::store::{BookingStore, BookingTransaction, Provisioning, StoreResult};
use cinema_booking_core::{
    Booking, BookingId, Cinema, CinemaId, CityPricing, Money, Screen, ScreenId, Screening,
    ScreeningId, Seat, SeatAvailability, SeatClass, SeatId, StoreError, Ticket, TicketId,
    TimeOfDay,
};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// Booking store backed by `PostgreSQL`.
///
/// # Example
///
/// ```no_run
/// use cinema_booking_postgres::PostgresBookingStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresBookingStore::connect("postgres://localhost/cinema").await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        Self::connect_with(&DatabaseConfig::new(database_url)).await
    }

    /// Connect using an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect_with(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = config
            .connect()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the booking tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

impl BookingStore for PostgresBookingStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> StoreResult<PostgresTransaction> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(PostgresTransaction { tx })
    }
}

impl Provisioning for PostgresBookingStore {
    async fn add_cinema(&self, cinema: &Cinema) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO cinemas (id, name, city) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, city = EXCLUDED.city
            ",
        )
        .bind(cinema.id.as_uuid())
        .bind(&cinema.name)
        .bind(&cinema.city)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn add_screen(&self, screen: &Screen) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO screens (id, cinema_id, name, lower_capacity, upper_capacity, vip_capacity)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(screen.id.as_uuid())
        .bind(screen.cinema_id.as_uuid())
        .bind(&screen.name)
        .bind(count_to_db(screen.capacity.lower)?)
        .bind(count_to_db(screen.capacity.upper)?)
        .bind(count_to_db(screen.capacity.vip)?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn add_seat(&self, seat: &Seat) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO seats (id, cinema_id, screen_id, seat_row, seat_number, seat_class)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(seat.id.as_uuid())
        .bind(seat.cinema_id.as_uuid())
        .bind(seat.screen_id.as_uuid())
        .bind(&seat.row)
        .bind(i32::from(seat.number))
        .bind(seat.class.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn add_screening(&self, screening: &Screening) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r"
            INSERT INTO screenings (
                id, film_id, screen_id, cinema_id, screening_date, start_time,
                lower_sold, upper_sold, vip_sold
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(screening.id.as_uuid())
        .bind(screening.film_id.as_uuid())
        .bind(screening.screen_id.as_uuid())
        .bind(screening.cinema_id.as_uuid())
        .bind(screening.date)
        .bind(screening.start_time)
        .bind(count_to_db(screening.sold.lower)?)
        .bind(count_to_db(screening.sold.upper)?)
        .bind(count_to_db(screening.sold.vip)?)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        let provisioned = sqlx::query(
            r"
            INSERT INTO seat_availability (screening_id, seat_id)
            SELECT $1, id FROM seats WHERE screen_id = $2
            ",
        )
        .bind(screening.id.as_uuid())
        .bind(screening.screen_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?
        .rows_affected();

        tx.commit().await.map_err(db_error)?;

        tracing::debug!(
            screening_id = %screening.id,
            seats = provisioned,
            "Screening provisioned"
        );
        Ok(())
    }

    async fn add_price_rule(&self, rule: &CityPricing) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO city_pricing (city, seat_class, time_of_day, price_cents)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (city, seat_class, time_of_day)
            DO UPDATE SET price_cents = EXCLUDED.price_cents
            ",
        )
        .bind(&rule.city)
        .bind(rule.seat_class.as_str())
        .bind(rule.time_of_day.as_str())
        .bind(money_to_db(rule.price)?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

/// Unit of work over a [`PostgresBookingStore`].
///
/// Dropping it without committing rolls the transaction back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction").finish_non_exhaustive()
    }
}

impl PostgresTransaction {
    async fn fetch_screening(
        &mut self,
        id: ScreeningId,
        lock: bool,
    ) -> StoreResult<Option<Screening>> {
        let sql = if lock {
            r"
            SELECT id, film_id, screen_id, cinema_id, screening_date, start_time,
                   lower_sold, upper_sold, vip_sold
            FROM screenings WHERE id = $1
            FOR NO KEY UPDATE
            "
        } else {
            r"
            SELECT id, film_id, screen_id, cinema_id, screening_date, start_time,
                   lower_sold, upper_sold, vip_sold
            FROM screenings WHERE id = $1
            "
        };

        sqlx::query_as::<_, ScreeningRow>(sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
            .map(screening_from_row)
            .transpose()
    }

    async fn fetch_booking(&mut self, id: BookingId, lock: bool) -> StoreResult<Option<Booking>> {
        let sql = if lock {
            r"
            SELECT id, screening_id, customer_name, customer_email, customer_phone,
                   total_price_cents, status, created_at
            FROM bookings WHERE id = $1
            FOR NO KEY UPDATE
            "
        } else {
            r"
            SELECT id, screening_id, customer_name, customer_email, customer_phone,
                   total_price_cents, status, created_at
            FROM bookings WHERE id = $1
            "
        };

        let Some(row) = sqlx::query_as::<_, BookingRow>(sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };

        let mut booking = booking_from_row(row)?;
        booking.tickets = sqlx::query_as::<_, TicketRow>(
            r"
            SELECT id, booking_id, screening_id, seat_id, seat_class,
                   original_ticket_price_cents, price_cents, issue_date, qr_code, refunded_at
            FROM tickets WHERE booking_id = $1
            ORDER BY seq
            ",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(ticket_from_row)
        .collect::<StoreResult<_>>()?;

        Ok(Some(booking))
    }
}

impl BookingTransaction for PostgresTransaction {
    async fn screening(&mut self, id: ScreeningId) -> StoreResult<Option<Screening>> {
        self.fetch_screening(id, false).await
    }

    async fn lock_screening(&mut self, id: ScreeningId) -> StoreResult<Option<Screening>> {
        self.fetch_screening(id, true).await
    }

    async fn seat(&mut self, id: SeatId) -> StoreResult<Option<Seat>> {
        sqlx::query_as::<_, SeatRow>(
            r"
            SELECT id, cinema_id, screen_id, seat_row, seat_number, seat_class
            FROM seats WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?
        .map(seat_from_row)
        .transpose()
    }

    async fn screen_capacity(
        &mut self,
        screen_id: ScreenId,
        class: SeatClass,
    ) -> StoreResult<Option<u32>> {
        let row: Option<(i32, i32, i32)> = sqlx::query_as(
            "SELECT lower_capacity, upper_capacity, vip_capacity FROM screens WHERE id = $1",
        )
        .bind(screen_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        row.map(|(lower, upper, vip)| match class {
            SeatClass::Lower => count_from_db(lower),
            SeatClass::Upper => count_from_db(upper),
            SeatClass::Vip => count_from_db(vip),
        })
        .transpose()
    }

    async fn city_of_cinema(&mut self, cinema_id: CinemaId) -> StoreResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT city FROM cinemas WHERE id = $1")
            .bind(cinema_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(row.map(|(city,)| city))
    }

    async fn price_rule(
        &mut self,
        city: &str,
        class: SeatClass,
        time_of_day: TimeOfDay,
    ) -> StoreResult<Option<Money>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r"
            SELECT price_cents FROM city_pricing
            WHERE city = $1 AND seat_class = $2 AND time_of_day = $3
            ",
        )
        .bind(city)
        .bind(class.as_str())
        .bind(time_of_day.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        row.map(|(cents,)| money_from_db(cents)).transpose()
    }

    async fn seat_availability(
        &mut self,
        screening_id: ScreeningId,
        seat_id: SeatId,
    ) -> StoreResult<Option<SeatAvailability>> {
        let row: Option<(Option<Uuid>,)> = sqlx::query_as(
            "SELECT held_by FROM seat_availability WHERE screening_id = $1 AND seat_id = $2",
        )
        .bind(screening_id.as_uuid())
        .bind(seat_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        Ok(row.map(|(held_by,)| SeatAvailability {
            screening_id,
            seat_id,
            held_by: held_by.map(BookingId::from_uuid),
        }))
    }

    async fn reserve_seat(
        &mut self,
        screening_id: ScreeningId,
        seat_id: SeatId,
        booking_id: BookingId,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE seat_availability SET held_by = $3
            WHERE screening_id = $1 AND seat_id = $2
              AND (held_by IS NULL OR held_by = $3)
            ",
        )
        .bind(screening_id.as_uuid())
        .bind(seat_id.as_uuid())
        .bind(booking_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        let reserved = result.rows_affected() == 1;
        tracing::debug!(
            screening_id = %screening_id,
            seat_id = %seat_id,
            booking_id = %booking_id,
            reserved,
            "Seat reservation attempted"
        );
        Ok(reserved)
    }

    async fn release_seat(&mut self, screening_id: ScreeningId, seat_id: SeatId) -> StoreResult<()> {
        sqlx::query(
            "UPDATE seat_availability SET held_by = NULL WHERE screening_id = $1 AND seat_id = $2",
        )
        .bind(screening_id.as_uuid())
        .bind(seat_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn set_sold_count(
        &mut self,
        screening_id: ScreeningId,
        class: SeatClass,
        value: u32,
    ) -> StoreResult<()> {
        let sql = match class {
            SeatClass::Lower => "UPDATE screenings SET lower_sold = $2 WHERE id = $1",
            SeatClass::Upper => "UPDATE screenings SET upper_sold = $2 WHERE id = $1",
            SeatClass::Vip => "UPDATE screenings SET vip_sold = $2 WHERE id = $1",
        };
        let result = sqlx::query(sql)
            .bind(screening_id.as_uuid())
            .bind(count_to_db(value)?)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!("screening {screening_id}")));
        }
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO bookings (
                id, screening_id, customer_name, customer_email, customer_phone,
                total_price_cents, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.screening_id.as_uuid())
        .bind(&booking.customer.name)
        .bind(&booking.customer.email)
        .bind(&booking.customer.phone)
        .bind(money_to_db(booking.total_price)?)
        .bind(booking.status.as_str())
        .bind(booking.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, total_price_cents = $3 WHERE id = $1",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.status.as_str())
        .bind(money_to_db(booking.total_price)?)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!("booking {}", booking.id)));
        }
        Ok(())
    }

    async fn lock_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        self.fetch_booking(id, true).await
    }

    async fn booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        self.fetch_booking(id, false).await
    }

    async fn bookings(&mut self) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r"
            SELECT id, screening_id, customer_name, customer_email, customer_phone,
                   total_price_cents, status, created_at
            FROM bookings
            ORDER BY seq
            ",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;

        let ticket_rows: Vec<TicketRow> = sqlx::query_as(
            r"
            SELECT id, booking_id, screening_id, seat_id, seat_class,
                   original_ticket_price_cents, price_cents, issue_date, qr_code, refunded_at
            FROM tickets
            ORDER BY seq
            ",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;

        let mut tickets: HashMap<BookingId, Vec<Ticket>> = HashMap::new();
        for row in ticket_rows {
            let ticket = ticket_from_row(row)?;
            tickets.entry(ticket.booking_id).or_default().push(ticket);
        }

        rows.into_iter()
            .map(|row| {
                let mut booking = booking_from_row(row)?;
                booking.tickets = tickets.remove(&booking.id).unwrap_or_default();
                Ok(booking)
            })
            .collect()
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        sqlx::query(
            r"
            INSERT INTO tickets (
                id, booking_id, screening_id, seat_id, seat_class,
                original_ticket_price_cents, price_cents, issue_date, qr_code, refunded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(ticket.id.as_uuid())
        .bind(ticket.booking_id.as_uuid())
        .bind(ticket.screening_id.as_uuid())
        .bind(ticket.seat_id.as_uuid())
        .bind(ticket.seat_class.as_str())
        .bind(money_to_db(ticket.original_ticket_price)?)
        .bind(money_to_db(ticket.price)?)
        .bind(ticket.issue_date)
        .bind(&ticket.qr_code)
        .bind(ticket.refunded_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE tickets SET price_cents = $2, refunded_at = $3 WHERE id = $1")
                .bind(ticket.id.as_uuid())
                .bind(money_to_db(ticket.price)?)
                .bind(ticket.refunded_at)
                .execute(&mut *self.tx)
                .await
                .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingReference(format!("ticket {}", ticket.id)));
        }
        Ok(())
    }

    async fn ticket(&mut self, id: TicketId) -> StoreResult<Option<Ticket>> {
        sqlx::query_as::<_, TicketRow>(
            r"
            SELECT id, booking_id, screening_id, seat_id, seat_class,
                   original_ticket_price_cents, price_cents, issue_date, qr_code, refunded_at
            FROM tickets WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?
        .map(ticket_from_row)
        .transpose()
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(db_error)?;
        metrics::counter!("cinema_store_transactions_total", "outcome" => "committed")
            .increment(1);
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await.map_err(db_error)?;
        metrics::counter!("cinema_store_transactions_total", "outcome" => "rolled_back")
            .increment(1);
        Ok(())
    }
}
