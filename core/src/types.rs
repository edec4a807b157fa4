//! Domain types for the booking core.
//!
//! Identifiers, money, seat classes, time-of-day buckets and the records the
//! orchestrator reads and writes through a [`BookingTransaction`].
//!
//! Entities reference each other by identifier only. Nothing here holds a live
//! pointer to another record; relationships are resolved through the store.
//!
//! [`BookingTransaction`]: crate::store::BookingTransaction

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a cinema
    CinemaId
);
uuid_id!(
    /// Unique identifier for a screen (auditorium) inside a cinema
    ScreenId
);
uuid_id!(
    /// Unique identifier for a film
    FilmId
);
uuid_id!(
    /// Unique identifier for a screening
    ScreeningId
);
uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a ticket
    TicketId
);

/// Namespace for name-based seat identifiers.
const SEAT_NAMESPACE: Uuid = Uuid::from_u128(0x6c1b_3f0e_93a4_4d2b_9b57_2f4e_8a10_c3d9);

/// Identifier for a physical seat.
///
/// Seat ids are derived from the seat's position, so provisioning the same
/// seat twice (or on another process) yields the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatId(Uuid);

impl SeatId {
    /// Derive the id of the seat at `row`/`number` on a screen.
    #[must_use]
    pub fn for_position(cinema_id: CinemaId, screen_id: ScreenId, row: &str, number: u16) -> Self {
        let name = format!("{cinema_id}/{screen_id}/{row}/{number}");
        Self(Uuid::new_v5(&SEAT_NAMESPACE, name.as_bytes()))
    }

    /// Create a `SeatId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole currency units with overflow checking
    #[must_use]
    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts, saturating at the maximum
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Removes `percent` of the amount, rounding the deduction down.
    ///
    /// Returns `None` when `percent` is above 100.
    #[must_use]
    pub const fn checked_deduct_percent(self, percent: u32) -> Option<Self> {
        if percent > 100 {
            return None;
        }
        Some(self.deduct_percent(percent))
    }

    /// Removes `percent` of the amount, capped at 100, rounding the deduction down.
    ///
    /// Splits whole hundreds from the remainder so no intermediate product
    /// exceeds the amount itself.
    #[must_use]
    pub const fn deduct_percent(self, percent: u32) -> Self {
        let percent = if percent > 100 { 100 } else { percent as u64 };
        let deduction = (self.0 / 100) * percent + (self.0 % 100) * percent / 100;
        Self(self.0 - deduction)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Seat classes and time-of-day buckets
// ============================================================================

/// Seating tier, used for pricing and capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeatClass {
    /// Stalls
    Lower,
    /// Balcony
    Upper,
    /// Premium seating
    Vip,
}

impl SeatClass {
    /// All seat classes, in display order.
    pub const ALL: [Self; 3] = [Self::Lower, Self::Upper, Self::Vip];

    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Vip => "vip",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            "vip" => Some(Self::Vip),
            _ => None,
        }
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pricing bucket derived from a screening's start hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeOfDay {
    /// 08:00 up to noon
    Morning,
    /// Noon up to 17:00
    Afternoon,
    /// Everything else, including early-morning late shows
    Evening,
}

impl TimeOfDay {
    /// Bucket for a start time: `[08,12)` morning, `[12,17)` afternoon, else evening.
    #[must_use]
    pub fn from_start_time(start: NaiveTime) -> Self {
        match start.hour() {
            8..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            _ => None,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A count per seat class. Used both for screen capacity and sold counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    /// Lower-class seats
    pub lower: u32,
    /// Upper-class seats
    pub upper: u32,
    /// VIP seats
    pub vip: u32,
}

impl ClassCounts {
    /// Construct from the three per-class values.
    #[must_use]
    pub const fn new(lower: u32, upper: u32, vip: u32) -> Self {
        Self { lower, upper, vip }
    }

    /// Value for one class.
    #[must_use]
    pub const fn get(&self, class: SeatClass) -> u32 {
        match class {
            SeatClass::Lower => self.lower,
            SeatClass::Upper => self.upper,
            SeatClass::Vip => self.vip,
        }
    }

    /// Overwrite the value for one class.
    pub fn set(&mut self, class: SeatClass, value: u32) {
        match class {
            SeatClass::Lower => self.lower = value,
            SeatClass::Upper => self.upper = value,
            SeatClass::Vip => self.vip = value,
        }
    }

    /// Add `count` to one class.
    pub fn add(&mut self, class: SeatClass, count: u32) {
        self.set(class, self.get(class).saturating_add(count));
    }

    /// Sum across classes.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.lower + self.upper + self.vip
    }
}

// ============================================================================
// Cinema inventory (owned by scheduling management)
// ============================================================================

/// A cinema and the city it prices against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cinema {
    /// Cinema id
    pub id: CinemaId,
    /// Display name
    pub name: String,
    /// City name used for pricing lookups
    pub city: String,
}

/// A screen (auditorium) with its per-class capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    /// Screen id
    pub id: ScreenId,
    /// Owning cinema
    pub cinema_id: CinemaId,
    /// Display name
    pub name: String,
    /// Number of seats per class
    pub capacity: ClassCounts,
}

/// A physical seat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Deterministic seat id, see [`SeatId::for_position`]
    pub id: SeatId,
    /// Owning cinema
    pub cinema_id: CinemaId,
    /// Owning screen
    pub screen_id: ScreenId,
    /// Row label, e.g. `"A"`
    pub row: String,
    /// Seat number within the row
    pub number: u16,
    /// Pricing tier
    pub class: SeatClass,
}

impl Seat {
    /// Create a seat, deriving its id from the position.
    #[must_use]
    pub fn new(
        cinema_id: CinemaId,
        screen_id: ScreenId,
        row: impl Into<String>,
        number: u16,
        class: SeatClass,
    ) -> Self {
        let row = row.into();
        Self {
            id: SeatId::for_position(cinema_id, screen_id, &row, number),
            cinema_id,
            screen_id,
            row,
            number,
            class,
        }
    }

    /// Human-readable label such as `B7`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}{}", self.row, self.number)
    }
}

/// One scheduled showing of a film on a screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screening {
    /// Screening id
    pub id: ScreeningId,
    /// Film being shown
    pub film_id: FilmId,
    /// Screen it runs on
    pub screen_id: ScreenId,
    /// Cinema it runs in
    pub cinema_id: CinemaId,
    /// Calendar date
    pub date: NaiveDate,
    /// Local start time
    pub start_time: NaiveTime,
    /// Confirmed (paid) seats per class
    pub sold: ClassCounts,
}

impl Screening {
    /// Start of the screening. Screening times are stored as UTC wall-clock.
    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        NaiveDateTime::new(self.date, self.start_time).and_utc()
    }

    /// Pricing bucket for this screening.
    #[must_use]
    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay::from_start_time(self.start_time)
    }
}

/// Availability of one seat for one screening.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAvailability {
    /// Screening
    pub screening_id: ScreeningId,
    /// Seat
    pub seat_id: SeatId,
    /// Booking currently holding the seat, if any
    pub held_by: Option<BookingId>,
}

impl SeatAvailability {
    /// A freshly provisioned, free record.
    #[must_use]
    pub const fn free(screening_id: ScreeningId, seat_id: SeatId) -> Self {
        Self {
            screening_id,
            seat_id,
            held_by: None,
        }
    }

    /// Whether nobody holds the seat.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.held_by.is_none()
    }
}

/// Price rule for a city, seat class and time of day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityPricing {
    /// City name, matched exactly
    pub city: String,
    /// Seat class
    pub seat_class: SeatClass,
    /// Time-of-day bucket
    pub time_of_day: TimeOfDay,
    /// Ticket price
    pub price: Money,
}

// ============================================================================
// Bookings and tickets
// ============================================================================

/// Payment state of a booking.
///
/// ```text
/// PENDING ──► PAID ──► REFUNDED
///    │
///    └──────► FAILED
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Created, seats not yet held
    Pending,
    /// Placed: seats held and counted as sold
    Paid,
    /// Timed out or abandoned before payment
    Failed,
    /// Cancelled after payment
    Refunded,
}

impl PaymentStatus {
    /// Whether the booking can no longer change state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Refunded)
    }

    /// Whether `self -> next` is an edge of the payment state machine.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid) | (Self::Pending, Self::Failed) | (Self::Paid, Self::Refunded)
        )
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PAID" => Some(Self::Paid),
            "FAILED" => Some(Self::Failed),
            "REFUNDED" => Some(Self::Refunded),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact details captured with a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Full name
    pub name: String,
    /// Email address
    pub email: String,
    /// Phone number
    pub phone: String,
}

impl Customer {
    /// Create customer details
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }
}

/// A customer's reservation of one or more seats at one screening.
///
/// The booking owns its tickets; stores load them together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id
    pub id: BookingId,
    /// Screening being booked
    pub screening_id: ScreeningId,
    /// Who booked
    pub customer: Customer,
    /// Sum of the ticket prices at booking time
    pub total_price: Money,
    /// Payment state
    pub status: PaymentStatus,
    /// Creation time, the base of the placement timeout
    pub created_at: DateTime<Utc>,
    /// One ticket per seat
    pub tickets: Vec<Ticket>,
}

impl Booking {
    /// A new pending booking with no tickets and a zero total.
    #[must_use]
    pub fn pending(screening_id: ScreeningId, customer: Customer, created_at: DateTime<Utc>) -> Self {
        Self {
            id: BookingId::new(),
            screening_id,
            customer,
            total_price: Money::ZERO,
            status: PaymentStatus::Pending,
            created_at,
            tickets: Vec::new(),
        }
    }

    /// Seats covered by this booking.
    pub fn seat_ids(&self) -> impl Iterator<Item = SeatId> + '_ {
        self.tickets.iter().map(|ticket| ticket.seat_id)
    }

    /// Tickets that have not been refunded.
    pub fn active_tickets(&self) -> impl Iterator<Item = &Ticket> + '_ {
        self.tickets.iter().filter(|ticket| !ticket.is_refunded())
    }
}

/// One seat within a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket id
    pub id: TicketId,
    /// Owning booking
    pub booking_id: BookingId,
    /// Screening
    pub screening_id: ScreeningId,
    /// Seat
    pub seat_id: SeatId,
    /// Seat class when the ticket was issued; counters move by this class
    pub seat_class: SeatClass,
    /// Price resolved when the ticket was issued
    pub original_ticket_price: Money,
    /// Current price, reduced by cancellation charges
    pub price: Money,
    /// When the ticket was issued
    pub issue_date: DateTime<Utc>,
    /// Payload for the QR code printed on the ticket
    pub qr_code: Option<String>,
    /// When the ticket was cancelled, if it was
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Whether the ticket was cancelled.
    #[must_use]
    pub const fn is_refunded(&self) -> bool {
        self.refunded_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_boundaries() {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
        assert_eq!(TimeOfDay::from_start_time(at(7, 59)), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_start_time(at(8, 0)), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_start_time(at(11, 59)), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_start_time(at(12, 0)), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_start_time(at(16, 59)), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_start_time(at(17, 0)), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_start_time(at(0, 30)), TimeOfDay::Evening);
    }

    #[test]
    fn seat_ids_are_deterministic() {
        let cinema = CinemaId::new();
        let screen = ScreenId::new();

        let a = SeatId::for_position(cinema, screen, "A", 1);
        assert_eq!(a, SeatId::for_position(cinema, screen, "A", 1));
        assert_ne!(a, SeatId::for_position(cinema, screen, "A", 2));
        assert_ne!(a, SeatId::for_position(cinema, ScreenId::new(), "A", 1));
    }

    #[test]
    fn payment_status_transitions() {
        use PaymentStatus::{Failed, Paid, Pending, Refunded};

        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(Paid.can_transition_to(Refunded));

        assert!(!Paid.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Refunded));
        for terminal in [Failed, Refunded] {
            assert!(terminal.is_terminal());
            for next in [Pending, Paid, Failed, Refunded] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn money_deduct_percent() {
        assert_eq!(Money::from_cents(2000).checked_deduct_percent(50), Some(Money::from_cents(1000)));
        assert_eq!(Money::from_cents(2501).checked_deduct_percent(50), Some(Money::from_cents(1251)));
        assert_eq!(Money::from_cents(2000).checked_deduct_percent(0), Some(Money::from_cents(2000)));
        assert_eq!(Money::from_cents(2000).checked_deduct_percent(101), None);
        assert_eq!(
            Money::from_cents(u64::MAX).checked_deduct_percent(50),
            Some(Money::from_cents(u64::MAX - (u64::MAX / 100) * 50 - 7))
        );
        assert_eq!(Money::from_cents(u64::MAX).deduct_percent(100), Money::ZERO);
        assert_eq!(Money::from_cents(2501).deduct_percent(250), Money::ZERO);
        assert_eq!(Money::from_cents(4500).to_string(), "45.00");
    }

    #[test]
    fn storage_names_round_trip() {
        for class in SeatClass::ALL {
            assert_eq!(SeatClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(PaymentStatus::parse("REFUNDED"), Some(PaymentStatus::Refunded));
        assert_eq!(TimeOfDay::parse("noon"), None);
    }

    #[test]
    fn class_counts_by_class() {
        let mut counts = ClassCounts::new(3, 2, 1);
        counts.set(SeatClass::Upper, 5);
        assert_eq!(counts.get(SeatClass::Upper), 5);
        assert_eq!(counts.total(), 9);
    }
}
