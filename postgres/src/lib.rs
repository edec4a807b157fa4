//! `PostgreSQL` storage for the cinema booking core.
//!
//! This crate provides a [`PostgresBookingStore`] that implements the
//! `BookingStore` and `Provisioning` traits from `cinema-booking-core`. It uses
//! sqlx and supports:
//!
//! - One database transaction per booking operation
//! - Row locks on bookings and screenings
//! - Compare-and-set seat reservation
//! - Connection pooling configured from the environment
//!
//! # Example
//!
//! ```ignore
//! use cinema_booking_postgres::{DatabaseConfig, PostgresBookingStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env().ok_or("DATABASE_URL not set")?;
//!     let store = PostgresBookingStore::connect_with(&config).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod rows;
pub mod store;

pub use config::DatabaseConfig;
pub use store::{PostgresBookingStore, PostgresTransaction};
