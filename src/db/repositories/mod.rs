//! Database repositories
//!
//! Repository pattern implementations for database access.

pub mod reservation;

pub use reservation::{ReservationRepository, ReserveOutcome, SqlxReservationRepository};
