//! Data models
//!
//! Entities and input types for the reservation subsystem. A reservation
//! references — but does not own — a user record and a room record; those
//! tables exist in the schema so foreign keys are enforced, but they are
//! managed elsewhere.

mod reservation;

pub use reservation::{
    CreateReservationInput, Reservation, ReservationStatus, StayRange, StayRangeError,
};
