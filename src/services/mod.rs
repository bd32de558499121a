//! Services layer - business logic
//!
//! Services sit between the HTTP handlers and the repositories: they own
//! validation, the cache, and the mapping of data-layer outcomes onto the
//! error taxonomy callers must handle.

pub mod booking;

pub use booking::{BookingError, BookingService, ReserveRequest};
