//! Booking service
//!
//! Implements the reservation contract: validate the request, run the
//! conflict guard, and hand back one of four explicit outcomes
//! (created / conflict / invalid / internal) so callers cannot forget a
//! case. Also serves cached availability probes and reservation lists.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{ReservationRepository, ReserveOutcome};
use crate::models::{CreateReservationInput, Reservation, ReservationStatus, StayRange};
use anyhow::Context;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

/// Cache TTL for availability probes and room lists
const BOOKING_CACHE_TTL_SECS: u64 = 300;

/// Error types for booking operations.
///
/// Validation and conflict are expected, recoverable-by-caller outcomes;
/// internal errors are opaque and never retried here.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// Malformed or logically invalid input, naming the offending field
    #[error("Validation error on '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The room is already held for an intersecting date span
    #[error("Room {room_id} is unavailable for {stay}")]
    Conflict { room_id: i64, stay: StayRange },

    /// Reservation not found
    #[error("Reservation not found: {0}")]
    NotFound(i64),

    /// A referenced user/room/hotel does not exist (foreign key violation)
    #[error("Referenced record not found: {0}")]
    MissingReference(String),

    /// Data-layer or infrastructure failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Incoming reservation request, as received at the boundary.
///
/// Dates arrive as ISO strings and are validated here, so a caller gets a
/// field-level validation error rather than a framework rejection.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub user_id: i64,
    pub hotel_id: i64,
    pub room_id: i64,
    pub check_in_date: String,
    pub check_out_date: String,
    /// Total price in minor currency units
    pub total_amount: i64,
    /// Initial status; defaults to pending
    pub status: Option<String>,
}

/// Booking service
pub struct BookingService {
    repo: Arc<dyn ReservationRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl BookingService {
    pub fn new(repo: Arc<dyn ReservationRepository>, cache: Arc<Cache>) -> Self {
        Self {
            repo,
            cache,
            cache_ttl: Duration::from_secs(BOOKING_CACHE_TTL_SECS),
        }
    }

    /// Create a booking service with a custom cache TTL
    pub fn with_cache_ttl(
        repo: Arc<dyn ReservationRepository>,
        cache: Arc<Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Reserve a room for a date span.
    ///
    /// Validates the request, then runs the guarded check-and-insert. On
    /// success the room's cached availability is invalidated and the
    /// persisted record returned.
    pub async fn try_reserve(&self, req: ReserveRequest) -> Result<Reservation, BookingError> {
        let (input, stay) = self.validate(&req)?;

        let outcome = match self.repo.create_if_available(&input).await {
            Ok(outcome) => outcome,
            Err(err) if is_foreign_key_violation(&err) => {
                return Err(BookingError::MissingReference(format!(
                    "user {}, room {} or hotel {} does not exist",
                    req.user_id, req.room_id, req.hotel_id
                )));
            }
            Err(err) => return Err(BookingError::Internal(err)),
        };

        match outcome {
            ReserveOutcome::Created(reservation) => {
                self.invalidate_room(reservation.room_id).await;
                tracing::info!(
                    reservation_id = reservation.id,
                    room_id = reservation.room_id,
                    "reservation created"
                );
                Ok(reservation)
            }
            ReserveOutcome::Conflict(blocker) => {
                tracing::debug!(
                    room_id = req.room_id,
                    blocker_id = blocker.id,
                    "reservation conflict"
                );
                Err(BookingError::Conflict {
                    room_id: req.room_id,
                    stay,
                })
            }
        }
    }

    /// Whether a room is free for the given span. Read-only; cached.
    pub async fn check_availability(
        &self,
        room_id: i64,
        check_in_date: &str,
        check_out_date: &str,
    ) -> Result<bool, BookingError> {
        if room_id <= 0 {
            return Err(invalid("room_id", "must be a positive integer"));
        }
        let stay = parse_stay(check_in_date, check_out_date)?;

        let key = availability_key(room_id, &stay);
        if let Ok(Some(available)) = self.cache.get::<bool>(&key).await {
            return Ok(available);
        }

        let available = self
            .repo
            .find_overlapping(room_id, &stay)
            .await
            .context("Availability probe failed")?
            .is_none();

        if let Err(e) = self.cache.set(&key, &available, self.cache_ttl).await {
            tracing::warn!("Failed to cache availability: {}", e);
        }

        Ok(available)
    }

    /// Fetch one reservation
    pub async fn get(&self, id: i64) -> Result<Reservation, BookingError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load reservation")?
            .ok_or(BookingError::NotFound(id))
    }

    /// A room's reservations in calendar order; cached
    pub async fn list_for_room(&self, room_id: i64) -> Result<Vec<Reservation>, BookingError> {
        let key = room_list_key(room_id);
        if let Ok(Some(list)) = self.cache.get::<Vec<Reservation>>(&key).await {
            return Ok(list);
        }

        let list = self
            .repo
            .list_by_room(room_id)
            .await
            .context("Failed to list reservations for room")?;

        if let Err(e) = self.cache.set(&key, &list, self.cache_ttl).await {
            tracing::warn!("Failed to cache room reservations: {}", e);
        }

        Ok(list)
    }

    /// A user's reservations in calendar order
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Reservation>, BookingError> {
        Ok(self
            .repo
            .list_by_user(user_id)
            .await
            .context("Failed to list reservations for user")?)
    }

    /// Set a reservation's status.
    ///
    /// Transitions are externally driven (payment confirmed or failed,
    /// administrative cancellation) and are not checked for legality.
    pub async fn set_status(
        &self,
        id: i64,
        status: ReservationStatus,
    ) -> Result<Reservation, BookingError> {
        let updated = self
            .repo
            .update_status(id, status)
            .await
            .context("Failed to update reservation status")?
            .ok_or(BookingError::NotFound(id))?;

        // A status change can open or close the room's calendar window
        self.invalidate_room(updated.room_id).await;
        tracing::info!(reservation_id = id, status = %status, "reservation status updated");

        Ok(updated)
    }

    /// Administrative deletion of a reservation
    pub async fn remove(&self, id: i64) -> Result<(), BookingError> {
        let existing = self.get(id).await?;

        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete reservation")?;
        if !deleted {
            return Err(BookingError::NotFound(id));
        }

        self.invalidate_room(existing.room_id).await;
        tracing::info!(reservation_id = id, "reservation deleted");
        Ok(())
    }

    fn validate(
        &self,
        req: &ReserveRequest,
    ) -> Result<(CreateReservationInput, StayRange), BookingError> {
        if req.user_id <= 0 {
            return Err(invalid("user_id", "must be a positive integer"));
        }
        if req.hotel_id <= 0 {
            return Err(invalid("hotel_id", "must be a positive integer"));
        }
        if req.room_id <= 0 {
            return Err(invalid("room_id", "must be a positive integer"));
        }
        if req.total_amount < 0 {
            return Err(invalid("total_amount", "must not be negative"));
        }

        let status = match &req.status {
            None => None,
            Some(s) => Some(ReservationStatus::from_str(s).ok_or_else(|| {
                invalid("status", format!("unknown status '{}'", s))
            })?),
        };

        let stay = parse_stay(&req.check_in_date, &req.check_out_date)?;

        let mut input = CreateReservationInput::new(
            req.user_id,
            req.room_id,
            req.hotel_id,
            stay,
            req.total_amount,
        );
        input.status = status;

        Ok((input, stay))
    }

    async fn invalidate_room(&self, room_id: i64) {
        if let Err(e) = self.cache.invalidate_prefix(&room_cache_prefix(room_id)).await {
            tracing::warn!(room_id, "Failed to invalidate room cache: {}", e);
        }
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> BookingError {
    BookingError::Validation {
        field,
        message: message.into(),
    }
}

fn parse_stay(check_in: &str, check_out: &str) -> Result<StayRange, BookingError> {
    let check_in: NaiveDate = check_in
        .parse()
        .map_err(|_| invalid("check_in_date", "not a valid ISO date (YYYY-MM-DD)"))?;
    let check_out: NaiveDate = check_out
        .parse()
        .map_err(|_| invalid("check_out_date", "not a valid ISO date (YYYY-MM-DD)"))?;

    StayRange::new(check_in, check_out)
        .map_err(|e| invalid("check_out_date", e.to_string()))
}

fn room_cache_prefix(room_id: i64) -> String {
    format!("room:{}:", room_id)
}

fn availability_key(room_id: i64, stay: &StayRange) -> String {
    format!(
        "room:{}:availability:{}:{}",
        room_id, stay.check_in, stay.check_out
    )
}

fn room_list_key(room_id: i64) -> String {
    format!("room:{}:reservations", room_id)
}

/// The insert hit a referential constraint: user, room or hotel is absent.
fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    if let Some(sqlx::Error::Database(db)) = err.root_cause().downcast_ref::<sqlx::Error>() {
        // SQLite extended code 787, MySQL 1452
        return matches!(db.code().as_deref(), Some("787") | Some("1452"))
            || db.message().contains("FOREIGN KEY");
    }
    false
}
