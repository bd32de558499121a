//! Reservation model
//!
//! This module provides:
//! - `Reservation` entity representing one room held for one user over a
//!   date span
//! - `ReservationStatus` enum for lifecycle states
//! - `StayRange`, a validated half-open `[check_in, check_out)` date span
//!   carrying the overlap predicate
//! - `CreateReservationInput` for inserts

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reservation entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique identifier
    pub id: i64,
    /// Booking user ID
    pub user_id: i64,
    /// Reserved room ID
    pub room_id: i64,
    /// Hotel the room belongs to
    pub hotel_id: i64,
    /// First night of the stay
    pub check_in: NaiveDate,
    /// Day of departure; not part of the stay
    pub check_out: NaiveDate,
    /// Total price in minor currency units
    pub total_amount: i64,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// The date span this reservation holds, `[check_in, check_out)`.
    pub fn stay(&self) -> StayRange {
        StayRange {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }

    /// Whether this reservation still blocks the room's calendar.
    pub fn blocks_calendar(&self) -> bool {
        self.status.blocks_calendar()
    }
}

/// Reservation lifecycle status
///
/// Transitions are externally driven (payment confirmation, administrative
/// cancellation) and are not validated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Created, awaiting payment
    Pending,
    /// Payment confirmed
    Confirmed,
    /// Released by an administrative action or the guest
    Cancelled,
    /// Payment failed; the room is released
    Failed,
}

impl Default for ReservationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ReservationStatus {
    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Failed => "failed",
        }
    }

    /// Parse status from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(ReservationStatus::Pending),
            "confirmed" => Some(ReservationStatus::Confirmed),
            "cancelled" => Some(ReservationStatus::Cancelled),
            "failed" => Some(ReservationStatus::Failed),
            _ => None,
        }
    }

    /// Whether a reservation in this status blocks the room's calendar.
    /// Cancelled and failed reservations release the window.
    pub fn blocks_calendar(&self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Confirmed)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error constructing a `StayRange`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StayRangeError {
    #[error("check-out date must be strictly after check-in date")]
    EmptyOrInverted,
}

/// A half-open date span `[check_in, check_out)`.
///
/// Check-out day is exclusive: a guest leaving on the day another arrives
/// does not collide with them. Construction enforces a non-empty span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    /// Build a range, rejecting empty or inverted spans.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, StayRangeError> {
        if check_out <= check_in {
            return Err(StayRangeError::EmptyOrInverted);
        }
        Ok(Self { check_in, check_out })
    }

    /// Half-open interval intersection test.
    ///
    /// Two stays collide iff each starts before the other ends. Back-to-back
    /// stays sharing a boundary date do not overlap; same-day turnover is a
    /// normal hotel pattern.
    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Number of nights covered by the range.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

impl fmt::Display for StayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.check_in, self.check_out)
    }
}

/// Input for creating a new reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationInput {
    pub user_id: i64,
    pub room_id: i64,
    pub hotel_id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Total price in minor currency units
    pub total_amount: i64,
    /// Initial status (defaults to Pending)
    pub status: Option<ReservationStatus>,
}

impl CreateReservationInput {
    pub fn new(
        user_id: i64,
        room_id: i64,
        hotel_id: i64,
        stay: StayRange,
        total_amount: i64,
    ) -> Self {
        Self {
            user_id,
            room_id,
            hotel_id,
            check_in: stay.check_in,
            check_out: stay.check_out,
            total_amount,
            status: None,
        }
    }

    /// Set the initial status
    pub fn with_status(mut self, status: ReservationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn stay(&self) -> StayRange {
        StayRange {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    prop_compose! {
        fn stay_range()(start in 0i64..3650, len in 1i64..60) -> StayRange {
            let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let check_in = base + chrono::Duration::days(start);
            StayRange::new(check_in, check_in + chrono::Duration::days(len)).unwrap()
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Overlap is symmetric.
        #[test]
        fn overlap_symmetric(a in stay_range(), b in stay_range()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        /// Every non-empty range overlaps itself.
        #[test]
        fn overlap_reflexive(a in stay_range()) {
            prop_assert!(a.overlaps(&a));
        }

        /// A range never overlaps the ranges immediately before and after it.
        #[test]
        fn adjacent_never_overlaps(a in stay_range(), len in 1i64..60) {
            let after = StayRange::new(
                a.check_out,
                a.check_out + chrono::Duration::days(len),
            ).unwrap();
            prop_assert!(!a.overlaps(&after));
            let before = StayRange::new(
                a.check_in - chrono::Duration::days(len),
                a.check_in,
            ).unwrap();
            prop_assert!(!a.overlaps(&before));
        }

        /// The predicate agrees with the interval definition: overlap holds
        /// exactly when some night is shared.
        #[test]
        fn overlap_matches_shared_night(a in stay_range(), b in stay_range()) {
            let shared = a.check_in.max(b.check_in) < a.check_out.min(b.check_out);
            prop_assert_eq!(a.overlaps(&b), shared);
        }
    }
}
