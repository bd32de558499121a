//! Booking API endpoints
//!
//! Handles HTTP requests for reservations:
//! - POST /api/v1/bookings - Create a reservation (409 on conflict)
//! - GET /api/v1/bookings/:id - Fetch a reservation
//! - PATCH /api/v1/bookings/:id/status - Externally driven status change
//! - DELETE /api/v1/bookings/:id - Administrative deletion
//! - GET /api/v1/rooms/:id/bookings - A room's reservations
//! - GET /api/v1/rooms/:id/availability - Availability probe
//! - GET /api/v1/users/:id/bookings - A user's reservations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, AppState};
use crate::models::{Reservation, ReservationStatus};
use crate::services::ReserveRequest;

/// Request body for creating a booking
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: i64,
    pub hotel_id: i64,
    pub room_id: i64,
    pub check_in_date: String,
    pub check_out_date: String,
    /// Total price in minor currency units
    pub total_amount: i64,
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for updating a booking's status
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Query parameters for the availability probe
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub check_in_date: String,
    pub check_out_date: String,
}

/// Response for a single booking
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: i64,
    pub user_id: i64,
    pub room_id: i64,
    pub hotel_id: i64,
    pub check_in_date: String,
    pub check_out_date: String,
    pub total_amount: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Reservation> for BookingResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            room_id: r.room_id,
            hotel_id: r.hotel_id,
            check_in_date: r.check_in.to_string(),
            check_out_date: r.check_out.to_string(),
            total_amount: r.total_amount,
            status: r.status.to_string(),
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
        }
    }
}

/// Response for a booking list
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
    pub total: usize,
}

impl From<Vec<Reservation>> for BookingListResponse {
    fn from(list: Vec<Reservation>) -> Self {
        let bookings: Vec<BookingResponse> = list.into_iter().map(Into::into).collect();
        Self {
            total: bookings.len(),
            bookings,
        }
    }
}

/// Response for the availability probe
#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub room_id: i64,
    pub check_in_date: String,
    pub check_out_date: String,
    pub available: bool,
}

/// POST /api/v1/bookings - Create a reservation
///
/// Returns 201 with the persisted record, 409 when the room is held for an
/// intersecting span, 400 naming the invalid field.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let reservation = state
        .booking_service
        .try_reserve(ReserveRequest {
            user_id: body.user_id,
            hotel_id: body.hotel_id,
            room_id: body.room_id,
            check_in_date: body.check_in_date,
            check_out_date: body.check_out_date,
            total_amount: body.total_amount,
            status: body.status,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// GET /api/v1/bookings/:id - Fetch a reservation
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BookingResponse>, ApiError> {
    let reservation = state.booking_service.get(id).await?;
    Ok(Json(reservation.into()))
}

/// PATCH /api/v1/bookings/:id/status - Update a reservation's status
///
/// Transitions are externally driven (payment confirmation, administrative
/// cancellation); legality is not checked here.
pub async fn update_booking_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    let status = ReservationStatus::from_str(&body.status).ok_or_else(|| {
        ApiError::with_details(
            "VALIDATION_ERROR",
            format!("status: unknown status '{}'", body.status),
            serde_json::json!({ "field": "status" }),
        )
    })?;

    let reservation = state.booking_service.set_status(id, status).await?;
    Ok(Json(reservation.into()))
}

/// DELETE /api/v1/bookings/:id - Administrative deletion
pub async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.booking_service.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/rooms/:id/bookings - A room's reservations in calendar order
pub async fn list_room_bookings(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let list = state.booking_service.list_for_room(room_id).await?;
    Ok(Json(list.into()))
}

/// GET /api/v1/rooms/:id/availability - Probe a room for a date span
pub async fn check_room_availability(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let available = state
        .booking_service
        .check_availability(room_id, &query.check_in_date, &query.check_out_date)
        .await?;

    Ok(Json(AvailabilityResponse {
        room_id,
        check_in_date: query.check_in_date,
        check_out_date: query.check_out_date,
        available,
    }))
}

/// GET /api/v1/users/:id/bookings - A user's reservations in calendar order
pub async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let list = state.booking_service.list_for_user(user_id).await?;
    Ok(Json(list.into()))
}
