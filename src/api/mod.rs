//! API layer - HTTP handlers and routing
//!
//! Exposes the booking boundary: create (with conflict detection), fetch,
//! room/user listings, availability probes, status updates, deletion, and a
//! health check.

pub mod bookings;
pub mod error;
pub mod health;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use error::ApiError;

use crate::db::DynDatabasePool;
use crate::services::BookingService;

/// Application state shared by handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub booking_service: Arc<BookingService>,
}

/// Build the versioned API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/bookings", axum::routing::post(bookings::create_booking))
        .route("/bookings/{id}", axum::routing::get(bookings::get_booking))
        .route(
            "/bookings/{id}/status",
            axum::routing::patch(bookings::update_booking_status),
        )
        .route("/bookings/{id}", axum::routing::delete(bookings::delete_booking))
        .route(
            "/rooms/{id}/bookings",
            axum::routing::get(bookings::list_room_bookings),
        )
        .route(
            "/rooms/{id}/availability",
            axum::routing::get(bookings::check_room_availability),
        )
        .route(
            "/users/{id}/bookings",
            axum::routing::get(bookings::list_user_bookings),
        )
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api/v1", build_api_router())
        .route("/health", axum::routing::get(health::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
