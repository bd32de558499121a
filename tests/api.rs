//! HTTP integration tests for the booking API
//!
//! Exercises the boundary contract end to end against an in-memory
//! database: creation, conflict and validation outcomes, listings,
//! availability probes, status updates, and deletion.

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::{json, Value};

use innkeeper::{
    api::{build_router, AppState},
    cache::{Cache, MemoryCache},
    db::{create_test_pool, migrations, repositories::SqlxReservationRepository, DynDatabasePool},
    services::BookingService,
};

async fn spawn_server() -> (TestServer, DynDatabasePool) {
    let pool = create_test_pool().await.expect("test pool");
    migrations::run_migrations(&pool).await.expect("migrations");

    let repo = SqlxReservationRepository::boxed(pool.clone());
    let cache = Arc::new(Cache::Memory(MemoryCache::new()));
    let booking_service = Arc::new(BookingService::new(repo, cache));

    let state = AppState {
        pool: pool.clone(),
        booking_service,
    };
    let app = build_router(state, "http://localhost:3000");

    (TestServer::new(app).expect("test server"), pool)
}

/// Insert a hotel, two rooms, and a user; returns (hotel, room1, room2, user).
async fn seed(pool: &DynDatabasePool) -> (i64, i64, i64, i64) {
    let sqlite = pool.as_sqlite().unwrap();

    sqlx::query("INSERT INTO hotels (name, city) VALUES ('Harbor View', 'Lagos')")
        .execute(sqlite)
        .await
        .unwrap();
    sqlx::query("INSERT INTO rooms (hotel_id, room_number, price_per_night) VALUES (1, '101', 25000)")
        .execute(sqlite)
        .await
        .unwrap();
    sqlx::query("INSERT INTO rooms (hotel_id, room_number, price_per_night) VALUES (1, '102', 30000)")
        .execute(sqlite)
        .await
        .unwrap();
    sqlx::query("INSERT INTO users (email, full_name) VALUES ('guest@example.com', 'Test Guest')")
        .execute(sqlite)
        .await
        .unwrap();

    (1, 1, 2, 1)
}

fn booking_body(user: i64, hotel: i64, room: i64, check_in: &str, check_out: &str) -> Value {
    json!({
        "user_id": user,
        "hotel_id": hotel,
        "room_id": room,
        "check_in_date": check_in,
        "check_out_date": check_out,
        "total_amount": 125000
    })
}

#[tokio::test]
async fn create_booking_returns_created_record() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let response = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();
    assert!(body["id"].as_i64().unwrap() > 0);
    assert_eq!(body["check_in_date"], "2024-01-10");
    assert_eq!(body["check_out_date"], "2024-01-15");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["total_amount"], 125000);
}

#[tokio::test]
async fn overlapping_booking_is_conflict_with_no_partial_data() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let response = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-12", "2024-01-18"))
        .await;

    response.assert_status(axum::http::StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFLICT");
    assert!(body.get("id").is_none());

    // Only the first booking exists
    let list: Value = server.get("/api/v1/rooms/1/bookings").await.json();
    assert_eq!(list["total"], 1);
}

#[tokio::test]
async fn adjacent_booking_succeeds() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    // Checkout day equals the next check-in: same-day turnover
    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-15", "2024-01-20"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

#[tokio::test]
async fn identical_range_on_other_room_succeeds() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, room2, user) = seed(&pool).await;

    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room2, "2024-01-10", "2024-01-15"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

#[tokio::test]
async fn malformed_date_names_the_field() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let response = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "01/10/2024", "2024-01-15"))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["field"], "check_in_date");
}

#[tokio::test]
async fn inverted_range_is_rejected_without_insert() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let response = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-15", "2024-01-10"))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    let list: Value = server.get("/api/v1/rooms/1/bookings").await.json();
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn negative_amount_is_rejected() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let mut body = booking_body(user, hotel, room, "2024-01-10", "2024-01-15");
    body["total_amount"] = json!(-500);

    let response = server.post("/api/v1/bookings").json(&body).await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["details"]["field"], "total_amount");
}

#[tokio::test]
async fn booking_against_missing_room_is_not_found() {
    let (server, pool) = spawn_server().await;
    let (hotel, _room, _room2, user) = seed(&pool).await;

    let response = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, 999, "2024-01-10", "2024-01-15"))
        .await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_booking_round_trip_and_missing() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let created: Value = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .json();
    let id = created["id"].as_i64().unwrap();

    let fetched: Value = server.get(&format!("/api/v1/bookings/{}", id)).await.json();
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["check_in_date"], "2024-01-10");

    server
        .get("/api/v1/bookings/99999")
        .await
        .assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_update_flows() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let created: Value = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .json();
    let id = created["id"].as_i64().unwrap();

    // Payment confirmation
    let response = server
        .patch(&format!("/api/v1/bookings/{}/status", id))
        .json(&json!({ "status": "confirmed" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "confirmed");

    // Unknown status is a validation error
    server
        .patch(&format!("/api/v1/bookings/{}/status", id))
        .json(&json!({ "status": "paid" }))
        .await
        .assert_status(axum::http::StatusCode::BAD_REQUEST);

    // Missing reservation
    server
        .patch("/api/v1/bookings/99999/status")
        .json(&json!({ "status": "cancelled" }))
        .await
        .assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancelled_booking_reopens_the_window() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let created: Value = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .json();
    let id = created["id"].as_i64().unwrap();

    server
        .patch(&format!("/api/v1/bookings/{}/status", id))
        .json(&json!({ "status": "cancelled" }))
        .await
        .assert_status_ok();

    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

#[tokio::test]
async fn delete_booking_then_gone() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let created: Value = server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .json();
    let id = created["id"].as_i64().unwrap();

    server
        .delete(&format!("/api/v1/bookings/{}", id))
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);
    server
        .get(&format!("/api/v1/bookings/{}", id))
        .await
        .assert_status(axum::http::StatusCode::NOT_FOUND);
    server
        .delete(&format!("/api/v1/bookings/{}", id))
        .await
        .assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn availability_probe_tracks_bookings() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, _room2, user) = seed(&pool).await;

    let free: Value = server
        .get("/api/v1/rooms/1/availability?check_in_date=2024-01-10&check_out_date=2024-01-15")
        .await
        .json();
    assert_eq!(free["available"], true);

    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-01-10", "2024-01-15"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let taken: Value = server
        .get("/api/v1/rooms/1/availability?check_in_date=2024-01-10&check_out_date=2024-01-15")
        .await
        .json();
    assert_eq!(taken["available"], false);

    // The adjacent window stays free
    let adjacent: Value = server
        .get("/api/v1/rooms/1/availability?check_in_date=2024-01-15&check_out_date=2024-01-20")
        .await
        .json();
    assert_eq!(adjacent["available"], true);
}

#[tokio::test]
async fn user_bookings_listing() {
    let (server, pool) = spawn_server().await;
    let (hotel, room, room2, user) = seed(&pool).await;

    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room, "2024-02-01", "2024-02-05"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
    server
        .post("/api/v1/bookings")
        .json(&booking_body(user, hotel, room2, "2024-01-10", "2024-01-15"))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let list: Value = server.get(&format!("/api/v1/users/{}/bookings", user)).await.json();
    assert_eq!(list["total"], 2);
    // Calendar order, earliest first
    assert_eq!(list["bookings"][0]["check_in_date"], "2024-01-10");
}

#[tokio::test]
async fn health_reports_ok() {
    let (server, _pool) = spawn_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "reachable");
}
