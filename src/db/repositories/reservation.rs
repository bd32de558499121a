//! Reservation repository
//!
//! Database operations for reservations, including the conflict guard:
//! `create_if_available` probes for an overlapping reservation and inserts
//! inside the same transaction, so two racing requests for the same room
//! cannot both pass the check.
//!
//! Overlap is half-open: `[a, b)` and `[c, d)` collide iff `a < d && c < b`.
//! A reservation whose status no longer blocks the calendar (cancelled,
//! failed) is ignored by the probe.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CreateReservationInput, Reservation, ReservationStatus, StayRange};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Acquire, MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Statuses that keep a room blocked, as a SQL list fragment.
const BLOCKING_STATUS_SQL: &str = "('pending', 'confirmed')";

/// Result of a guarded create.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    /// The room was free; the reservation was persisted.
    Created(Reservation),
    /// An existing reservation blocks the requested span. Nothing was
    /// inserted; the blocker is returned for diagnostics.
    Conflict(Reservation),
}

/// Reservation repository trait
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Atomically check the room's calendar and insert when free.
    async fn create_if_available(&self, input: &CreateReservationInput) -> Result<ReserveOutcome>;

    /// Get reservation by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Reservation>>;

    /// Find a reservation blocking the given span on a room, if any
    async fn find_overlapping(&self, room_id: i64, stay: &StayRange)
        -> Result<Option<Reservation>>;

    /// List a room's reservations in calendar order
    async fn list_by_room(&self, room_id: i64) -> Result<Vec<Reservation>>;

    /// List a user's reservations in calendar order
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Reservation>>;

    /// Set the status of a reservation; returns the updated record
    async fn update_status(
        &self,
        id: i64,
        status: ReservationStatus,
    ) -> Result<Option<Reservation>>;

    /// Delete a reservation; returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based reservation repository supporting SQLite and MySQL.
pub struct SqlxReservationRepository {
    pool: DynDatabasePool,
}

impl SqlxReservationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared repository for dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReservationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ReservationRepository for SqlxReservationRepository {
    async fn create_if_available(&self, input: &CreateReservationInput) -> Result<ReserveOutcome> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_if_available_sqlite(self.pool.as_sqlite().unwrap(), input).await
            }
            DatabaseDriver::Mysql => {
                create_if_available_mysql(self.pool.as_mysql().unwrap(), input).await
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Reservation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn find_overlapping(
        &self,
        room_id: i64,
        stay: &StayRange,
    ) -> Result<Option<Reservation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                find_overlapping_sqlite(self.pool.as_sqlite().unwrap(), room_id, stay).await
            }
            DatabaseDriver::Mysql => {
                find_overlapping_mysql(self.pool.as_mysql().unwrap(), room_id, stay).await
            }
        }
    }

    async fn list_by_room(&self, room_id: i64) -> Result<Vec<Reservation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_room_sqlite(self.pool.as_sqlite().unwrap(), room_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_room_mysql(self.pool.as_mysql().unwrap(), room_id).await
            }
        }
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Reservation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_user_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_by_user_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }

    async fn update_status(
        &self,
        id: i64,
        status: ReservationStatus,
    ) -> Result<Option<Reservation>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_status_sqlite(self.pool.as_sqlite().unwrap(), id, status).await
            }
            DatabaseDriver::Mysql => {
                update_status_mysql(self.pool.as_mysql().unwrap(), id, status).await
            }
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

fn select_columns() -> &'static str {
    "id, user_id, room_id, hotel_id, check_in, check_out, total_amount, status, created_at, updated_at"
}

fn overlap_where() -> String {
    // Half-open interval intersection; back-to-back stays do not collide.
    format!(
        "room_id = ? AND check_in < ? AND check_out > ? AND status IN {}",
        BLOCKING_STATUS_SQL
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_if_available_sqlite(
    pool: &SqlitePool,
    input: &CreateReservationInput,
) -> Result<ReserveOutcome> {
    let now = Utc::now();
    let status = input.status.unwrap_or_default();

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // SQLite takes the database write lock at the first writing statement.
    // Issue a zero-row write before the probe so a concurrent guard blocks
    // here instead of probing the same snapshot.
    sqlx::query("UPDATE reservations SET id = id WHERE id = -1")
        .execute(&mut *tx)
        .await
        .context("Failed to acquire write transaction")?;

    let query = format!(
        "SELECT {} FROM reservations WHERE {} LIMIT 1",
        select_columns(),
        overlap_where()
    );
    let blocker = sqlx::query(&query)
        .bind(input.room_id)
        .bind(input.check_out)
        .bind(input.check_in)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to query overlapping reservations")?;

    if let Some(row) = blocker {
        // Dropping the transaction rolls it back; nothing was written.
        return Ok(ReserveOutcome::Conflict(row_to_reservation_sqlite(&row)?));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO reservations (user_id, room_id, hotel_id, check_in, check_out, total_amount, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.user_id)
    .bind(input.room_id)
    .bind(input.hotel_id)
    .bind(input.check_in)
    .bind(input.check_out)
    .bind(input.total_amount)
    .bind(status.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to insert reservation")?;

    let id = result.last_insert_rowid();

    tx.commit().await.context("Failed to commit reservation")?;

    Ok(ReserveOutcome::Created(Reservation {
        id,
        user_id: input.user_id,
        room_id: input.room_id,
        hotel_id: input.hotel_id,
        check_in: input.check_in,
        check_out: input.check_out,
        total_amount: input.total_amount,
        status,
        created_at: now,
        updated_at: now,
    }))
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Reservation>> {
    let query = format!("SELECT {} FROM reservations WHERE id = ?", select_columns());
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get reservation by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_reservation_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn find_overlapping_sqlite(
    pool: &SqlitePool,
    room_id: i64,
    stay: &StayRange,
) -> Result<Option<Reservation>> {
    let query = format!(
        "SELECT {} FROM reservations WHERE {} LIMIT 1",
        select_columns(),
        overlap_where()
    );
    let row = sqlx::query(&query)
        .bind(room_id)
        .bind(stay.check_out)
        .bind(stay.check_in)
        .fetch_optional(pool)
        .await
        .context("Failed to query overlapping reservations")?;

    match row {
        Some(row) => Ok(Some(row_to_reservation_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_by_room_sqlite(pool: &SqlitePool, room_id: i64) -> Result<Vec<Reservation>> {
    let query = format!(
        "SELECT {} FROM reservations WHERE room_id = ? ORDER BY check_in ASC, id ASC",
        select_columns()
    );
    let rows = sqlx::query(&query)
        .bind(room_id)
        .fetch_all(pool)
        .await
        .context("Failed to list reservations by room")?;

    rows.iter().map(row_to_reservation_sqlite).collect()
}

async fn list_by_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Reservation>> {
    let query = format!(
        "SELECT {} FROM reservations WHERE user_id = ? ORDER BY check_in ASC, id ASC",
        select_columns()
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list reservations by user")?;

    rows.iter().map(row_to_reservation_sqlite).collect()
}

async fn update_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    status: ReservationStatus,
) -> Result<Option<Reservation>> {
    let result = sqlx::query("UPDATE reservations SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update reservation status")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_by_id_sqlite(pool, id).await
}

async fn delete_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM reservations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete reservation")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_reservation_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Reservation> {
    let status_str: String = row.get("status");
    let status = ReservationStatus::from_str(&status_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid reservation status: {}", status_str))?;

    Ok(Reservation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        room_id: row.get("room_id"),
        hotel_id: row.get("hotel_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        total_amount: row.get("total_amount"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_if_available_mysql(
    pool: &MySqlPool,
    input: &CreateReservationInput,
) -> Result<ReserveOutcome> {
    let now = Utc::now();
    let status = input.status.unwrap_or_default();

    let mut conn = pool.acquire().await.context("Failed to acquire connection")?;

    // Applies to the next transaction on this session: the probe's range
    // read then locks out a concurrent insert until we commit.
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *conn)
        .await
        .context("Failed to set transaction isolation")?;

    let mut tx = conn.begin().await.context("Failed to begin transaction")?;

    let query = format!(
        "SELECT {} FROM reservations WHERE {} LIMIT 1",
        select_columns(),
        overlap_where()
    );
    let blocker = sqlx::query(&query)
        .bind(input.room_id)
        .bind(input.check_out)
        .bind(input.check_in)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to query overlapping reservations")?;

    if let Some(row) = blocker {
        return Ok(ReserveOutcome::Conflict(row_to_reservation_mysql(&row)?));
    }

    let insert = sqlx::query(
        r#"
        INSERT INTO reservations (user_id, room_id, hotel_id, check_in, check_out, total_amount, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.user_id)
    .bind(input.room_id)
    .bind(input.hotel_id)
    .bind(input.check_in)
    .bind(input.check_out)
    .bind(input.total_amount)
    .bind(status.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await;

    let result = match insert {
        Ok(result) => result,
        Err(err) if is_serialization_failure(&err) => {
            // The engine aborted us because a concurrent guard won the
            // range. Confirm and report the winner as the conflict.
            drop(tx);
            let stay = input.stay();
            if let Some(winner) = find_overlapping_mysql(pool, input.room_id, &stay).await? {
                return Ok(ReserveOutcome::Conflict(winner));
            }
            return Err(anyhow::Error::new(err).context("Reservation insert aborted"));
        }
        Err(err) => return Err(anyhow::Error::new(err).context("Failed to insert reservation")),
    };

    let id = result.last_insert_id() as i64;

    tx.commit().await.context("Failed to commit reservation")?;

    Ok(ReserveOutcome::Created(Reservation {
        id,
        user_id: input.user_id,
        room_id: input.room_id,
        hotel_id: input.hotel_id,
        check_in: input.check_in,
        check_out: input.check_out,
        total_amount: input.total_amount,
        status,
        created_at: now,
        updated_at: now,
    }))
}

/// Deadlock or serialization abort while two guards race the same range.
fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("40001") | Some("1213") | Some("1205"))
        }
        _ => false,
    }
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Reservation>> {
    let query = format!("SELECT {} FROM reservations WHERE id = ?", select_columns());
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get reservation by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_reservation_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn find_overlapping_mysql(
    pool: &MySqlPool,
    room_id: i64,
    stay: &StayRange,
) -> Result<Option<Reservation>> {
    let query = format!(
        "SELECT {} FROM reservations WHERE {} LIMIT 1",
        select_columns(),
        overlap_where()
    );
    let row = sqlx::query(&query)
        .bind(room_id)
        .bind(stay.check_out)
        .bind(stay.check_in)
        .fetch_optional(pool)
        .await
        .context("Failed to query overlapping reservations")?;

    match row {
        Some(row) => Ok(Some(row_to_reservation_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_by_room_mysql(pool: &MySqlPool, room_id: i64) -> Result<Vec<Reservation>> {
    let query = format!(
        "SELECT {} FROM reservations WHERE room_id = ? ORDER BY check_in ASC, id ASC",
        select_columns()
    );
    let rows = sqlx::query(&query)
        .bind(room_id)
        .fetch_all(pool)
        .await
        .context("Failed to list reservations by room")?;

    rows.iter().map(row_to_reservation_mysql).collect()
}

async fn list_by_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Reservation>> {
    let query = format!(
        "SELECT {} FROM reservations WHERE user_id = ? ORDER BY check_in ASC, id ASC",
        select_columns()
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list reservations by user")?;

    rows.iter().map(row_to_reservation_mysql).collect()
}

async fn update_status_mysql(
    pool: &MySqlPool,
    id: i64,
    status: ReservationStatus,
) -> Result<Option<Reservation>> {
    let result = sqlx::query("UPDATE reservations SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update reservation status")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_by_id_mysql(pool, id).await
}

async fn delete_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM reservations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete reservation")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_reservation_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Reservation> {
    let status_str: String = row.get("status");
    let status = ReservationStatus::from_str(&status_str)
        .ok_or_else(|| anyhow::anyhow!("Invalid reservation status: {}", status_str))?;

    Ok(Reservation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        room_id: row.get("room_id"),
        hotel_id: row.get("hotel_id"),
        check_in: row.get("check_in"),
        check_out: row.get("check_out"),
        total_amount: row.get("total_amount"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
