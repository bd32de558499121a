//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one SQLite and one
//! MySQL variant per entry, so a fresh deployment needs nothing beyond the
//! executable. Applied versions are tracked in a `_migrations` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both supported backends
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, ordered)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in order.
///
/// The referenced tables (`hotels`, `rooms`, `users`) carry only the fields
/// reservations depend on; their lifecycle is managed outside this service.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_hotels",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS hotels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                city VARCHAR(100) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS hotels (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL,
                city VARCHAR(100) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_rooms",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hotel_id INTEGER NOT NULL,
                room_number VARCHAR(20) NOT NULL,
                price_per_night BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (hotel_id) REFERENCES hotels(id) ON DELETE CASCADE,
                UNIQUE (hotel_id, room_number)
            );
            CREATE INDEX IF NOT EXISTS idx_rooms_hotel_id ON rooms(hotel_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                hotel_id BIGINT NOT NULL,
                room_number VARCHAR(20) NOT NULL,
                price_per_night BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (hotel_id) REFERENCES hotels(id) ON DELETE CASCADE,
                UNIQUE KEY uq_rooms_hotel_number (hotel_id, room_number)
            );
            CREATE INDEX idx_rooms_hotel_id ON rooms(hotel_id);
        "#,
    },
    Migration {
        version: 3,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                full_name VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                full_name VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_users_email ON users(email);
        "#,
    },
    Migration {
        version: 4,
        name: "create_reservations",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                room_id INTEGER NOT NULL,
                hotel_id INTEGER NOT NULL,
                check_in DATE NOT NULL,
                check_out DATE NOT NULL,
                total_amount BIGINT NOT NULL DEFAULT 0,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
                FOREIGN KEY (hotel_id) REFERENCES hotels(id) ON DELETE CASCADE,
                CHECK (check_out > check_in),
                CHECK (total_amount >= 0)
            );
            CREATE INDEX IF NOT EXISTS idx_reservations_room_dates
                ON reservations(room_id, check_in, check_out);
            CREATE INDEX IF NOT EXISTS idx_reservations_user_id ON reservations(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS reservations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                room_id BIGINT NOT NULL,
                hotel_id BIGINT NOT NULL,
                check_in DATE NOT NULL,
                check_out DATE NOT NULL,
                total_amount BIGINT NOT NULL DEFAULT 0,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE,
                FOREIGN KEY (hotel_id) REFERENCES hotels(id) ON DELETE CASCADE,
                CHECK (check_out > check_in),
                CHECK (total_amount >= 0)
            );
            CREATE INDEX idx_reservations_room_dates
                ON reservations(room_id, check_in, check_out);
            CREATE INDEX idx_reservations_user_id ON reservations(user_id);
        "#,
    },
];

/// Run all pending migrations, in version order.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!("Applying migration {}: {}", migration.version, migration.name);
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Whether every known migration has been applied.
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(applied.len() >= MIGRATIONS.len())
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_sqlite(pool.as_sqlite().unwrap()).await,
        DatabaseDriver::Mysql => get_applied_mysql(pool.as_mysql().unwrap()).await,
    }
}

async fn get_applied_sqlite(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn get_applied_mysql(pool: &MySqlPool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    // sqlx runs one statement per query; split on the terminator
    for statement in split_statements(sql) {
        pool.execute(statement)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    match pool.driver() {
        DatabaseDriver::Sqlite => {
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(pool.as_sqlite().unwrap())
                .await?;
        }
        DatabaseDriver::Mysql => {
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(pool.as_mysql().unwrap())
                .await?;
        }
    }

    Ok(())
}

fn split_statements(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(';').map(str::trim).filter(|s| !s.is_empty())
}

fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        format!("{}...", &sql[..100])
    } else {
        sql.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.unwrap();
        let count = run_migrations(&pool).await.expect("migrations should apply");
        assert_eq!(count, MIGRATIONS.len());

        // Second run is a no-op
        let count = run_migrations(&pool).await.unwrap();
        assert_eq!(count, 0);
        assert!(is_up_to_date(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_all_tables_created() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();

        for table in ["hotels", "rooms", "users", "reservations"] {
            let row = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                .bind(table)
                .fetch_optional(sqlite)
                .await
                .unwrap();
            assert!(row.is_some(), "table {} should exist", table);
        }
    }

    #[tokio::test]
    async fn test_room_date_index_created() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();

        let row = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type='index' AND name='idx_reservations_room_dates'",
        )
        .fetch_optional(sqlite)
        .await
        .unwrap();
        assert!(row.is_some(), "conflict-query index should exist");
    }

    #[tokio::test]
    async fn test_reservation_date_check_constraint() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();

        sqlx::query("INSERT INTO hotels (name, city) VALUES ('Test Hotel', 'Lagos')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO rooms (hotel_id, room_number) VALUES (1, '101')")
            .execute(sqlite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO users (email, full_name) VALUES ('a@b.c', 'A B')")
            .execute(sqlite)
            .await
            .unwrap();

        // Inverted range violates the CHECK constraint
        let result = sqlx::query(
            "INSERT INTO reservations (user_id, room_id, hotel_id, check_in, check_out)
             VALUES (1, 1, 1, '2024-01-15', '2024-01-10')",
        )
        .execute(sqlite)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reservation_foreign_keys_enforced() {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let sqlite = pool.as_sqlite().unwrap();

        // No referenced rows exist yet
        let result = sqlx::query(
            "INSERT INTO reservations (user_id, room_id, hotel_id, check_in, check_out)
             VALUES (99, 99, 99, '2024-01-10', '2024-01-15')",
        )
        .execute(sqlite)
        .await;
        assert!(result.is_err(), "insert without referenced rows should fail");
    }
}
