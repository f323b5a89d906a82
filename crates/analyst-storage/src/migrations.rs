//! Database schema migrations.
//!
//! Applies the initial schema: the orders table and the schema_migrations
//! bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use analyst_core::error::AnalystError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), AnalystError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| AnalystError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| AnalystError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: orders");
    }

    Ok(())
}

/// Version 1: orders table.
///
/// `order_time` is a unix timestamp in seconds. `veg` keeps the source
/// system's 'Yes'/'No' encoding.
fn apply_v1(conn: &Connection) -> Result<(), AnalystError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS orders (
            id                  TEXT PRIMARY KEY NOT NULL,
            user_id             TEXT NOT NULL,
            order_time          INTEGER NOT NULL,
            total_price         REAL NOT NULL DEFAULT 0.0,
            delivery_time_min   REAL,
            user_rating         REAL,
            refund_flag         INTEGER NOT NULL DEFAULT 0,
            veg                 TEXT NOT NULL DEFAULT 'No'
                                CHECK (veg IN ('Yes', 'No')),
            offer_applied       INTEGER NOT NULL DEFAULT 0,
            created_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_orders_order_time
            ON orders (order_time DESC);

        CREATE INDEX IF NOT EXISTS idx_orders_user
            ON orders (user_id, order_time DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'orders');
        ",
    )
    .map_err(|e| AnalystError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
