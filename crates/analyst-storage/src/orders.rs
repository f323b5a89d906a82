//! Order records: insertion and bulk import.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Deserialize;
use uuid::Uuid;

use analyst_core::error::AnalystError;

use crate::db::Database;

/// An order to be written to the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub order_time: DateTime<Utc>,
    pub total_price: f64,
    #[serde(default)]
    pub delivery_time_min: Option<f64>,
    #[serde(default)]
    pub user_rating: Option<f64>,
    #[serde(default)]
    pub refund_flag: bool,
    #[serde(default)]
    pub veg: bool,
    #[serde(default)]
    pub offer_applied: bool,
}

impl NewOrder {
    /// A plain order with no delivery, rating, refund, veg or offer data.
    pub fn new(user_id: impl Into<String>, order_time: DateTime<Utc>, total_price: f64) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            order_time,
            total_price,
            delivery_time_min: None,
            user_rating: None,
            refund_flag: false,
            veg: false,
            offer_applied: false,
        }
    }
}

/// Write access to the orders table.
pub struct OrderRepository {
    db: Arc<Database>,
}

impl OrderRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert one order, returning its id.
    pub fn insert(&self, order: &NewOrder) -> Result<String, AnalystError> {
        self.db.with_conn(|conn| insert_order(conn, order))
    }

    /// Insert a batch of orders in a single transaction.
    pub fn insert_many(&self, orders: &[NewOrder]) -> Result<usize, AnalystError> {
        self.db.with_conn(|conn| {
            conn.execute_batch("BEGIN")
                .map_err(|e| AnalystError::Storage(format!("Begin import: {}", e)))?;
            for order in orders {
                if let Err(e) = insert_order(conn, order) {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(e);
                }
            }
            conn.execute_batch("COMMIT")
                .map_err(|e| AnalystError::Storage(format!("Commit import: {}", e)))?;
            Ok(orders.len())
        })
    }

    /// Total number of stored orders, regardless of date.
    pub fn count(&self) -> Result<u64, AnalystError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(|e| AnalystError::Storage(format!("Count orders: {}", e)))
        })
    }
}

fn insert_order(conn: &rusqlite::Connection, order: &NewOrder) -> Result<String, AnalystError> {
    let id = order
        .id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    conn.execute(
        "INSERT INTO orders (id, user_id, order_time, total_price, delivery_time_min,
                             user_rating, refund_flag, veg, offer_applied)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            order.user_id,
            order.order_time.timestamp(),
            order.total_price,
            order.delivery_time_min,
            order.user_rating,
            order.refund_flag,
            if order.veg { "Yes" } else { "No" },
            order.offer_applied,
        ],
    )
    .map_err(|e| AnalystError::Storage(format!("Insert order: {}", e)))?;
    Ok(id)
}
