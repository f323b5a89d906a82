//! Month-to-date business metrics over the orders table.
//!
//! Nine independent aggregate queries are fanned out onto the blocking pool
//! and joined before the snapshot is assembled. Any single failure aborts the
//! whole aggregation.
//!
//! All queries share the one `Database` connection, so they take its mutex in
//! turn rather than running in parallel. Each query is bounded by the highest
//! order rowid seen before the fan-out; an order inserted mid-aggregation is
//! left out of every figure, so counts and ratios always describe the same set
//! of rows. Orders are never deleted, which keeps rowids increasing.

use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rusqlite::Connection;
use tracing::debug;

use analyst_core::error::AnalystError;
use analyst_core::types::{ratio, MetricsSnapshot};

use crate::db::Database;

/// First instant of the UTC month containing `now`.
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now
        .date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_else(|| now.naive_utc());
    Utc.from_utc_datetime(&first)
}

/// Rows an aggregation may see: placed in the month and already stored
/// when it began.
#[derive(Debug, Clone, Copy)]
struct Window {
    since: i64,
    watermark: i64,
}

/// Computes `MetricsSnapshot`s from the order store.
#[derive(Clone)]
pub struct MetricsAggregator {
    db: Arc<Database>,
}

impl MetricsAggregator {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Metrics for the current month to date.
    pub async fn snapshot(&self) -> Result<MetricsSnapshot, AnalystError> {
        self.snapshot_at(Utc::now()).await
    }

    /// Metrics for the month containing `now`, counting orders placed at or
    /// after the first instant of that month.
    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> Result<MetricsSnapshot, AnalystError> {
        let watermark = self.watermark().await?;
        self.snapshot_through(now, watermark).await
    }

    /// Highest order rowid currently stored, 0 when there are none.
    async fn watermark(&self) -> Result<i64, AnalystError> {
        self.run("watermark", |conn| {
            conn.query_row("SELECT COALESCE(MAX(rowid), 0) FROM orders", [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .await
    }

    async fn snapshot_through(
        &self,
        now: DateTime<Utc>,
        watermark: i64,
    ) -> Result<MetricsSnapshot, AnalystError> {
        let start = start_of_month(now);
        let window = Window {
            since: start.timestamp(),
            watermark,
        };

        let (
            total_orders,
            total_revenue,
            avg_order_price,
            avg_delivery_time,
            avg_user_rating,
            refunded_orders,
            unique_users,
            veg_orders,
            offer_orders,
        ) = tokio::try_join!(
            self.count("total_orders", "COUNT(*)", "", window),
            self.aggregate("total_revenue", "SUM(total_price)", window),
            self.aggregate("avg_order_price", "AVG(total_price)", window),
            self.aggregate("avg_delivery_time", "AVG(delivery_time_min)", window),
            self.aggregate("avg_user_rating", "AVG(user_rating)", window),
            self.count("refunded_orders", "COUNT(*)", "AND refund_flag = 1", window),
            self.count("unique_users", "COUNT(DISTINCT user_id)", "", window),
            self.count("veg_orders", "COUNT(*)", "AND veg = 'Yes'", window),
            self.count("offer_orders", "COUNT(*)", "AND offer_applied = 1", window),
        )?;

        debug!(
            total_orders,
            refunded_orders,
            unique_users,
            watermark,
            period_start = %start,
            "Metrics aggregated"
        );

        Ok(MetricsSnapshot {
            total_orders,
            total_revenue,
            avg_order_price,
            avg_delivery_time,
            avg_user_rating,
            refunded_orders,
            unique_users,
            veg_order_ratio: ratio(veg_orders, total_orders),
            offer_usage_ratio: ratio(offer_orders, total_orders),
            period_start: start,
        })
    }

    async fn count(
        &self,
        label: &'static str,
        expr: &'static str,
        filter: &'static str,
        window: Window,
    ) -> Result<u64, AnalystError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE order_time >= ?1 AND rowid <= ?2 {}",
            expr, filter
        );
        self.run(label, move |conn| {
            conn.query_row(&sql, [window.since, window.watermark], |row| {
                row.get::<_, i64>(0)
            })
                .map(|n| n as u64)
        })
        .await
    }

    async fn aggregate(
        &self,
        label: &'static str,
        expr: &'static str,
        window: Window,
    ) -> Result<Option<f64>, AnalystError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE order_time >= ?1 AND rowid <= ?2",
            expr
        );
        self.run(label, move |conn| {
            conn.query_row(&sql, [window.since, window.watermark], |row| {
                row.get::<_, Option<f64>>(0)
            })
        })
        .await
    }

    async fn run<T, F>(&self, label: &'static str, query: F) -> Result<T, AnalystError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| {
                query(conn).map_err(|e| AnalystError::Storage(format!("{} query: {}", label, e)))
            })
        })
        .await
        .map_err(|e| AnalystError::Storage(format!("{} task failed: {}", label, e)))?
    }
}
