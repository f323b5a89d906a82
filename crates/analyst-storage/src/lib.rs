//! Analyst storage crate - SQLite order store and month-to-date metrics.
//!
//! Provides a WAL-mode SQLite database with migrations, an order repository
//! used for imports and fixtures, and the metrics aggregator that fans out
//! nine aggregate queries and assembles a `MetricsSnapshot`.

pub mod db;
pub mod metrics;
pub mod migrations;
pub mod orders;

pub use db::Database;
pub use metrics::{start_of_month, MetricsAggregator};
pub use orders::{NewOrder, OrderRepository};
