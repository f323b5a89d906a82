//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use analyst_backend::HttpBackend;
use analyst_core::config::AnalystConfig;
use analyst_core::error::AnalystError;
use analyst_storage::{Database, MetricsAggregator};

/// Shared application state.
///
/// The proxy holds no per-session state: everything here is either
/// immutable or internally synchronized.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AnalystConfig>,
    /// Client for the analytics backend.
    pub backend: Arc<HttpBackend>,
    pub metrics: MetricsAggregator,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AnalystConfig, backend: HttpBackend, database: Arc<Database>) -> Self {
        Self {
            config: Arc::new(config),
            backend: Arc::new(backend),
            metrics: MetricsAggregator::new(database),
            start_time: Instant::now(),
        }
    }

    /// Build the backend client from `config.backend`.
    pub fn from_config(config: AnalystConfig, database: Arc<Database>) -> Result<Self, AnalystError> {
        let backend = HttpBackend::from_config(&config.backend)?;
        Ok(Self::new(config, backend, database))
    }
}
