//! Analyst API crate - same-origin proxy to the analytics backend.
//!
//! Relays session, text and audio queries to the backend unchanged, and
//! serves the month-to-date order metrics and a liveness check.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
