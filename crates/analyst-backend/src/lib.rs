//! HTTP client for the AI analytics backend.
//!
//! The same client speaks to the backend directly (used by the proxy
//! server) and to the proxy's `/api/*` routes (used by chat clients); only
//! the route table differs.

pub mod client;
pub mod error;
pub mod routes;

pub use client::{AnalystBackend, HttpBackend, UpstreamResponse};
pub use error::BackendError;
pub use routes::{is_valid_session_id, RouteTable};
