pub mod config;
pub mod error;
pub mod types;

pub use config::AnalystConfig;
pub use error::{AnalystError, Result};
pub use types::*;
