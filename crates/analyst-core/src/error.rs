use thiserror::Error;

/// Top-level error type for the analyst workspace.
///
/// Subsystem crates define their own error types and implement
/// `From<AnalystError>` (or the reverse) so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalystError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Payload too large: {size} bytes exceeds {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },
}

impl From<toml::de::Error> for AnalystError {
    fn from(err: toml::de::Error) -> Self {
        AnalystError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AnalystError {
    fn from(err: toml::ser::Error) -> Self {
        AnalystError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AnalystError {
    fn from(err: serde_json::Error) -> Self {
        AnalystError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for analyst operations.
pub type Result<T> = std::result::Result<T, AnalystError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalystError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(AnalystError, &str)> = vec![
            (
                AnalystError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                AnalystError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                AnalystError::Backend("connection refused".to_string()),
                "Backend error: connection refused",
            ),
            (
                AnalystError::Audio("bad base64".to_string()),
                "Audio error: bad base64",
            ),
            (
                AnalystError::Api("bind failed".to_string()),
                "API error: bind failed",
            ),
            (
                AnalystError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
            (
                AnalystError::PayloadTooLarge {
                    size: 100,
                    limit: 50,
                },
                "Payload too large: 100 bytes exceeds 50 bytes",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AnalystError = io_err.into();
        assert!(matches!(err, AnalystError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: AnalystError = err.unwrap_err().into();
        assert!(matches!(err, AnalystError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: AnalystError = err.unwrap_err().into();
        assert!(matches!(err, AnalystError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
