use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AnalystError, Result};

/// Top-level configuration for the analyst services.
///
/// Loaded from `~/.analyst/config.toml` by default. Every section is
/// optional; missing sections and keys fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalystConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl AnalystConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AnalystConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AnalystError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite order store and saved audio.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.analyst/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Proxy server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Extra origins allowed by CORS besides the server's own address.
    pub allowed_origins: Vec<String>,
    /// Upper bound on an uploaded audio recording.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: vec![],
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// The AI analytics backend the proxy forwards to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend service.
    pub base_url: String,
    /// Per-request timeout. Zero disables the timeout.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Chat client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Base URL of the proxy server the chat client talks to.
    pub proxy_url: String,
    /// Greeting shown as the first AI message.
    pub welcome_message: String,
    /// Maximum accepted length of a text query, in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            proxy_url: "http://127.0.0.1:3000".to_string(),
            welcome_message: "Hello! I'm your AI business analyst. I can help you analyze data, \
                              create insights, and answer questions about your business. \
                              What would you like to explore today?"
                .to_string(),
            max_message_length: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AnalystConfig::default();
        assert_eq!(config.general.data_dir, "~/.analyst/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.server.allowed_origins.is_empty());
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.backend.timeout_secs, 60);
        assert_eq!(config.chat.proxy_url, "http://127.0.0.1:3000");
        assert!(config.chat.welcome_message.starts_with("Hello!"));
        assert_eq!(config.chat.max_message_length, 2000);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"

[server]
host = "0.0.0.0"
port = 8080
allowed_origins = ["http://localhost:5173"]

[backend]
base_url = "http://analytics.internal:5000"
timeout_secs = 5

[chat]
proxy_url = "http://127.0.0.1:8080"
max_message_length = 500
"#;
        let file = create_temp_config(content);
        let config = AnalystConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.backend.base_url, "http://analytics.internal:5000");
        assert_eq!(config.backend.timeout_secs, 5);
        assert_eq!(config.chat.proxy_url, "http://127.0.0.1:8080");
        assert_eq!(config.chat.max_message_length, 500);
        // Unspecified keys keep their defaults.
        assert!(config.chat.welcome_message.starts_with("Hello!"));
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[backend]\nbase_url = \"http://10.0.0.2:5000\"\n");
        let config = AnalystConfig::load(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://10.0.0.2:5000");
        assert_eq!(config.backend.timeout_secs, 60);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = AnalystConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.backend.base_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        let result = AnalystConfig::load(file.path());
        assert!(matches!(result, Err(AnalystError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AnalystConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.analyst/data");
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = AnalystConfig::default();
        config.server.port = 4040;
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = AnalystConfig::load(&path).unwrap();
        assert_eq!(reloaded.server.port, 4040);
        assert_eq!(reloaded.chat.welcome_message, config.chat.welcome_message);
    }
}
