//! CLI argument definitions for the analyst binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use analyst_core::config::AnalystConfig;

/// Analyst: chat with your business data and inspect monthly order metrics.
#[derive(Parser, Debug)]
#[command(name = "analyst", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the order database and saved reply audio.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the proxy server (default).
    Serve {
        /// Listen port.
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,
        /// Bind address.
        #[arg(long = "host")]
        host: Option<String>,
        /// Base URL of the analytics backend.
        #[arg(long = "backend-url")]
        backend_url: Option<String>,
    },
    /// Chat with the analyst from the terminal through the proxy.
    Chat {
        /// Base URL of the proxy server.
        #[arg(long = "proxy-url")]
        proxy_url: Option<String>,
        /// Audio file used as the microphone for `/record`.
        #[arg(long = "recording")]
        recording: Option<PathBuf>,
    },
    /// Print month-to-date order metrics as JSON.
    Metrics,
    /// Import orders from a JSON array file.
    Import {
        /// File containing `[{"user_id": ..., "order_time": ..., "total_price": ...}, ...]`.
        path: PathBuf,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > ANALYST_CONFIG env var > ~/.analyst/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("ANALYST_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// The subcommand to run, `serve` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            port: None,
            host: None,
            backend_url: None,
        })
    }

    /// Write command-line overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AnalystConfig) {
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }

        match &self.command {
            Some(Command::Serve {
                port,
                host,
                backend_url,
            }) => {
                if let Some(port) = port {
                    config.server.port = *port;
                }
                if let Some(host) = host {
                    config.server.host = host.clone();
                }
                if let Some(url) = backend_url {
                    config.backend.base_url = url.clone();
                }
            }
            Some(Command::Chat {
                proxy_url: Some(url),
                ..
            }) => {
                config.chat.proxy_url = url.clone();
            }
            _ => {}
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".analyst").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".analyst").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let args = CliArgs::try_parse_from(["analyst"]).unwrap();
        assert_eq!(
            args.command(),
            Command::Serve {
                port: None,
                host: None,
                backend_url: None
            }
        );
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::try_parse_from(["analyst", "--config", "/tmp/a.toml", "metrics"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/a.toml"));
        assert_eq!(args.command(), Command::Metrics);
    }

    #[test]
    fn test_serve_overrides() {
        let args = CliArgs::try_parse_from([
            "analyst",
            "-l",
            "debug",
            "serve",
            "--port",
            "8080",
            "--backend-url",
            "http://10.0.0.5:5000",
        ])
        .unwrap();

        let mut config = AnalystConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.backend.base_url, "http://10.0.0.5:5000");
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_chat_overrides() {
        let args = CliArgs::try_parse_from([
            "analyst",
            "chat",
            "--proxy-url",
            "http://127.0.0.1:9000",
            "--data-dir",
            "/tmp/analyst",
        ])
        .unwrap();

        let mut config = AnalystConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.chat.proxy_url, "http://127.0.0.1:9000");
        assert_eq!(config.general.data_dir, "/tmp/analyst");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_import_requires_path() {
        assert!(CliArgs::try_parse_from(["analyst", "import"]).is_err());
        let args = CliArgs::try_parse_from(["analyst", "import", "orders.json"]).unwrap();
        assert_eq!(
            args.command(),
            Command::Import {
                path: PathBuf::from("orders.json")
            }
        );
    }
}
