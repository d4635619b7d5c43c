//! Configuration data structures for switchyard.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files.
//! Every section has defaults so that an empty file is a valid configuration.
use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_idle_contexts() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            dispatcher: DispatcherConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Settings frozen into a dispatcher when it is built
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatcherConfig {
    /// Include internal error detail in error responses
    #[serde(default)]
    pub debug: bool,

    /// Upper bound on request contexts kept idle in the pool
    #[serde(default = "default_max_idle_contexts")]
    pub max_idle_contexts: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_idle_contexts: default_max_idle_contexts(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
