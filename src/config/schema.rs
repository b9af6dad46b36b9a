//! Configuration schema definitions.
//!
//! All fields have defaults, so an empty environment yields a runnable
//! service.

use serde::{Deserialize, Serialize};

use crate::observability::Level;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment (`production` or `development`).
    pub app_env: String,

    /// Project name, used as the logger name and on every record.
    pub app_name: String,

    /// Project version, attached to every record.
    pub app_version: String,

    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Minimum log level (`TRACE`, `DEBUG`, `INFO`, ...).
    pub log_level: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body size.
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_env: "production".to_string(),
            app_name: env!("CARGO_PKG_NAME").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "DEBUG".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// Parsed log level; validation rejects values that do not parse.
    pub fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
