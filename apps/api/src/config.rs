//! Server configuration.
//!
//! Layered, later sources win:
//! ```text
//!   built-in defaults  →  ./torque.toml (optional)  →  TORQUE_* environment
//! ```
//!
//! | Key               | Env                       | Default     |
//! |-------------------|---------------------------|-------------|
//! | `host`            | `TORQUE_HOST`             | `0.0.0.0`   |
//! | `port`            | `TORQUE_PORT`             | `5000`      |
//! | `database_path`   | `TORQUE_DATABASE_PATH`    | `torque.db` |
//! | `max_connections` | `TORQUE_MAX_CONNECTIONS`  | `5`         |
//! | `busy_timeout_ms` | `TORQUE_BUSY_TIMEOUT_MS`  | `5000`      |
//! | `allow_backorder` | `TORQUE_ALLOW_BACKORDER`  | `false`     |
//! | `log_level`       | `TORQUE_LOG_LEVEL`        | `info`      |

use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use torque_db::DbConfig;

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub max_connections: u32,

    /// Bounded wait for the write lock before a request fails with a
    /// retryable conflict
    pub busy_timeout_ms: u64,

    /// Global backorder override
    pub allow_backorder: bool,

    /// Default tracing filter; `RUST_LOG` takes precedence
    pub log_level: String,
}

impl AppConfig {
    /// Loads defaults, then `torque.toml` if present, then `TORQUE_*`.
    pub fn load() -> Result<Self, ConfigError> {
        let config = defaults()?
            .add_source(File::with_name("torque").required(false))
            .add_source(Environment::with_prefix("TORQUE").try_parsing(true))
            .build()?;
        Self::finish(config)
    }

    /// Defaults overlaid with a TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config = defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue("database_path".to_string()));
        }
        Ok(())
    }

    /// `"host:port"`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .allow_backorder(self.allow_backorder)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", 5000_i64)?
        .set_default("database_path", "torque.db")?
        .set_default("max_connections", 5_i64)?
        .set_default("busy_timeout_ms", 5000_i64)?
        .set_default("allow_backorder", false)?
        .set_default("log_level", "info")?)
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.database_path, "torque.db");
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(!config.allow_backorder);
        assert_eq!(config.addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_toml_overrides() {
        let config = AppConfig::from_toml(
            r#"
            port = 8080
            database_path = "/var/lib/torque/shop.db"
            allow_backorder = true
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.allow_backorder);
        assert_eq!(config.host, "0.0.0.0");

        let db = config.db_config();
        assert!(db.allow_backorder);
        assert_eq!(db.busy_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_zero_port_and_pool() {
        assert!(matches!(
            AppConfig::from_toml("port = 0"),
            Err(ConfigError::InvalidValue(field)) if field == "port"
        ));
        assert!(matches!(
            AppConfig::from_toml("max_connections = 0"),
            Err(ConfigError::InvalidValue(field)) if field == "max_connections"
        ));
    }

    #[test]
    fn test_rejects_malformed_value() {
        assert!(matches!(
            AppConfig::from_toml(r#"port = "not-a-port""#),
            Err(ConfigError::Load(_))
        ));
    }
}
