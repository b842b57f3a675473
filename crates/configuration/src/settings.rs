use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)] // The [logging] section is optional
    pub logging: LoggingConfig,
}

/// Connection parameters for the Postgres server and the size of the pool.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    /// Require TLS when connecting.
    pub tls: bool,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// The database name.
    pub database: String,
    /// Upper bound on concurrently open connections.
    pub maximum_connections: usize,
}

/// Settings for the tracing subscriber installed by the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set (e.g. "info", "orm=debug").
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.host must not be empty".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.database must not be empty".to_string(),
            ));
        }
        if self.maximum_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.maximum_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// The password is kept out of debug output.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("maximum_connections", &self.maximum_connections)
            .finish()
    }
}
