//! Connection configuration for database backends.
//!
//! The configuration is an explicit value handed to a backend builder. Nothing in this
//! crate reads process state implicitly; [`DatabaseConfig::from_env`] is an opt-in helper
//! for binaries that want the conventional environment variables.

use serde::{Deserialize, Serialize};
use std::{env, time::Duration};

use crate::error::{DatabaseError, DatabaseResult};

/// Environment variable holding the connection endpoint.
pub const URI_ENV: &str = "MONGODB_URI";
/// Environment variable holding the target database name.
pub const DATABASE_ENV: &str = "MONGODB_DB_NAME";
/// Environment variable holding the server selection timeout, in milliseconds.
pub const TIMEOUT_ENV: &str = "MONGODB_SERVER_SELECTION_TIMEOUT_MS";

const DEFAULT_SERVER_SELECTION_TIMEOUT_MS: u64 = 5000;

/// Connection settings: endpoint, database name and connection timeout.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use doctable_core::config::DatabaseConfig;
///
/// let config = DatabaseConfig::new("mongodb://localhost:27017", "app")
///     .with_server_selection_timeout(Duration::from_secs(2));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.server_selection_timeout(), Duration::from_secs(2));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Connection string of the store.
    pub uri: String,
    /// Name of the database all collections live in.
    pub database: String,
    /// How long connection establishment may wait for a usable server.
    #[serde(default = "default_timeout_ms")]
    pub server_selection_timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SERVER_SELECTION_TIMEOUT_MS
}

impl DatabaseConfig {
    /// Creates a configuration with the default 5 second server selection timeout.
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            server_selection_timeout_ms: DEFAULT_SERVER_SELECTION_TIMEOUT_MS,
        }
    }

    /// Sets the server selection timeout.
    pub fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the server selection timeout as a [`Duration`].
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }

    /// Checks that both identifiers are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Configuration`] naming the first empty identifier.
    pub fn validate(&self) -> DatabaseResult<()> {
        if self.uri.trim().is_empty() {
            return Err(DatabaseError::Configuration("connection uri is empty".into()));
        }
        if self.database.trim().is_empty() {
            return Err(DatabaseError::Configuration("database name is empty".into()));
        }

        Ok(())
    }

    /// Reads the configuration from `MONGODB_URI`, `MONGODB_DB_NAME` and the optional
    /// `MONGODB_SERVER_SELECTION_TIMEOUT_MS`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Configuration`] if a required variable is missing or empty,
    /// or if the timeout is not an integer.
    pub fn from_env() -> DatabaseResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DatabaseResult<Self> {
        let uri = lookup(URI_ENV)
            .ok_or_else(|| DatabaseError::Configuration(format!("{URI_ENV} is not set")))?;
        let database = lookup(DATABASE_ENV)
            .ok_or_else(|| DatabaseError::Configuration(format!("{DATABASE_ENV} is not set")))?;

        let mut config = Self::new(uri, database);

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.server_selection_timeout_ms = raw
                .trim()
                .parse()
                .map_err(|_| DatabaseError::Configuration(format!("{TIMEOUT_ENV} must be an integer, got `{raw}`")))?;
        }

        config.validate()?;

        Ok(config)
    }
}
