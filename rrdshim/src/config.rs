//! Client configuration.
//!
//! A [`ClientConfig`] holds defaults the [`Client`](crate::client::Client)
//! applies to every request: the rrdcached daemon to read through, a row cap
//! for exports, and whether creates may replace existing files. It can be
//! loaded from a JSON file and overridden from the environment.
//!
//! ```json
//! { "daemon": "unix:/run/rrdcached.sock", "max_rows": 400 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Environment variable librrd itself consults for the daemon address.
pub const DAEMON_ENV: &str = "RRDCACHED_ADDRESS";

/// Defaults applied by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// rrdcached address passed as `--daemon` to graph and export.
    pub daemon: Option<String>,
    /// Row cap passed as `-m` to exports that set none.
    pub max_rows: Option<u32>,
    /// Allow creates to replace existing files.
    pub overwrite: bool,
}

impl ClientConfig {
    /// Reads and validates a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not a valid config and
    /// [`ConfigError::Invalid`] if a value is out of bounds.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!("loaded client config from {}", path.display());
        Ok(config)
    }

    /// The default config with the environment applied.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Applies `RRDCACHED_ADDRESS` if it is set and non-empty.
    pub fn with_env(self) -> Self {
        let daemon = std::env::var(DAEMON_ENV).ok();
        self.with_daemon_override(daemon.as_deref())
    }

    /// Replaces the daemon address when `daemon` is non-empty.
    pub fn with_daemon_override(mut self, daemon: Option<&str>) -> Self {
        if let Some(address) = daemon.filter(|a| !a.is_empty()) {
            self.daemon = Some(address.to_string());
        }
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty daemon address or a
    /// zero row cap.
    pub fn validate(&self) -> Result<()> {
        if self.daemon.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                reason: "daemon address must not be empty".to_string(),
            }
            .into());
        }
        if self.max_rows == Some(0) {
            return Err(ConfigError::Invalid {
                reason: "max_rows must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
