//! Relay configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `CHATRELAY_HOST` / `CHATRELAY_PORT` from the environment. Command-line
//! flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use chatrelay_protocol::{DEFAULT_HOST, DEFAULT_PORT, READ_BUFFER_SIZE};

/// Environment variable overriding the bind host
pub const HOST_ENV: &str = "CHATRELAY_HOST";

/// Environment variable overriding the bind port
pub const PORT_ENV: &str = "CHATRELAY_PORT";

/// Server configuration.
///
/// # Example
///
/// ```rust
/// use chatrelayd::config::RelayConfig;
///
/// let config = RelayConfig {
///     port: 0,
///     ..Default::default()
/// };
/// assert_eq!(config.bind_addr(), "127.0.0.1:0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address to bind the listening socket to.
    pub host: String,

    /// Port to listen on (0 picks an ephemeral port).
    pub port: u16,

    /// Size of a single transport read, and so the largest message unit
    /// relayed in one piece.
    pub read_buffer_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }
}

impl RelayConfig {
    /// Loads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates TOML. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `CHATRELAY_HOST` / `CHATRELAY_PORT` from the process
    /// environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                field: PORT_ENV,
                reason: format!("'{port}' is not a port number"),
            })?;
        }
        self.validate()
    }

    /// Checks values that would make the server unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "host",
                reason: "must not be empty".to_string(),
            });
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "read_buffer_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors raised while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 55555);
        assert_eq!(config.read_buffer_size, 4096);
        assert_eq!(config.bind_addr(), "127.0.0.1:55555");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RelayConfig::from_toml_str("port = 6000\n").unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.read_buffer_size, 4096);
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let err = RelayConfig::from_toml_str("read_buffer_size = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "read_buffer_size",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_toml() {
        let err = RelayConfig::from_toml_str("port = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"0.0.0.0\"\nport = 7001").unwrap();

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:7001");
    }

    #[test]
    fn test_load_missing_file() {
        let err = RelayConfig::load(Path::new("/nonexistent/chatrelay.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chatrelay.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [(HOST_ENV, "10.0.0.1"), (PORT_ENV, " 9000 ")].into();
        let mut config = RelayConfig::default();
        config
            .apply_env_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.bind_addr(), "10.0.0.1:9000");
    }

    #[test]
    fn test_env_bad_port() {
        let mut config = RelayConfig::default();
        let err = config
            .apply_env_from(|k| (k == PORT_ENV).then(|| "http".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CHATRELAY_PORT"));
    }
}
