//! Steward configuration.
//!
//! Loaded from a TOML file with `STEWARD__` environment overrides. Only
//! configuration errors are fatal at startup; everything downstream
//! recovers per account.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use steward_identity::EndpointConfig;
use steward_types::DEFAULT_DELIMITER;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Field delimiter for the transport line format. Must be one
    /// character and must match on both sides of a round trip.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Per-call identity-backend timeout in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Whether the default-domain heuristic may run for unresolvable
    /// domains.
    #[serde(default = "default_domain_fallback")]
    pub default_domain_fallback: bool,
    /// Address to expose Prometheus metrics. If not set, the metrics
    /// endpoint is disabled.
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
    /// Identity endpoints for domain-scoped verification, in priority
    /// order.
    #[serde(default)]
    pub verify: Vec<EndpointConfig>,
    /// Privileged identity endpoints for the bulk-scrape warm-up.
    #[serde(default)]
    pub scrape: Vec<EndpointConfig>,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_domain_fallback() -> bool {
    true
}

impl Config {
    /// Loads configuration from a file, with environment overrides.
    ///
    /// Uses the given path when provided, otherwise tries `steward.toml`
    /// in the working directory and `/etc/steward/config`. Environment
    /// variables use the `STEWARD__` prefix with `__` nesting (e.g.
    /// `STEWARD__CALL_TIMEOUT_SECS=30`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();

        let builder = if let Some(path) = path {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
                .add_source(config::File::with_name("steward").required(false))
                .add_source(config::File::with_name("/etc/steward/config").required(false))
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("STEWARD").separator("__").try_parsing(true),
        );

        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// The configured delimiter as a single character.
    pub fn delimiter_char(&self) -> char {
        // validate() guarantees exactly one character.
        self.delimiter.chars().next().unwrap_or(DEFAULT_DELIMITER)
    }

    /// Per-call identity timeout.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.delimiter.chars().count() != 1 {
            return Err(ConfigError::Parse(format!(
                "delimiter must be one character, got '{}'",
                self.delimiter
            )));
        }
        Ok(())
    }

    /// Minimal configuration for tests.
    #[allow(clippy::unwrap_used, dead_code)]
    pub fn for_test() -> Self {
        Self {
            delimiter: default_delimiter(),
            call_timeout_secs: default_call_timeout_secs(),
            default_domain_fallback: true,
            metrics_addr: None,
            verify: vec![],
            scrape: vec![],
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load configuration.
    Load(String),
    /// Failed to parse or validate configuration.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "failed to load config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::for_test();
        assert_eq!(config.delimiter_char(), ';');
        assert_eq!(config.call_timeout(), Duration::from_secs(10));
        assert!(config.default_domain_fallback);
        assert!(config.verify.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("tempfile");
        writeln!(
            file,
            r#"
delimiter = "|"
call_timeout_secs = 3

[[verify]]
name = "region-a"
auth_url = "https://identity-a.example.net/v3"
username = "steward"
password = "secret"

[[scrape]]
name = "region-b"
auth_url = "https://identity-b.example.net/v3"
username = "steward"
password = "secret"
domain_scoped = false
"#
        )
        .expect("write config");

        let config =
            Config::load(Some(file.path().to_str().expect("utf-8 path"))).expect("load config");
        assert_eq!(config.delimiter_char(), '|');
        assert_eq!(config.call_timeout(), Duration::from_secs(3));
        assert_eq!(config.verify.len(), 1);
        assert_eq!(config.verify[0].name, "region-a");
        assert!(config.verify[0].domain_scoped, "domain scoping defaults on");
        assert!(!config.scrape[0].domain_scoped);
    }

    #[test]
    fn test_multichar_delimiter_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("tempfile");
        writeln!(file, "delimiter = \";;\"").expect("write config");

        let err = Config::load(Some(file.path().to_str().expect("utf-8 path"))).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
