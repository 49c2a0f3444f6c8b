//! Configuration loading and typed config structures for nbasim.
//!
//! Configuration lives in an optional YAML file (`nbasim.yaml` by
//! convention). Every field has a default, so an empty file, or no file
//! at all, yields a working setup. After parsing, a handful of environment
//! variables override the file; command-line flags override both (applied
//! by the binary).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::playback::SpeedFactor;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is present but unusable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NbasimConfig {
    /// Broadcast server settings.
    #[serde(default)]
    pub server: ListenConfig,

    /// Play-by-play feed settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Playback defaults.
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NbasimConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides:
    /// - `NBASIM_HOST` overrides `server.host`
    /// - `NBASIM_PORT` overrides `server.port`
    /// - `NBASIM_FEED_URL` overrides `feed.url_template`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse("")
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `NBASIM_PORT` is not a port number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `NBASIM_PORT` is not a port number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("NBASIM_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("NBASIM_PORT") {
            self.server.port = port.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("NBASIM_PORT={port:?}: {e}"),
            })?;
        }
        if let Some(url) = lookup("NBASIM_FEED_URL") {
            self.feed.url_template = url;
        }
        Ok(())
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SpeedFactor::new(self.playback.speed_factor).map_err(|e| ConfigError::Invalid {
            reason: format!("playback.speed_factor: {e}"),
        })?;
        if self.server.consumer_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "server.consumer_queue_capacity must be at least 1".to_owned(),
            });
        }
        if self.feed.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "feed.timeout_ms must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Broadcast server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Outbound frames buffered per connection before it is considered gone.
    #[serde(default = "default_consumer_queue_capacity")]
    pub consumer_queue_capacity: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            consumer_queue_capacity: default_consumer_queue_capacity(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_consumer_queue_capacity() -> usize {
    256
}

/// Play-by-play feed settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// URL template; `{game_id}` is replaced with the session id.
    #[serde(default = "default_url_template")]
    pub url_template: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_feed_timeout_ms")]
    pub timeout_ms: u64,
}

impl FeedConfig {
    /// The request timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            timeout_ms: default_feed_timeout_ms(),
        }
    }
}

fn default_url_template() -> String {
    nbasim_feed::DEFAULT_URL_TEMPLATE.to_owned()
}

const fn default_feed_timeout_ms() -> u64 {
    10_000
}

/// Playback defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaybackConfig {
    /// Simulated seconds per real second.
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,

    /// Delay between preparing a playback and its real start time.
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,

    /// Base URL of the broadcast server used by client-side playback.
    #[serde(default = "default_server_url")]
    pub server_url: String,
}

impl PlaybackConfig {
    /// The start delay as a [`Duration`].
    pub const fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed_factor: default_speed_factor(),
            start_delay_ms: default_start_delay_ms(),
            server_url: default_server_url(),
        }
    }
}

const fn default_speed_factor() -> f64 {
    1.0
}

const fn default_start_delay_ms() -> u64 {
    2000
}

fn default_server_url() -> String {
    "ws://localhost:8080".to_owned()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse_without_env(yaml: &str) -> Result<NbasimConfig, ConfigError> {
        let mut config: NbasimConfig = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = NbasimConfig::default();
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.consumer_queue_capacity, 256);
        assert_eq!(config.feed.timeout(), Duration::from_secs(10));
        assert!(config.feed.url_template.contains("{game_id}"));
        assert_eq!(config.playback.start_delay(), Duration::from_secs(2));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r"
server:
  port: 9000
playback:
  speed_factor: 4.0
logging:
  format: json
";
        let config = parse_without_env(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "localhost");
        assert!((config.playback.speed_factor - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.playback.start_delay_ms, 2000);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn zero_speed_factor_is_invalid() {
        let err = parse_without_env("playback:\n  speed_factor: 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn zero_queue_capacity_is_invalid() {
        let err = parse_without_env("server:\n  consumer_queue_capacity: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let err = parse_without_env("server: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = NbasimConfig::default();
        config
            .apply_overrides(|name| match name {
                "NBASIM_HOST" => Some("0.0.0.0".to_owned()),
                "NBASIM_PORT" => Some("9090".to_owned()),
                "NBASIM_FEED_URL" => Some("http://feed.local/{game_id}".to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.feed.url_template, "http://feed.local/{game_id}");
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = NbasimConfig::default();
        let err = config
            .apply_overrides(|name| (name == "NBASIM_PORT").then(|| "eighty".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
