//! Endpoint configuration.

use std::path::Path;
use std::time::Duration;

use rendezvous_config::{ConfigValidator, FileFormat, Result, Settings, Validate};
use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_POLLING_INTERVAL;

/// Prefix read by [`EndpointConfig::from_default_env`].
pub const DEFAULT_ENV_PREFIX: &str = "RENDEZVOUS_ENDPOINT";

/// Upper bound for the polling interval.
pub const MAX_POLLING_INTERVAL: Duration = Duration::from_secs(60);

/// Settings shared by an endpoint's producer and consumer side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Default bounded-wait duration for `receive`, in milliseconds
    pub timeout_ms: u64,
    /// Pause between store lookups while waiting, in milliseconds
    pub polling_interval_ms: u64,
    /// Correlate on this message header instead of the message id
    pub correlation_header: Option<String>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            timeout_ms: millis(default_timeout()),
            polling_interval_ms: millis(DEFAULT_POLLING_INTERVAL),
            correlation_header: None,
        }
    }
}

impl EndpointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON, TOML or `.env` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Settings::builder().file(path).build()?.extract()
    }

    /// Parse from an in-memory document.
    pub fn from_str_with_format(content: &str, format: FileFormat) -> Result<Self> {
        Settings::builder().inline(content, format).build()?.extract()
    }

    /// Read `<PREFIX>_TIMEOUT_MS`, `<PREFIX>_POLLING_INTERVAL_MS` and
    /// `<PREFIX>_CORRELATION_HEADER`; unset variables keep their defaults.
    pub fn from_env(prefix: &str) -> Result<Self> {
        Settings::builder().env_prefix(prefix).build()?.extract()
    }

    /// [`from_env`](Self::from_env) with `RENDEZVOUS_ENDPOINT`.
    pub fn from_default_env() -> Result<Self> {
        Self::from_env(DEFAULT_ENV_PREFIX)
    }

    /// Deserialize from already merged settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.extract()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = millis(timeout);
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval_ms = millis(interval);
        self
    }

    pub fn with_correlation_header(mut self, header: impl Into<String>) -> Self {
        self.correlation_header = Some(header.into());
        self
    }
}

impl Validate for EndpointConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::non_zero(self.polling_interval(), "polling_interval_ms")?;
        ConfigValidator::at_most(
            self.polling_interval(),
            MAX_POLLING_INTERVAL,
            "polling_interval_ms",
            "the maximum polling interval",
        )?;
        if let Some(ref header) = self.correlation_header {
            ConfigValidator::not_empty(header, "correlation_header")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendezvous_config::ConfigError;

    #[test]
    fn test_defaults() {
        let config = EndpointConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(5000));
        assert_eq!(config.polling_interval(), Duration::from_millis(500));
        assert!(config.correlation_header.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EndpointConfig::new()
            .with_timeout(Duration::from_secs(10))
            .with_polling_interval(Duration::from_millis(50))
            .with_correlation_header("x-request-id");

        assert_eq!(config.timeout_ms, 10_000);
        assert_eq!(config.polling_interval_ms, 50);
        assert_eq!(config.correlation_header.as_deref(), Some("x-request-id"));
    }

    #[test]
    fn test_from_toml_keeps_defaults_for_missing_keys() {
        let config =
            EndpointConfig::from_str_with_format("timeout_ms = 1500", FileFormat::Toml).unwrap();

        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert_eq!(config.polling_interval(), DEFAULT_POLLING_INTERVAL);
    }

    #[test]
    fn test_from_json() {
        let config = EndpointConfig::from_str_with_format(
            r#"{"polling_interval_ms": 100, "correlation_header": "x-trace"}"#,
            FileFormat::Json,
        )
        .unwrap();

        assert_eq!(config.polling_interval(), Duration::from_millis(100));
        assert_eq!(config.correlation_header.as_deref(), Some("x-trace"));
    }

    #[test]
    fn test_zero_polling_interval_is_rejected() {
        let err = EndpointConfig::from_str_with_format("polling_interval_ms = 0", FileFormat::Toml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_blank_header_is_rejected() {
        let config = EndpointConfig::new().with_correlation_header("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_durations_saturate() {
        let config = EndpointConfig::new().with_timeout(Duration::MAX);
        assert_eq!(config.timeout_ms, u64::MAX);
        assert_eq!(config.timeout(), Duration::from_millis(u64::MAX));

        let config = EndpointConfig::new().with_polling_interval(Duration::MAX);
        assert_eq!(config.polling_interval_ms, u64::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_settings_reads_merged_layers() {
        let settings = Settings::builder()
            .inline("timeout_ms = 100\npolling_interval_ms = 20", FileFormat::Toml)
            .inline(r#"{"timeout_ms": 250}"#, FileFormat::Json)
            .build()
            .unwrap();

        let config = EndpointConfig::from_settings(&settings).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.polling_interval(), Duration::from_millis(20));
        assert!(config.correlation_header.is_none());
    }

    #[test]
    fn test_from_settings_validates() {
        let settings = Settings::builder()
            .inline(r#"{"correlation_header": ""}"#, FileFormat::Json)
            .build()
            .unwrap();

        assert!(EndpointConfig::from_settings(&settings).is_err());
    }

    #[test]
    fn test_from_env_without_variables_uses_defaults() {
        let config = EndpointConfig::from_env("RENDEZVOUS_UNSET_PREFIX_31337").unwrap();
        assert_eq!(config, EndpointConfig::default());
    }
}
