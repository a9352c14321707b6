// Configuration loading for Rendezvous endpoints

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Merged settings from files, strings and the environment.
///
/// Later layers override earlier ones key by key.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    /// Start building a layered configuration
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Raw value for a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All configured keys
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Insert or replace a single value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Overlay another object on top of this one
    pub fn merge(&mut self, layer: Map<String, Value>) {
        self.values.extend(layer);
    }

    /// Deserialize into `T` and run its validation rules
    pub fn extract<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let settings: T = serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }
}

enum Layer {
    File(PathBuf),
    Inline(String, FileFormat),
    Env(String),
}

/// Builder for [`Settings`]
pub struct SettingsBuilder {
    dotenv: Option<Option<PathBuf>>,
    layers: Vec<Layer>,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            dotenv: None,
            layers: Vec::new(),
        }
    }

    /// Load a `.env` file into the process environment before reading env layers.
    /// `None` looks for `.env` in the working directory and ignores its absence.
    pub fn dotenv(mut self, path: Option<&Path>) -> Self {
        self.dotenv = Some(path.map(Path::to_path_buf));
        self
    }

    /// Add a configuration file, format detected from its extension
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.layers.push(Layer::File(path.as_ref().to_path_buf()));
        self
    }

    /// Add an in-memory configuration document
    pub fn inline(mut self, content: impl Into<String>, format: FileFormat) -> Self {
        self.layers.push(Layer::Inline(content.into(), format));
        self
    }

    /// Add environment variables sharing `prefix`
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.layers.push(Layer::Env(prefix.into()));
        self
    }

    /// Read every layer in order
    pub fn build(self) -> Result<Settings> {
        match self.dotenv {
            Some(Some(path)) => {
                dotenvy::from_path(&path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            Some(None) => {
                dotenvy::dotenv().ok();
            }
            None => {}
        }

        let mut settings = Settings::default();
        for layer in self.layers {
            let value = match layer {
                Layer::File(path) => ConfigLoader::auto(&path)?.load_file(&path)?,
                Layer::Inline(content, format) => ConfigLoader::new(format).parse(&content)?,
                Layer::Env(prefix) => Value::Object(EnvLoader::with_prefix(prefix).load_values()),
            };

            if let Value::Object(map) = value {
                settings.merge(map);
            }
        }

        Ok(settings)
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Polling {
        interval_ms: u64,
        #[serde(default)]
        label: Option<String>,
    }

    impl Validate for Polling {
        fn validate(&self) -> Result<()> {
            ConfigValidator::in_range(self.interval_ms, 1, 60_000, "interval_ms")
        }
    }

    #[test]
    fn test_later_layers_override() {
        let settings = Settings::builder()
            .inline(r#"{"interval_ms": 100, "label": "json"}"#, FileFormat::Json)
            .inline("interval_ms = 250", FileFormat::Toml)
            .build()
            .unwrap();

        let polling: Polling = settings.extract().unwrap();
        assert_eq!(polling.interval_ms, 250);
        assert_eq!(polling.label.as_deref(), Some("json"));
    }

    #[test]
    fn test_extract_runs_validation() {
        let mut settings = Settings::default();
        settings.set("interval_ms", 0);

        let err = settings.extract::<Polling>().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_extract_reports_missing_field() {
        let settings = Settings::default();
        let err = settings.extract::<Polling>().unwrap_err();
        assert!(matches!(err, ConfigError::DeserializationError(_)));
    }

    #[test]
    fn test_missing_file_fails() {
        let result = Settings::builder().file("/nonexistent/endpoint.toml").build();
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_unset_env_prefix_adds_nothing() {
        let settings = Settings::builder()
            .env_prefix("RENDEZVOUS_NO_SUCH_PREFIX_4242")
            .build()
            .unwrap();
        assert!(settings.keys().is_empty());
        assert!(!settings.has("timeout_ms"));
    }
}
