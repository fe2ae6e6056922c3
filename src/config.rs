//! # Configuration
//!
//! Structured configuration files, bound in the container under `config`
//! during boot.
//!
//! The format follows the file extension: `.yaml`/`.yml` is YAML, `.toml`
//! is TOML, anything else is read as JSON. Every format is normalised into
//! a [`serde_json::Value`] so lookups do not care where the data came from.
//!
//! A missing file is an empty configuration. A file that exists but cannot
//! be read or parsed is a [`ConfigError::File`].
//!
//! ```rust
//! use mvcore::config::Config;
//! use serde_json::json;
//!
//! let config = Config::from_value(json!({ "session": { "name": "sid", "ttl": 900 } }));
//! assert_eq!(config.get("session.name").and_then(|v| v.as_str()), Some("sid"));
//! assert_eq!(config.section::<u64>("session.ttl").unwrap(), Some(900));
//! ```

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ConfigError;

fn file_error(path: &Path, source: impl Into<anyhow::Error>) -> ConfigError {
    ConfigError::File {
        path: path.display().to_string(),
        source: source.into(),
    }
}

/// Read and deserialize a structured file, picking the format from its
/// extension. Returns `Ok(None)` when the file does not exist or is blank.
///
/// # Errors
///
/// [`ConfigError::File`] when the file exists but cannot be read or parsed.
pub fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "Structured file absent");
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| file_error(path, e))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let parsed = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| file_error(path, e))?,
        "toml" => toml::from_str(&content).map_err(|e| file_error(path, e))?,
        _ => serde_json::from_str(&content).map_err(|e| file_error(path, e))?,
    };
    Ok(Some(parsed))
}

/// Load the configuration file at `path` into a JSON value. Absent files
/// and empty documents yield an empty object.
///
/// # Errors
///
/// [`ConfigError::File`] for unreadable or malformed files.
pub fn load_config(path: &Path) -> Result<Value, ConfigError> {
    let value = read_structured::<Value>(path)?.unwrap_or(Value::Null);
    let value = match value {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    info!(
        path = %path.display(),
        keys = value.as_object().map_or(0, serde_json::Map::len),
        "Configuration loaded"
    );
    Ok(value)
}

/// Read-only view over the loaded configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: Value,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: Value::Object(serde_json::Map::new()),
        }
    }
}

impl Config {
    #[must_use]
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Load from `path`. See [`load_config`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::File`] for unreadable or malformed files.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_config(path).map(Self::from_value)
    }

    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Look up a dotted path such as `database.primary.host`. Numeric
    /// segments index into arrays.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split('.').try_fold(&self.root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Deserialize the value at `path` into `T`. Absent paths are
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// The `serde_json` error when the value does not have `T`'s shape.
    pub fn section<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, serde_json::Error> {
        self.get(path).map(|v| T::deserialize(v)).transpose()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.root {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }
}
