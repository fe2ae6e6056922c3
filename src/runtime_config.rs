//! # Runtime Configuration Module
//!
//! Environment-driven application paths, used by
//! [`Core::from_runtime_config`](crate::app::Core::from_runtime_config).
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `MVCORE_APP_PATH` | current directory |
//! | `MVCORE_CONFIG_PATH` | `<app>/config.yaml` |
//! | `MVCORE_ROUTES_PATH` | `<app>/routes.yaml` |
//! | `MVCORE_VIEWS_PATH` | `<app>/views` |
//!
//! ## Usage
//!
//! ```rust
//! use mvcore::runtime_config::RuntimeConfig;
//!
//! let paths = RuntimeConfig::for_app("/srv/blog");
//! assert!(paths.routes_path.ends_with("routes.yaml"));
//! ```

use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_ROUTES_FILE: &str = "routes.yaml";
pub const DEFAULT_VIEWS_DIR: &str = "views";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub app_path: PathBuf,
    pub config_path: PathBuf,
    pub routes_path: PathBuf,
    pub views_path: PathBuf,
}

impl RuntimeConfig {
    /// Paths derived from `app_path` with the default file names.
    #[must_use]
    pub fn for_app(app_path: impl AsRef<Path>) -> Self {
        let app_path = app_path.as_ref().to_path_buf();
        Self {
            config_path: app_path.join(DEFAULT_CONFIG_FILE),
            routes_path: app_path.join(DEFAULT_ROUTES_FILE),
            views_path: app_path.join(DEFAULT_VIEWS_DIR),
            app_path,
        }
    }

    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`RuntimeConfig::from_env`] with a custom variable source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_path = lookup("MVCORE_APP_PATH")
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from);
        let mut config = Self::for_app(app_path);
        if let Some(path) = lookup("MVCORE_CONFIG_PATH").filter(|v| !v.is_empty()) {
            config.config_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("MVCORE_ROUTES_PATH").filter(|v| !v.is_empty()) {
            config.routes_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("MVCORE_VIEWS_PATH").filter(|v| !v.is_empty()) {
            config.views_path = PathBuf::from(path);
        }
        config
    }
}
