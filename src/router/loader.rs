//! Declarative routes files.
//!
//! A routes file is a YAML, TOML or JSON document holding route
//! declarations, either as a bare list or under a `routes` key:
//!
//! ```yaml
//! routes:
//!   - pattern: article/:year/:slug
//!     methods: [GET]
//!     class: Articles
//!     action: show
//!     where: { year: numeric }
//!     where_regex: { slug: "[a-z0-9-]+" }
//!     middleware: [auth]
//!   - pattern: search/:term
//!     methods: [GET, POST]
//!     class: Search
//!     action: run
//!     unicode: true
//!     params: { layout: compact }
//! ```
//!
//! Middleware is referenced by the name it was registered under in the
//! [`Registry`]. The method `ANY` expands to [`ANY_METHODS`].

use http::Method;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use super::core::{Router, ANY_METHODS};
use super::route::Route;
use crate::config::read_structured;
use crate::error::ConfigError;
use crate::executable::Executable;
use crate::registry::Registry;

fn default_methods() -> Vec<String> {
    vec!["GET".to_string()]
}

/// One route declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteDecl {
    pub pattern: String,
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    pub class: String,
    pub action: String,
    /// Construction-time executable parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Parameter name → preset name.
    #[serde(default, rename = "where")]
    pub conditions: BTreeMap<String, String>,
    /// Parameter name → raw regex fragment.
    #[serde(default)]
    pub where_regex: BTreeMap<String, String>,
    #[serde(default)]
    pub unicode: bool,
    #[serde(default)]
    pub middleware: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoutesFile {
    List(Vec<RouteDecl>),
    Table { routes: Vec<RouteDecl> },
}

fn parse_method(raw: &str) -> Result<Vec<Method>, ConfigError> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper == "ANY" {
        return Ok(ANY_METHODS.to_vec());
    }
    Method::from_bytes(upper.as_bytes())
        .map(|m| vec![m])
        .map_err(|_| ConfigError::InvalidMethod(raw.to_string()))
}

impl RouteDecl {
    /// Build the route this declaration describes.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] raised by invalid names, methods, presets,
    /// fragments or unknown middleware.
    pub fn build(&self, registry: &Registry) -> Result<Route, ConfigError> {
        let mut methods = Vec::new();
        for raw in &self.methods {
            methods.extend(parse_method(raw)?);
        }
        let first = methods
            .first()
            .cloned()
            .ok_or_else(|| ConfigError::NoMethods(self.pattern.clone()))?;

        let executable = Executable::with_params(&self.class, &self.action, self.params.clone())?;
        let mut route = Route::from_executable(&self.pattern, first, executable);
        route.set_methods(methods)?;

        for (param, preset) in &self.conditions {
            route.where_named(param, preset)?;
        }
        for (param, fragment) in &self.where_regex {
            route.where_regex(param, fragment)?;
        }
        if self.unicode {
            route.match_unicode();
        }
        for name in &self.middleware {
            let middleware = registry
                .middleware(name)
                .ok_or_else(|| ConfigError::UnknownMiddleware(name.clone()))?;
            route.add_shared_middleware(middleware);
        }
        Ok(route)
    }
}

/// Read the declarations in `path`. A missing file declares nothing.
///
/// # Errors
///
/// [`ConfigError::File`] when the file exists but is malformed.
pub fn load_routes(path: &Path) -> Result<Vec<RouteDecl>, ConfigError> {
    let decls = match read_structured::<RoutesFile>(path)? {
        None => Vec::new(),
        Some(RoutesFile::List(decls) | RoutesFile::Table { routes: decls }) => decls,
    };
    info!(path = %path.display(), routes_count = decls.len(), "Routes file loaded");
    Ok(decls)
}

/// Append every declaration to `router`, in file order.
///
/// # Errors
///
/// The first declaration that fails to build. Routes before it stay
/// registered.
pub fn apply(router: &mut Router, decls: &[RouteDecl], registry: &Registry) -> Result<usize, ConfigError> {
    for decl in decls {
        router.add(decl.build(registry)?);
    }
    Ok(decls.len())
}
