//! A single URL pattern bound to methods, parameter conditions, an
//! [`Executable`] and a route-local middleware list.

use http::Method;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{ConfigError, DispatchResult};
use crate::executable::Executable;
use crate::middleware::{run_chain, Middleware};
use crate::params::{url_decode, Params};
use crate::resolver::Resolver;

/// Named character classes usable as parameter conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Letters, digits, `_` and `-`.
    Default,
    /// Like `Default` but any Unicode letter.
    Unicode,
    AlphaNumeric,
    Numeric,
    Alpha,
    AlphaLowercase,
    /// Digits, `.` and `-`.
    RealNumeric,
}

impl Preset {
    pub const ALL: [Preset; 7] = [
        Preset::Default,
        Preset::Unicode,
        Preset::AlphaNumeric,
        Preset::Numeric,
        Preset::Alpha,
        Preset::AlphaLowercase,
        Preset::RealNumeric,
    ];

    /// The regex fragment matched by this preset.
    #[must_use]
    pub fn class(self) -> &'static str {
        match self {
            Preset::Default => r"[a-zA-Z0-9_\-]+",
            Preset::Unicode => r"[\p{L}0-9_\-]+",
            Preset::AlphaNumeric => "[a-zA-Z0-9]+",
            Preset::Numeric => "[0-9]+",
            Preset::Alpha => "[a-zA-Z]+",
            Preset::AlphaLowercase => "[a-z]+",
            Preset::RealNumeric => r"[0-9.\-]+",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Unicode => "unicode",
            Preset::AlphaNumeric => "alpha-numeric",
            Preset::Numeric => "numeric",
            Preset::Alpha => "alpha",
            Preset::AlphaLowercase => "alpha-lowercase",
            Preset::RealNumeric => "real-numeric",
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum Piece<'a> {
    Literal(&'a str),
    Token(&'a str),
}

/// Split a pattern into literal runs and `:name` tokens. A `:` not
/// followed by a word character is literal text.
fn pieces(pattern: &str) -> Vec<Piece<'_>> {
    let bytes = pattern.as_bytes();
    let mut out = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            let name_len = bytes[i + 1..]
                .iter()
                .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
                .count();
            if name_len > 0 {
                if literal_start < i {
                    out.push(Piece::Literal(&pattern[literal_start..i]));
                }
                out.push(Piece::Token(&pattern[i + 1..i + 1 + name_len]));
                i += 1 + name_len;
                literal_start = i;
                continue;
            }
        }
        i += 1;
    }
    if literal_start < bytes.len() {
        out.push(Piece::Literal(&pattern[literal_start..]));
    }
    out
}

/// Token names of `pattern` in first-appearance order.
#[must_use]
pub fn token_names(pattern: &str) -> Vec<Arc<str>> {
    pieces(pattern)
        .into_iter()
        .filter_map(|p| match p {
            Piece::Token(name) => Some(Arc::from(name)),
            Piece::Literal(_) => None,
        })
        .collect()
}

fn group_name(index: usize) -> String {
    format!("__mv{index}")
}

fn normalize_pattern(pattern: &str) -> String {
    pattern.trim_matches('/').to_string()
}

/// A registered route.
///
/// Matching never mutates the route: [`Route::match_request`] hands back the
/// decoded parameters and [`Route::dispatch`] takes them per call.
#[derive(Clone)]
pub struct Route {
    pattern: String,
    tokens: Vec<Arc<str>>,
    methods: Vec<Method>,
    presets: HashMap<String, Preset>,
    overrides: HashMap<String, String>,
    unicode: bool,
    executable: Executable,
    middleware: Vec<Arc<dyn Middleware>>,
    compiled: OnceCell<Regex>,
}

impl Route {
    /// Create a route for `pattern` accepting `method`, dispatching to
    /// `class::action`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTarget`] for invalid class or action names.
    pub fn new(pattern: &str, method: Method, class: &str, action: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_executable(pattern, method, Executable::new(class, action)?))
    }

    /// Create a route around an already configured executable.
    #[must_use]
    pub fn from_executable(pattern: &str, method: Method, executable: Executable) -> Self {
        let pattern = normalize_pattern(pattern);
        Self {
            tokens: token_names(&pattern),
            pattern,
            methods: vec![method],
            presets: HashMap::new(),
            overrides: HashMap::new(),
            unicode: false,
            executable,
            middleware: Vec::new(),
            compiled: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Names of the pattern's tokens in first-appearance order.
    #[must_use]
    pub fn tokens(&self) -> &[Arc<str>] {
        &self.tokens
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    #[must_use]
    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn executable_mut(&mut self) -> &mut Executable {
        &mut self.executable
    }

    #[must_use]
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    #[must_use]
    pub fn is_unicode(&self) -> bool {
        self.unicode
    }

    /// Accept `method` in addition to the current ones.
    pub fn via(&mut self, method: Method) -> &mut Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }

    pub fn via_get(&mut self) -> &mut Self {
        self.via(Method::GET)
    }

    pub fn via_post(&mut self) -> &mut Self {
        self.via(Method::POST)
    }

    /// Replace the accepted methods.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoMethods`] when `methods` is empty.
    pub fn set_methods<I>(&mut self, methods: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = Method>,
    {
        let mut unique: Vec<Method> = Vec::new();
        for m in methods {
            if !unique.contains(&m) {
                unique.push(m);
            }
        }
        if unique.is_empty() {
            return Err(ConfigError::NoMethods(self.pattern.clone()));
        }
        self.methods = unique;
        Ok(self)
    }

    /// Constrain `param` to a preset.
    pub fn where_preset(&mut self, param: &str, preset: Preset) -> &mut Self {
        self.presets.insert(param.to_string(), preset);
        self.compiled.take();
        self
    }

    /// Constrain `param` to the preset called `preset`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownPreset`] for names outside the preset table.
    pub fn where_named(&mut self, param: &str, preset: &str) -> Result<&mut Self, ConfigError> {
        let preset = preset.parse::<Preset>()?;
        Ok(self.where_preset(param, preset))
    }

    /// Constrain `param` to a raw regex fragment. Overrides any preset set
    /// for the same parameter.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidCondition`] when the fragment does not compile.
    pub fn where_regex(&mut self, param: &str, fragment: &str) -> Result<&mut Self, ConfigError> {
        Regex::new(&format!("^(?:{fragment})$")).map_err(|source| ConfigError::InvalidCondition {
            param: param.to_string(),
            source,
        })?;
        self.overrides.insert(param.to_string(), fragment.to_string());
        self.compiled.take();
        Ok(self)
    }

    /// Let unconstrained parameters match any Unicode letter.
    pub fn match_unicode(&mut self) -> &mut Self {
        self.unicode = true;
        self.compiled.take();
        self
    }

    /// Append a middleware. The first one added is the outermost layer.
    pub fn add_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn add_shared_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    fn condition_for(&self, param: &str) -> &str {
        if let Some(fragment) = self.overrides.get(param) {
            return fragment;
        }
        match self.presets.get(param) {
            Some(preset) => preset.class(),
            None if self.unicode => Preset::Unicode.class(),
            None => Preset::Default.class(),
        }
    }

    /// The full anchored expression this route matches with.
    #[must_use]
    pub fn regex_source(&self) -> String {
        let mut source = String::with_capacity(self.pattern.len() * 2 + 8);
        source.push('^');
        let mut index = 0;
        for piece in pieces(&self.pattern) {
            match piece {
                Piece::Literal(text) => source.push_str(&regex::escape(text)),
                Piece::Token(name) => {
                    source.push_str("(?P<");
                    source.push_str(&group_name(index));
                    source.push('>');
                    source.push_str(self.condition_for(name));
                    source.push(')');
                    index += 1;
                }
            }
        }
        source.push_str("/?$");
        source
    }

    /// Compile (once) and return the route's expression.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidCondition`] if the assembled expression is
    /// rejected, e.g. a raw fragment reusing a group name.
    pub fn compiled(&self) -> Result<&Regex, ConfigError> {
        self.compiled.get_or_try_init(|| {
            Regex::new(&self.regex_source()).map_err(|source| ConfigError::InvalidCondition {
                param: self.pattern.clone(),
                source,
            })
        })
    }

    /// Match `uri` and `method`, returning the URL-decoded parameters in
    /// token order on success.
    #[must_use]
    pub fn match_request(&self, uri: &str, method: &Method) -> Option<Params> {
        if !self.accepts(method) {
            return None;
        }
        let regex = match self.compiled() {
            Ok(regex) => regex,
            Err(e) => {
                error!(route_pattern = %self.pattern, error = %e, "Route expression failed to compile");
                return None;
            }
        };
        let captures = regex.captures(uri.trim_start_matches('/'))?;

        let mut params = Params::new();
        for (index, name) in self.tokens.iter().enumerate() {
            let raw = captures.name(&group_name(index)).map_or("", |m| m.as_str());
            params.insert(Arc::clone(name), url_decode(raw));
        }
        debug!(route_pattern = %self.pattern, params = ?params, "Route pattern matched");
        Some(params)
    }

    #[must_use]
    pub fn matches(&self, uri: &str, method: &Method) -> bool {
        self.match_request(uri, method).is_some()
    }

    /// Run the route's middleware chain around its executable with
    /// `params` as this request's matched values.
    ///
    /// # Errors
    ///
    /// Whatever the chain returns.
    pub fn dispatch(&self, resolver: &Resolver, params: &Params) -> DispatchResult {
        run_chain(&self.middleware, resolver, &|| self.executable.execute_with(resolver, params))
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("presets", &self.presets)
            .field("overrides", &self.overrides)
            .field("unicode", &self.unicode)
            .field("executable", &self.executable)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}
