use http::Method;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::RequestError;
use crate::params::{parse_query, Params};

/// Protocol reported when the environment does not name one.
pub const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

/// Environment keys that are headers despite lacking the `HTTP_` prefix.
const SPECIAL_HEADERS: [&str; 6] = [
    "CONTENT_TYPE",
    "CONTENT_LENGTH",
    "PHP_AUTH_USER",
    "PHP_AUTH_PW",
    "PHP_AUTH_DIGEST",
    "AUTH_TYPE",
];

/// The active request as seen by the dispatch core.
///
/// Only `method`, `uri` and the query bag matter to routing; headers and
/// server variables are carried for handlers. The query bag is behind a
/// lock because matched route parameters are merged into it during
/// dispatch.
pub struct Request {
    method: Method,
    uri: String,
    protocol: String,
    headers: BTreeMap<String, String>,
    server: BTreeMap<String, String>,
    query: RwLock<Params>,
}

fn normalize_uri(uri: &str) -> String {
    let path = uri.split_once('?').map_or(uri, |(path, _)| path);
    path.trim_matches('/').to_string()
}

fn parse_method(raw: &str) -> Result<Method, RequestError> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| RequestError::InvalidMethod(raw.to_string()))
}

/// Directory part of a script path, as `/` separated text.
fn script_dir(script: &str) -> &str {
    match script.rfind('/') {
        Some(0) | None => "",
        Some(idx) => &script[..idx],
    }
}

impl Request {
    /// Build a request from a method token and a URI. The URI is
    /// normalised: the query string is split off into the query bag and
    /// surrounding `/` are trimmed.
    ///
    /// # Errors
    ///
    /// [`RequestError::InvalidMethod`] for tokens `http` rejects.
    pub fn new(method: &str, uri: &str) -> Result<Self, RequestError> {
        let query = uri.split_once('?').map(|(_, q)| parse_query(q)).unwrap_or_default();
        Ok(Self {
            method: parse_method(method)?,
            uri: normalize_uri(uri),
            protocol: DEFAULT_PROTOCOL.to_string(),
            headers: BTreeMap::new(),
            server: BTreeMap::new(),
            query: RwLock::new(query),
        })
    }

    /// Build a request from CGI-style variables (`REQUEST_URI`,
    /// `REQUEST_METHOD`, `SCRIPT_NAME`, `QUERY_STRING`, `SERVER_PROTOCOL`,
    /// `HTTP_*`).
    ///
    /// The script name, or failing that its directory, is stripped from the
    /// front of the URI, then the query string and surrounding `/`.
    ///
    /// # Errors
    ///
    /// [`RequestError::Missing`] without `REQUEST_URI` or `REQUEST_METHOD`,
    /// [`RequestError::InvalidMethod`] for an unusable method token.
    pub fn from_cgi<I, K, V>(vars: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut headers = BTreeMap::new();
        let mut server = BTreeMap::new();
        for (key, value) in vars {
            let key = key.into().to_ascii_uppercase();
            let value = value.into();
            if key == "HTTP_CONTENT_TYPE" || key == "HTTP_CONTENT_LENGTH" {
                continue;
            }
            if key.starts_with("HTTP_") || SPECIAL_HEADERS.contains(&key.as_str()) {
                headers.insert(key, value);
            } else {
                server.insert(key, value);
            }
        }

        let raw_uri = server.get("REQUEST_URI").ok_or(RequestError::Missing("REQUEST_URI"))?;
        let method = parse_method(server.get("REQUEST_METHOD").ok_or(RequestError::Missing("REQUEST_METHOD"))?)?;

        let script = server.get("SCRIPT_NAME").map_or("", String::as_str);
        let mut uri = raw_uri.as_str();
        if !script.is_empty() && uri.starts_with(script) {
            uri = &uri[script.len()..];
        } else if uri.starts_with(script_dir(script)) {
            uri = &uri[script_dir(script).len()..];
        }

        let query = server
            .get("QUERY_STRING")
            .map(|q| parse_query(q))
            .unwrap_or_default();
        let uri = normalize_uri(uri);
        let protocol = server
            .get("SERVER_PROTOCOL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());

        Ok(Self {
            method,
            uri,
            protocol,
            headers,
            server,
            query: RwLock::new(query),
        })
    }

    /// Build a request from the process environment (CGI gateway).
    ///
    /// # Errors
    ///
    /// As [`Request::from_cgi`].
    pub fn from_env() -> Result<Self, RequestError> {
        Self::from_cgi(std::env::vars())
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalised URI: no query string, no surrounding `/`.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The `index`-th `/`-separated segment of the URI.
    #[must_use]
    pub fn uri_segment(&self, index: usize) -> Option<&str> {
        self.uri.split('/').nth(index)
    }

    #[must_use]
    pub fn protocol_version(&self) -> &str {
        &self.protocol
    }

    /// Header lookup. Accepts `User-Agent`, `user-agent` or `HTTP_USER_AGENT`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let key = name.replace('-', "_").to_ascii_uppercase();
        self.headers
            .get(&key)
            .or_else(|| self.headers.get(&format!("HTTP_{key}")))
            .map(String::as_str)
    }

    /// Add or replace a header. The name is stored in CGI form.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let key = name.replace('-', "_").to_ascii_uppercase();
        let key = if key.starts_with("HTTP_") || SPECIAL_HEADERS.contains(&key.as_str()) {
            key
        } else {
            format!("HTTP_{key}")
        };
        self.headers.insert(key, value.into());
        self
    }

    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Server variable lookup (non-header CGI variables).
    #[must_use]
    pub fn server(&self, name: &str) -> Option<&str> {
        self.server.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.header("HTTP_USER_AGENT")
    }

    #[must_use]
    pub fn referer(&self) -> Option<&str> {
        self.header("HTTP_REFERER")
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("CONTENT_TYPE")
    }

    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header("CONTENT_LENGTH").and_then(|v| v.trim().parse().ok())
    }

    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.header("HTTP_X_REQUESTED_WITH")
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    #[must_use]
    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    /// Snapshot of the query bag.
    #[must_use]
    pub fn query(&self) -> Params {
        self.query.read().clone()
    }

    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.read().get(name).map(str::to_string)
    }

    /// Merge `params` into the query bag; incoming keys overwrite.
    pub fn merge_query(&self, params: &Params) {
        self.query.write().merge(params);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("protocol", &self.protocol)
            .field("headers", &self.headers)
            .field("query", &*self.query.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cgi(pairs: &[(&str, &str)]) -> Result<Request, RequestError> {
        Request::from_cgi(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn requires_uri_and_method() {
        assert!(matches!(
            cgi(&[("REQUEST_METHOD", "GET")]),
            Err(RequestError::Missing("REQUEST_URI"))
        ));
        assert!(matches!(
            cgi(&[("REQUEST_URI", "/")]),
            Err(RequestError::Missing("REQUEST_METHOD"))
        ));
    }

    #[test]
    fn strips_script_name_and_query() {
        let req = cgi(&[
            ("REQUEST_URI", "/index.php/article/2024/x?page=2"),
            ("REQUEST_METHOD", "GET"),
            ("SCRIPT_NAME", "/index.php"),
            ("QUERY_STRING", "page=2"),
        ])
        .unwrap();
        assert_eq!(req.uri(), "article/2024/x");
        assert_eq!(req.query_param("page").as_deref(), Some("2"));
        assert_eq!(req.protocol_version(), DEFAULT_PROTOCOL);
    }

    #[test]
    fn strips_script_directory() {
        let req = cgi(&[
            ("REQUEST_URI", "/blog/article/5/"),
            ("REQUEST_METHOD", "post"),
            ("SCRIPT_NAME", "/blog/index.php"),
            ("SERVER_PROTOCOL", "HTTP/2.0"),
        ])
        .unwrap();
        assert_eq!(req.uri(), "article/5");
        assert!(req.is_post());
        assert_eq!(req.uri_segment(1), Some("5"));
        assert_eq!(req.uri_segment(2), None);
        assert_eq!(req.protocol_version(), "HTTP/2.0");
    }

    #[test]
    fn splits_headers_from_server_vars() {
        let req = cgi(&[
            ("REQUEST_URI", "/"),
            ("REQUEST_METHOD", "GET"),
            ("HTTP_USER_AGENT", "curl"),
            ("HTTP_X_REQUESTED_WITH", "XMLHttpRequest"),
            ("CONTENT_LENGTH", "12"),
            ("HTTP_CONTENT_LENGTH", "99"),
            ("SERVER_NAME", "localhost"),
        ])
        .unwrap();
        assert_eq!(req.user_agent(), Some("curl"));
        assert_eq!(req.header("User-Agent"), Some("curl"));
        assert!(req.is_ajax());
        assert_eq!(req.content_length(), Some(12));
        assert_eq!(req.server("SERVER_NAME"), Some("localhost"));
        assert_eq!(req.uri(), "");
    }

    #[test]
    fn merge_query_overwrites_incoming_keys() {
        let req = Request::new("GET", "/search/rust?page=1&sort=new").unwrap();
        assert_eq!(req.uri(), "search/rust");
        req.merge_query(&[("page", "3"), ("term", "rust")].into_iter().collect::<Params>());
        let q = req.query();
        assert_eq!(q.get("page"), Some("3"));
        assert_eq!(q.get("sort"), Some("new"));
        assert_eq!(q.get("term"), Some("rust"));
    }

    #[test]
    fn rejects_invalid_method_tokens() {
        assert!(matches!(
            Request::new("GE T", "/"),
            Err(RequestError::InvalidMethod(_))
        ));
    }
}
