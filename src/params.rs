//! Ordered parameter maps.
//!
//! Route captures, executable arguments and the request query bag all use
//! [`Params`]: a small ordered map from name to string value. Names keep the
//! position of their first insertion, so the keys extracted from a pattern
//! such as `article/:year/:slug` always come back as `year`, `slug`.

use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::DispatchError;

/// Maximum number of parameters stored inline before spilling to the heap.
/// Patterns rarely carry more than a handful of tokens.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Inline storage backing [`Params`].
///
/// Names are `Arc<str>` because they come from route patterns that live for
/// the whole process; cloning them per request is a reference count bump.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Ordered name → value map with insert-or-replace semantics.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: ParamVec,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `name`.
    ///
    /// An existing entry keeps its position and has its value replaced; a new
    /// name is appended. Returns the previous value, if any.
    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| **k == *name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k.as_ref() == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Merge `other` into `self`.
    ///
    /// Keys present in `other` overwrite the values held here (in place, so
    /// ordering is stable); keys absent from `other` are left untouched; new
    /// keys are appended in `other`'s order.
    pub fn merge(&mut self, other: &Params) {
        for (name, value) in &other.entries {
            self.insert(Arc::clone(name), value.clone());
        }
    }

    /// Parse the value stored under `name`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::MissingParam`] when absent,
    /// [`DispatchError::InvalidParam`] when `T::from_str` rejects it.
    pub fn parse<T>(&self, name: &str) -> Result<T, DispatchError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.parse_opt(name)? {
            Some(v) => Ok(v),
            None => Err(DispatchError::MissingParam {
                name: name.to_string(),
            }),
        }
    }

    /// Like [`Params::parse`] but absence is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`DispatchError::InvalidParam`] when the value is present but invalid.
    pub fn parse_opt<T>(&self, name: &str) -> Result<Option<T>, DispatchError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };
        raw.parse::<T>()
            .map(Some)
            .map_err(|e| DispatchError::InvalidParam {
                name: name.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw access to the inline storage.
    #[must_use]
    pub fn as_slice(&self) -> &[(Arc<str>, String)] {
        &self.entries
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<Arc<str>>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl<K, V> Extend<(K, V)> for Params
where
    K: Into<Arc<str>>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

/// Decode a captured path segment.
///
/// `+` is treated as a space and `%XX` escapes are decoded; byte sequences
/// that are not valid UTF-8 are replaced rather than rejected.
#[must_use]
pub fn url_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned(),
    }
}

/// Parse an `application/x-www-form-urlencoded` query string.
#[must_use]
pub fn parse_query(query: &str) -> Params {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}
