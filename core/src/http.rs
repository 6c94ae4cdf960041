//! Request-side data types: methods, header lists, query/form parameters and
//! the plain-data `Request` handed to the exchange driver.
//!
//! # Design
//! These types describe a request as data. `TestClient::execute` turns a
//! `Request` into a connection descriptor plus one inbound message, so the
//! same value can be built once and replayed against several clients.
//!
//! Header names and values are kept as bytes (`Bytes`) because that is what
//! the application contract exchanges. Lookups accept `&str` and compare
//! names ASCII-case-insensitively.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered list of header pairs that may contain duplicate names.
///
/// `get` returns the first match; `get_all` and `iter` expose every pair in
/// the order it was received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<(Bytes, Bytes)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value stored under `name`, if it is valid UTF-8.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name.as_bytes()))
            .find_map(|(_, v)| std::str::from_utf8(v).ok())
    }

    /// Every value stored under `name`, in order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.as_bytes().to_vec();
        self.0
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(&name))
            .filter_map(|(_, v)| std::str::from_utf8(v).ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case(name.as_bytes()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(Bytes, Bytes)>> for Headers {
    fn from(pairs: Vec<(Bytes, Bytes)>) -> Self {
        Self(pairs)
    }
}

impl IntoIterator for Headers {
    type Item = (Bytes, Bytes);
    type IntoIter = std::vec::IntoIter<(Bytes, Bytes)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Caller-supplied headers in one of the accepted shapes.
///
/// `Json` exists for callers holding loosely-typed fixtures: an object maps
/// names to string values, an array holds `[name, value]` pairs. Any other
/// JSON shape is rejected with `Error::InvalidHeaders` when the request is
/// prepared.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderArg {
    Pairs(Vec<(String, String)>),
    Json(serde_json::Value),
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for HeaderArg {
    fn from(pairs: Vec<(K, V)>) -> Self {
        HeaderArg::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for HeaderArg {
    fn from(pairs: [(K, V); N]) -> Self {
        HeaderArg::Pairs(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for HeaderArg {
    fn from(map: BTreeMap<K, V>) -> Self {
        HeaderArg::Pairs(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<HashMap<K, V>> for HeaderArg {
    fn from(map: HashMap<K, V>) -> Self {
        HeaderArg::Pairs(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<serde_json::Value> for HeaderArg {
    fn from(value: serde_json::Value) -> Self {
        HeaderArg::Json(value)
    }
}

/// Ordered key/value pairs used for query strings and form bodies.
///
/// Repeated keys are kept, so `tags=a&tags=b` survives encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Add one pair per value under the same key.
    pub fn push_all<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        for value in values {
            self.0.push((key.to_string(), value.into()));
        }
    }

    pub fn extend(&mut self, other: Params) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `application/x-www-form-urlencoded` serialization (spaces become `+`).
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for Params {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for Params {
    fn from(map: BTreeMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<String>> From<HashMap<K, V>> for Params {
    fn from(map: HashMap<K, V>) -> Self {
        map.into_iter().collect()
    }
}

/// A single-shot request described as plain data.
///
/// Built by `RequestBuilder` or by hand, then passed to
/// `TestClient::execute`. `form` wins over `json` when both are set.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: HttpMethod,
    pub target: String,
    pub params: Params,
    pub headers: Vec<HeaderArg>,
    pub json: Option<serde_json::Value>,
    pub form: Option<Params>,
}

impl Request {
    pub fn new(method: HttpMethod, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            params: Params::new(),
            headers: Vec::new(),
            json: None,
            form: None,
        }
    }
}
