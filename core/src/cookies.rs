//! A minimal cookie store shared by the sequential exchanges of one client.
//!
//! Only the leading `name=value` pair of each `Set-Cookie` header is kept;
//! attributes (path, expiry, domain) are ignored.

use std::sync::Mutex;

use crate::http::Headers;

#[derive(Debug, Default)]
pub struct CookieJar {
    entries: Mutex<Vec<(String, String)>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge every `set-cookie` header in `headers` into the store.
    pub fn store_from(&self, headers: &Headers) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for raw in headers.get_all("set-cookie") {
            let Some((name, value)) = parse_set_cookie(raw) else {
                tracing::debug!(header = raw, "ignoring malformed set-cookie header");
                continue;
            };
            match entries.iter_mut().find(|(n, _)| *n == name) {
                Some(entry) => entry.1 = value,
                None => entries.push((name, value)),
            }
        }
    }

    /// The `cookie` request header value, if any cookie is stored.
    pub fn header_value(&self) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.is_empty() {
            return None;
        }
        let pairs: Vec<String> = entries.iter().map(|(n, v)| format!("{n}={v}")).collect();
        Some(pairs.join("; "))
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().trim_matches('"').to_string()))
}
