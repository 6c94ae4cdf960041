//! Client configuration.
//!
//! Built in code, deserialized from any serde format, or read from
//! `APPTEST_*` environment variables on top of the defaults.

use serde::{Deserialize, Serialize};

/// Base URL used when a relative target is given and none is configured.
pub const DEFAULT_BASE_URL: &str = "http://testserver";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for targets starting with `/`.
    pub base_url: String,
    /// Propagate application errors to the caller. When `false` the caller
    /// gets whatever response was assembled before the failure.
    pub raise_server_exceptions: bool,
    /// Keep cookies from `set-cookie` headers and replay them.
    pub cookies: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            raise_server_exceptions: true,
            cookies: false,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `APPTEST_BASE_URL`,
    /// `APPTEST_RAISE_SERVER_EXCEPTIONS` and `APPTEST_COOKIES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("APPTEST_BASE_URL") {
            config.base_url = url;
        }
        if let Some(flag) = lookup("APPTEST_RAISE_SERVER_EXCEPTIONS").and_then(|v| parse_flag(&v)) {
            config.raise_server_exceptions = flag;
        }
        if let Some(flag) = lookup("APPTEST_COOKIES").and_then(|v| parse_flag(&v)) {
            config.cookies = flag;
        }
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!(value = other, "ignoring unrecognized boolean flag");
            None
        }
    }
}
