//! The response object assembled from an application's outbound messages.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::http::Headers;

/// A completed single-shot exchange.
///
/// Read-only once returned: `ok` and `error_for_status` can be called any
/// number of times with the same outcome.
#[derive(Debug, Clone)]
pub struct Response {
    url: String,
    status: u16,
    headers: Headers,
    content: Bytes,
}

impl Response {
    pub(crate) fn new(url: String, status: u16, headers: Headers, content: Bytes) -> Self {
        Self {
            url,
            status,
            headers,
            content,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// Standard reason phrase, empty for unregistered codes.
    pub fn reason(&self) -> &'static str {
        http::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("")
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Body as text. Invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.content).map_err(|e| {
            Error::Decode(format!(
                "response content is not valid JSON ({e}): {}",
                self.text()
            ))
        })
    }

    /// Fail with `Error::Http` for 4xx and 5xx statuses.
    pub fn error_for_status(&self) -> Result<()> {
        let kind = match self.status {
            400..=499 => "Client",
            500..=599 => "Server",
            _ => return Ok(()),
        };
        Err(Error::Http {
            status: self.status,
            message: format!(
                "{} {kind} Error: {} for url: {}",
                self.status,
                self.reason(),
                self.url
            ),
        })
    }

    /// `true` unless the status is a client or server error.
    ///
    /// This is not a check for `200 OK`.
    pub fn ok(&self) -> bool {
        self.error_for_status().is_ok()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Response [{}]>", self.status)
    }
}
