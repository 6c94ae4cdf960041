//! The connection descriptor and the messages exchanged with the application.
//!
//! # Design
//! Messages are closed enums tagged with their wire-level `type` string, so
//! `serde_json::to_value(&msg)` yields the familiar
//! `{"type": "http.response.start", ...}` shape when a test wants to log or
//! fixture them. The `Scope` is built once per exchange and moved into the
//! application; the driver never holds a mutable handle to it afterwards.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::http::Headers;

/// Close code sent by the client when a session ends normally.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the peer vanished without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Exchange kind carried by a `Scope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Http,
    Websocket,
}

/// Synthetic metadata describing one simulated connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub kind: ScopeKind,
    pub http_version: String,
    pub method: String,
    pub scheme: String,
    pub path: String,
    pub raw_path: Bytes,
    pub root_path: String,
    pub query_string: Bytes,
    pub headers: Headers,
    pub client: (String, u16),
    pub server: (String, u16),
    #[serde(default)]
    pub subprotocols: Vec<String>,
}

/// A message the application pulls from its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    #[serde(rename = "http.request")]
    Request { body: Bytes, more_body: bool },

    #[serde(rename = "http.disconnect")]
    HttpDisconnect,

    #[serde(rename = "websocket.connect")]
    Connect,

    #[serde(rename = "websocket.receive")]
    Receive {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bytes: Option<Bytes>,
    },

    #[serde(rename = "websocket.disconnect")]
    Disconnect { code: u16 },
}

impl Inbound {
    pub fn type_name(&self) -> &'static str {
        match self {
            Inbound::Request { .. } => "http.request",
            Inbound::HttpDisconnect => "http.disconnect",
            Inbound::Connect => "websocket.connect",
            Inbound::Receive { .. } => "websocket.receive",
            Inbound::Disconnect { .. } => "websocket.disconnect",
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Inbound::Receive {
            text: Some(text.into()),
            bytes: None,
        }
    }

    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Inbound::Receive {
            text: None,
            bytes: Some(bytes.into()),
        }
    }
}

/// A message the application pushes into its sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename = "http.response.start")]
    ResponseStart {
        status: u16,
        #[serde(default)]
        headers: Headers,
    },

    #[serde(rename = "http.response.body")]
    ResponseBody {
        #[serde(default)]
        body: Bytes,
        #[serde(default)]
        more_body: bool,
    },

    #[serde(rename = "websocket.accept")]
    Accept {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subprotocol: Option<String>,
        #[serde(default)]
        headers: Headers,
    },

    #[serde(rename = "websocket.send")]
    Send {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bytes: Option<Bytes>,
    },

    #[serde(rename = "websocket.close")]
    Close {
        #[serde(default = "normal_closure")]
        code: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

fn normal_closure() -> u16 {
    NORMAL_CLOSURE
}

impl Outbound {
    pub fn type_name(&self) -> &'static str {
        match self {
            Outbound::ResponseStart { .. } => "http.response.start",
            Outbound::ResponseBody { .. } => "http.response.body",
            Outbound::Accept { .. } => "websocket.accept",
            Outbound::Send { .. } => "websocket.send",
            Outbound::Close { .. } => "websocket.close",
        }
    }

    pub fn accept() -> Self {
        Outbound::Accept {
            subprotocol: None,
            headers: Headers::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Send {
            text: Some(text.into()),
            bytes: None,
        }
    }

    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        Outbound::Send {
            text: None,
            bytes: Some(bytes.into()),
        }
    }

    pub fn close() -> Self {
        Outbound::Close {
            code: NORMAL_CLOSURE,
            reason: None,
        }
    }
}
