//! In-process test client for message-passing web applications.
//!
//! # Overview
//! Exercises an application that speaks the scope / receive / send contract
//! without a network listener. A single-shot exchange turns one request into
//! one `Response`; a streaming exchange yields a `WebSocketSession` the caller
//! drives message by message while the application runs on its own task.
//!
//! # Design
//! - The application's calling convention (unified or two-phase) is detected
//!   once, when the `TestClient` is built, and normalized to `Application`.
//! - Target, header and body preparation is pure and fails before the
//!   application is invoked.
//! - The exchange driver runs the application on the caller's task; the
//!   session driver spawns it and joins it on `close`.
//! - Applications return `anyhow::Result<()>`; the client reports everything
//!   through one `Error` enum.

pub mod app;
pub mod channel;
pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
mod exchange;
pub mod http;
mod prepare;
pub mod response;
pub mod session;
pub mod types;

pub use app::{app_fn, factory_fn, AppContract, Application, Factory, Instance, IntoContract};
pub use channel::{Receiver, Sender};
pub use client::{RequestBuilder, TestClient, WebSocketBuilder, WebSocketRequest};
pub use config::ClientConfig;
pub use cookies::CookieJar;
pub use error::{Error, Result};
pub use crate::http::{HeaderArg, Headers, HttpMethod, Params, Request};
pub use response::Response;
pub use session::WebSocketSession;
pub use types::{Inbound, Outbound, Scope, ScopeKind, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
