//! Session driver for long-lived bidirectional exchanges.
//!
//! # Overview
//! Opening a session spawns the application as its own tokio task, wired to
//! two channels: one carrying inbound messages to the application, one
//! carrying its outbound messages back. The handshake (`websocket.connect`
//! in, acceptance out) completes before the handle is returned.
//!
//! # Design
//! The handle owns the driver end of both channels and the task's
//! `JoinHandle`. `close` sends the disconnect signal, drops the inbound end
//! and joins the task, so no application task outlives a closed session.
//! Once a close has been observed, every further receive fails immediately
//! instead of waiting on a channel that will never produce.
//!
//! There is no timeout: an application that ignores the disconnect signal
//! hangs `close`.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::Application;
use crate::channel;
use crate::error::{Error, Result};
use crate::http::Headers;
use crate::types::{Inbound, Outbound, Scope, ScopeKind, ABNORMAL_CLOSURE, NORMAL_CLOSURE};

/// Handle to an open streaming session.
#[derive(Debug)]
pub struct WebSocketSession {
    to_app: Option<mpsc::UnboundedSender<Inbound>>,
    from_app: mpsc::UnboundedReceiver<Outbound>,
    task: Option<JoinHandle<anyhow::Result<()>>>,
    subprotocol: Option<String>,
    accept_headers: Headers,
    pending: Option<Outbound>,
    close_code: Option<u16>,
    raise_server_exceptions: bool,
}

impl WebSocketSession {
    pub(crate) async fn open(
        app: Arc<dyn Application>,
        scope: Scope,
        raise_server_exceptions: bool,
    ) -> Result<Self> {
        let (to_app, receive) = channel::inbound(ScopeKind::Websocket);
        let (send, from_app) = channel::outbound();
        let path = scope.path.clone();
        let task = tokio::spawn(app.call(scope, receive, send));

        let _ = to_app.send(Inbound::Connect);
        let mut session = Self {
            to_app: Some(to_app),
            from_app,
            task: Some(task),
            subprotocol: None,
            accept_headers: Headers::new(),
            pending: None,
            close_code: None,
            raise_server_exceptions,
        };

        match session.from_app.recv().await {
            Some(Outbound::Accept {
                subprotocol,
                headers,
            }) => {
                tracing::debug!(path = %path, subprotocol = ?subprotocol, "websocket accepted");
                session.subprotocol = subprotocol;
                session.accept_headers = headers;
            }
            Some(Outbound::Close { code, reason }) => {
                tracing::debug!(path = %path, code, reason = ?reason, "websocket rejected during handshake");
                session.close_code = Some(code);
                session.join().await?;
                return Err(Error::Disconnected { code });
            }
            Some(other) => {
                tracing::warn!(
                    path = %path,
                    message = other.type_name(),
                    "first message was not an accept; treating it as an implicit accept"
                );
                session.pending = Some(other);
            }
            None => {
                tracing::debug!(path = %path, "application exited during handshake");
                session.close_code = Some(ABNORMAL_CLOSURE);
                session.join().await?;
                return Err(Error::Disconnected {
                    code: ABNORMAL_CLOSURE,
                });
            }
        }
        Ok(session)
    }

    /// Subprotocol chosen by the application in its accept message.
    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    pub fn accept_headers(&self) -> &Headers {
        &self.accept_headers
    }

    /// Close code observed from the application, if any.
    pub fn close_code(&self) -> Option<u16> {
        self.close_code
    }

    /// Queue one inbound message for the application.
    ///
    /// A message sent after the application finished is dropped, the same
    /// way a peer's late frame would be.
    pub async fn send(&self, msg: Inbound) -> Result<()> {
        let Some(to_app) = &self.to_app else {
            return Err(Error::Disconnected {
                code: self.close_code.unwrap_or(NORMAL_CLOSURE),
            });
        };
        tracing::trace!(message = msg.type_name(), "inbound");
        if to_app.send(msg).is_err() {
            tracing::debug!("application is no longer receiving; message dropped");
        }
        Ok(())
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Inbound::text(text)).await
    }

    pub async fn send_bytes(&self, bytes: impl Into<Bytes>) -> Result<()> {
        self.send(Inbound::binary(bytes)).await
    }

    /// Send `payload` JSON-encoded in a text frame.
    pub async fn send_json<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let text = serde_json::to_string(payload).map_err(|e| Error::Encode(e.to_string()))?;
        self.send_text(text).await
    }

    /// Wait for the next outbound message.
    ///
    /// A close message fails with `Disconnected` and delivers no payload, as
    /// does an application that returned without closing (code 1006).
    pub async fn receive(&mut self) -> Result<Outbound> {
        if let Some(code) = self.close_code {
            return Err(Error::Disconnected { code });
        }
        let next = match self.pending.take() {
            Some(msg) => Some(msg),
            None => self.from_app.recv().await,
        };
        match next {
            Some(Outbound::Close { code, reason }) => {
                tracing::debug!(code, reason = ?reason, "websocket closed by application");
                self.close_code = Some(code);
                Err(Error::Disconnected { code })
            }
            Some(msg) => {
                tracing::trace!(message = msg.type_name(), "outbound");
                Ok(msg)
            }
            None => {
                self.close_code = Some(ABNORMAL_CLOSURE);
                self.join().await?;
                Err(Error::Disconnected {
                    code: ABNORMAL_CLOSURE,
                })
            }
        }
    }

    pub async fn receive_text(&mut self) -> Result<String> {
        match self.receive().await? {
            Outbound::Send {
                text: Some(text), ..
            } => Ok(text),
            other => Err(unexpected_frame("text", &other)),
        }
    }

    pub async fn receive_bytes(&mut self) -> Result<Bytes> {
        match self.receive().await? {
            Outbound::Send {
                bytes: Some(bytes), ..
            } => Ok(bytes),
            other => Err(unexpected_frame("binary", &other)),
        }
    }

    /// Receive a text frame and decode it as JSON.
    pub async fn receive_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let text = self.receive_text().await?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Decode(format!("websocket frame is not valid JSON ({e}): {text}")))
    }

    /// Send the normal-closure disconnect and wait for the application task.
    ///
    /// Application errors surface here per `raise_server_exceptions`; a panic
    /// in the application resumes on the caller.
    pub async fn close(mut self) -> Result<()> {
        if let Some(to_app) = self.to_app.take() {
            let _ = to_app.send(Inbound::Disconnect {
                code: NORMAL_CLOSURE,
            });
        }
        self.join().await?;
        tracing::debug!("websocket session closed");
        Ok(())
    }

    async fn join(&mut self) -> Result<()> {
        // Dropping the inbound end wakes an application still waiting in
        // `receive` with a synthetic disconnect.
        self.to_app = None;
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) if self.raise_server_exceptions => Err(Error::Application(err)),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "suppressed application error");
                Ok(())
            }
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(join_err) => Err(Error::Application(join_err.into())),
        }
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        if let Some(to_app) = self.to_app.take() {
            tracing::debug!("websocket session dropped without close; sending disconnect");
            let _ = to_app.send(Inbound::Disconnect {
                code: NORMAL_CLOSURE,
            });
        }
        if self.task.take().is_some() {
            tracing::debug!("application task detached without being joined; its result is discarded");
        }
    }
}

fn unexpected_frame(expected: &str, got: &Outbound) -> Error {
    let got = match got {
        Outbound::Send { text: Some(_), .. } => "text frame".to_string(),
        Outbound::Send { bytes: Some(_), .. } => "binary frame".to_string(),
        Outbound::Send { .. } => "empty frame".to_string(),
        other => format!("{:?} message", other.type_name()),
    };
    Error::Protocol(format!("expected a {expected} frame, received a {got}"))
}
