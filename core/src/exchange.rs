//! Single-shot exchange driver.
//!
//! # Design
//! The application future and the fold over its outbound messages run
//! concurrently on the caller's task (`tokio::join!`), so no extra task is
//! spawned and nothing outlives the call. The accumulator is owned by the fold
//! and only handed out once the exchange is over.
//!
//! The source yields the prepared body once. After the response completes it
//! yields `http.disconnect`, which lets applications that watch for a client
//! disconnect while streaming finish normally.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::FutureExt;
use tokio::sync::mpsc;

use crate::app::Application;
use crate::channel;
use crate::error::{Error, Result};
use crate::http::Headers;
use crate::response::Response;
use crate::types::{Inbound, Outbound, Scope, ScopeKind};

/// Folds `http.response.*` messages into a `Response`, enforcing ordering.
#[derive(Debug)]
pub(crate) struct ResponseAccumulator {
    url: String,
    start: Option<(u16, Headers)>,
    body: BytesMut,
    complete: bool,
}

impl ResponseAccumulator {
    pub fn new(url: String) -> Self {
        Self {
            url,
            start: None,
            body: BytesMut::new(),
            complete: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn feed(&mut self, msg: Outbound) -> Result<()> {
        match msg {
            Outbound::ResponseStart { status, headers } => {
                if self.start.is_some() {
                    return Err(Error::Protocol(
                        "received multiple \"http.response.start\" messages".into(),
                    ));
                }
                self.start = Some((status, headers));
            }
            Outbound::ResponseBody { body, more_body } => {
                if self.start.is_none() {
                    return Err(Error::Protocol(
                        "received \"http.response.body\" without \"http.response.start\"".into(),
                    ));
                }
                if self.complete {
                    return Err(Error::Protocol(
                        "received \"http.response.body\" after response completed".into(),
                    ));
                }
                self.body.extend_from_slice(&body);
                self.complete = !more_body;
            }
            other => {
                return Err(Error::Protocol(format!(
                    "unexpected {:?} message in an http exchange",
                    other.type_name()
                )));
            }
        }
        Ok(())
    }

    /// The response seen so far, or `None` if no start message arrived.
    pub fn finish(self) -> Option<Response> {
        let (status, headers) = self.start?;
        Some(Response::new(self.url, status, headers, self.body.freeze()))
    }
}

/// Run one exchange: deliver `body`, fold the outbound stream, apply the
/// server-exception policy.
pub(crate) async fn run(
    app: Arc<dyn Application>,
    scope: Scope,
    body: Bytes,
    url: String,
    raise_server_exceptions: bool,
) -> Result<Response> {
    let (in_tx, receive) = channel::inbound(ScopeKind::Http);
    let (send, out_rx) = channel::outbound();

    // The receiver is alive, so this cannot fail.
    let _ = in_tx.send(Inbound::Request {
        body,
        more_body: false,
    });

    let (app_outcome, folded) = tokio::join!(
        AssertUnwindSafe(app.call(scope, receive, send)).catch_unwind(),
        fold(out_rx, in_tx, ResponseAccumulator::new(url.clone()))
    );
    // A panic is an application error like any other: it only stays on the
    // caller's stack while server exceptions are raised.
    let app_result = match app_outcome {
        Ok(result) => result,
        Err(panic) if raise_server_exceptions => std::panic::resume_unwind(panic),
        Err(panic) => Err(anyhow::anyhow!("application panicked: {}", panic_message(&*panic))),
    };
    let acc = folded?;

    match app_result {
        Ok(()) => acc.finish().ok_or_else(|| {
            Error::Protocol("application returned without sending \"http.response.start\"".into())
        }),
        Err(err) if raise_server_exceptions => Err(Error::Application(err)),
        Err(err) => {
            tracing::warn!(url = %url, error = %err, "suppressed application error");
            Ok(acc.finish().unwrap_or_else(|| {
                Response::new(url, 500, Headers::new(), Bytes::new())
            }))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "non-string payload"
    }
}

async fn fold(
    mut out_rx: mpsc::UnboundedReceiver<Outbound>,
    in_tx: mpsc::UnboundedSender<Inbound>,
    mut acc: ResponseAccumulator,
) -> Result<ResponseAccumulator> {
    while let Some(msg) = out_rx.recv().await {
        tracing::trace!(message = msg.type_name(), "outbound");
        let was_complete = acc.is_complete();
        acc.feed(msg)?;
        if acc.is_complete() && !was_complete {
            let _ = in_tx.send(Inbound::HttpDisconnect);
        }
    }
    if acc.is_started() && !acc.is_complete() {
        tracing::debug!("application finished before completing the response body");
    }
    Ok(acc)
}
