//! The message source and sink handed to the application.
//!
//! Each direction is an unbounded FIFO. The driver keeps one end of each
//! channel, the application owns the other.

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::types::{Inbound, Outbound, ScopeKind, ABNORMAL_CLOSURE};

/// Inbound message source. Owned by the application.
#[derive(Debug)]
pub struct Receiver {
    rx: mpsc::UnboundedReceiver<Inbound>,
    kind: ScopeKind,
}

impl Receiver {
    /// Wait for the next inbound message.
    ///
    /// Once the driver side is gone this yields a disconnect message
    /// instead of waiting forever.
    pub async fn receive(&mut self) -> Inbound {
        match self.rx.recv().await {
            Some(msg) => msg,
            None => match self.kind {
                ScopeKind::Http => Inbound::HttpDisconnect,
                ScopeKind::Websocket => Inbound::Disconnect {
                    code: ABNORMAL_CLOSURE,
                },
            },
        }
    }
}

/// Outbound message sink. Owned by the application, cheap to clone.
#[derive(Debug, Clone)]
pub struct Sender {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Sender {
    /// Hand one message to the driver.
    ///
    /// Fails with `Error::Disconnected` once the driver stopped listening.
    pub async fn send(&self, msg: Outbound) -> Result<()> {
        self.tx.send(msg).map_err(|_| Error::Disconnected {
            code: ABNORMAL_CLOSURE,
        })
    }
}

/// Driver end of the inbound direction plus the application's `Receiver`.
pub(crate) fn inbound(kind: ScopeKind) -> (mpsc::UnboundedSender<Inbound>, Receiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Receiver { rx, kind })
}

/// The application's `Sender` plus the driver end of the outbound direction.
pub(crate) fn outbound() -> (Sender, mpsc::UnboundedReceiver<Outbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender { tx }, rx)
}
