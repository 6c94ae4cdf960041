//! Streaming applications.
//!
//! `Greeter` follows the two-phase convention and picks its greeting from the
//! path. `Echo` follows the unified convention and echoes every frame back.

use apptest_core::{
    Application, Factory, Headers, Inbound, Instance, Outbound, Receiver, Scope, ScopeKind, Sender,
};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use serde_json::json;

/// Close code sent by `Greeter` on `/reject`.
pub const POLICY_VIOLATION: u16 = 1008;

/// Two-phase greeter.
///
/// | path      | behaviour                                       |
/// |-----------|-------------------------------------------------|
/// | `/`       | accept, send text `Hello, world!`               |
/// | `/bytes`  | accept, send binary `Hello, world!`             |
/// | `/json`   | accept, send `{"hello": "world"}` as text       |
/// | `/scope`  | accept, send the connection descriptor as JSON  |
/// | `/reject` | close with 1008 instead of accepting            |
///
/// After greeting it waits for the disconnect signal.
#[derive(Debug, Default)]
pub struct Greeter;

impl Factory for Greeter {
    fn instantiate(&self, scope: Scope) -> anyhow::Result<Box<dyn Instance>> {
        anyhow::ensure!(
            scope.kind == ScopeKind::Websocket,
            "greeter only serves websocket scopes"
        );
        Ok(Box::new(Greeting { scope }))
    }
}

struct Greeting {
    scope: Scope,
}

impl Instance for Greeting {
    fn run(self: Box<Self>, receive: Receiver, send: Sender) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(greet(self.scope, receive, send))
    }
}

async fn greet(scope: Scope, mut receive: Receiver, send: Sender) -> anyhow::Result<()> {
    match receive.receive().await {
        Inbound::Connect => {}
        other => anyhow::bail!("expected websocket.connect, got {}", other.type_name()),
    }

    if scope.path == "/reject" {
        send.send(Outbound::Close {
            code: POLICY_VIOLATION,
            reason: Some("rejected".into()),
        })
        .await?;
        return Ok(());
    }

    let mut headers = Headers::new();
    headers.push("x-greeter", "two-phase");
    send.send(Outbound::Accept {
        subprotocol: scope.subprotocols.first().cloned(),
        headers,
    })
    .await?;

    let greeting = match scope.path.as_str() {
        "/bytes" => Outbound::binary(Bytes::from_static(b"Hello, world!")),
        "/json" => Outbound::text(json!({"hello": "world"}).to_string()),
        "/scope" => Outbound::text(serde_json::to_string(&scope)?),
        _ => Outbound::text("Hello, world!"),
    };
    send.send(greeting).await?;

    loop {
        if let Inbound::Disconnect { .. } = receive.receive().await {
            return Ok(());
        }
    }
}

/// Unified echo application.
///
/// Text and binary frames come back unchanged; the text `close` makes it
/// close the session itself.
#[derive(Debug, Default)]
pub struct Echo;

impl Application for Echo {
    fn call(
        &self,
        _scope: Scope,
        receive: Receiver,
        send: Sender,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(echo(receive, send))
    }
}

async fn echo(mut receive: Receiver, send: Sender) -> anyhow::Result<()> {
    loop {
        match receive.receive().await {
            Inbound::Connect => send.send(Outbound::accept()).await?,
            Inbound::Receive {
                text: Some(text), ..
            } if text == "close" => {
                send.send(Outbound::close()).await?;
                return Ok(());
            }
            Inbound::Receive { text, bytes } => send.send(Outbound::Send { text, bytes }).await?,
            Inbound::Disconnect { .. } => return Ok(()),
            other => anyhow::bail!("unexpected {} message", other.type_name()),
        }
    }
}
