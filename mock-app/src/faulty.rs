//! Applications that fail or break the message-ordering contract.

use apptest_core::{app_fn, Application, Headers, Inbound, Outbound, Receiver, Scope, Sender};
use bytes::Bytes;

fn start(status: u16) -> Outbound {
    Outbound::ResponseStart {
        status,
        headers: Headers::new(),
    }
}

fn body(chunk: &'static [u8], more_body: bool) -> Outbound {
    Outbound::ResponseBody {
        body: Bytes::from_static(chunk),
        more_body,
    }
}

/// Fails before sending anything.
pub fn failing() -> impl Application {
    app_fn(|_scope: Scope, _receive: Receiver, _send: Sender| async {
        Err::<(), _>(anyhow::anyhow!("application failed before responding"))
    })
}

/// Starts a 200 response, sends part of the body, then fails.
pub fn partial_then_fail() -> impl Application {
    app_fn(|_scope: Scope, _receive: Receiver, send: Sender| async move {
        send.send(start(200)).await?;
        send.send(body(b"partial", true)).await?;
        Err::<(), _>(anyhow::anyhow!("application failed mid-response"))
    })
}

async fn panic_before_start(_scope: Scope, _receive: Receiver, _send: Sender) -> anyhow::Result<()> {
    panic!("application panicked before responding")
}

/// Panics before sending anything.
pub fn panicking() -> impl Application {
    app_fn(panic_before_start)
}

pub fn double_start() -> impl Application {
    app_fn(|_scope: Scope, _receive: Receiver, send: Sender| async move {
        send.send(start(200)).await?;
        send.send(start(200)).await?;
        send.send(body(b"", false)).await?;
        anyhow::Ok(())
    })
}

pub fn body_before_start() -> impl Application {
    app_fn(|_scope: Scope, _receive: Receiver, send: Sender| async move {
        send.send(body(b"early", false)).await?;
        anyhow::Ok(())
    })
}

/// Returns without sending a response.
pub fn silent() -> impl Application {
    app_fn(|_scope: Scope, _receive: Receiver, _send: Sender| async { anyhow::Ok(()) })
}

/// Responds, then insists on seeing `http.disconnect` before returning.
pub fn waits_for_disconnect() -> impl Application {
    app_fn(|_scope: Scope, mut receive: Receiver, send: Sender| async move {
        match receive.receive().await {
            Inbound::Request { .. } => {}
            other => anyhow::bail!("expected http.request, got {}", other.type_name()),
        }
        send.send(start(204)).await?;
        send.send(body(b"", false)).await?;
        match receive.receive().await {
            Inbound::HttpDisconnect => anyhow::Ok(()),
            other => anyhow::bail!("expected http.disconnect, got {}", other.type_name()),
        }
    })
}
