//! Serving a tower service through the message-passing contract.
//!
//! The request body is collected from `http.request` messages, the router is
//! called once with `oneshot`, and the response body is forwarded frame by
//! frame as `http.response.body` messages.

use apptest_core::{Application, Headers, Inbound, Outbound, Receiver, Scope, ScopeKind, Sender};
use axum::{body::Body, http, Router};
use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// An axum `Router` exposed as a unified-convention application.
#[derive(Clone)]
pub struct RouterApp {
    router: Router,
}

impl RouterApp {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl Application for RouterApp {
    fn call(
        &self,
        scope: Scope,
        receive: Receiver,
        send: Sender,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        let router = self.router.clone();
        Box::pin(serve(router, scope, receive, send))
    }
}

async fn serve(router: Router, scope: Scope, mut receive: Receiver, send: Sender) -> anyhow::Result<()> {
    anyhow::ensure!(
        scope.kind == ScopeKind::Http,
        "router only serves http scopes, got {:?}",
        scope.kind
    );

    let mut body = BytesMut::new();
    loop {
        match receive.receive().await {
            Inbound::Request {
                body: chunk,
                more_body,
            } => {
                body.extend_from_slice(&chunk);
                if !more_body {
                    break;
                }
            }
            Inbound::HttpDisconnect => return Ok(()),
            other => anyhow::bail!("unexpected {} message", other.type_name()),
        }
    }

    let request = to_request(&scope, body.freeze())?;
    tracing::trace!(method = %request.method(), uri = %request.uri(), "routing request");
    let response = router.oneshot(request).await?;
    let (parts, mut response_body) = response.into_parts();

    let mut headers = Headers::new();
    for (name, value) in &parts.headers {
        headers.push(name.as_str().to_string(), Bytes::copy_from_slice(value.as_bytes()));
    }
    send.send(Outbound::ResponseStart {
        status: parts.status.as_u16(),
        headers,
    })
    .await?;

    while let Some(frame) = response_body.frame().await {
        if let Ok(data) = frame?.into_data() {
            send.send(Outbound::ResponseBody {
                body: data,
                more_body: true,
            })
            .await?;
        }
    }
    send.send(Outbound::ResponseBody {
        body: Bytes::new(),
        more_body: false,
    })
    .await?;
    Ok(())
}

fn to_request(scope: &Scope, body: Bytes) -> anyhow::Result<http::Request<Body>> {
    let mut uri = String::from_utf8(scope.raw_path.to_vec())?;
    if !scope.query_string.is_empty() {
        uri.push('?');
        uri.push_str(std::str::from_utf8(&scope.query_string)?);
    }
    let mut builder = http::Request::builder().method(scope.method.as_str()).uri(uri);
    for (name, value) in scope.headers.iter() {
        builder = builder.header(name, value);
    }
    Ok(builder.body(Body::from(body))?)
}
