//! The asynchronous test client.
//!
//! # Design
//! `TestClient` holds the normalized application, its configuration and an
//! optional cookie store. Each call prepares a connection descriptor from the
//! target and headers, then hands it to the exchange or session driver.
//! Preparation errors surface before the application is touched.
//!
//! Cookies are shared mutable state across the sequential exchanges of one
//! client; concurrent exchanges on a single client are not supported.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;

use crate::app::{AppContract, Application, IntoContract};
use crate::config::ClientConfig;
use crate::cookies::CookieJar;
use crate::error::{Error, Result};
use crate::exchange;
use crate::http::{HeaderArg, Headers, HttpMethod, Params, Request};
use crate::prepare::{self, Target};
use crate::response::Response;
use crate::session::WebSocketSession;
use crate::types::{Scope, ScopeKind};

/// Client for exercising an application in-process.
#[derive(Clone)]
pub struct TestClient {
    app: Arc<dyn Application>,
    config: ClientConfig,
    cookies: Option<Arc<CookieJar>>,
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TestClient {
    pub fn new<A, M>(app: A) -> Self
    where
        A: IntoContract<M>,
    {
        Self::with_config(app, ClientConfig::default())
    }

    pub fn with_config<A, M>(app: A, config: ClientConfig) -> Self
    where
        A: IntoContract<M>,
    {
        let contract = AppContract::detect(app);
        tracing::debug!(contract = contract.name(), base_url = %config.base_url, "test client created");
        let cookies = config.cookies.then(|| Arc::new(CookieJar::new()));
        Self {
            app: contract.into_application(),
            config,
            cookies,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The cookie store, when enabled in the configuration.
    pub fn cookies(&self) -> Option<&CookieJar> {
        self.cookies.as_deref()
    }

    pub fn request(&self, method: HttpMethod, target: &str) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            request: Request::new(method, target),
            error: None,
        }
    }

    pub fn get(&self, target: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Get, target)
    }

    pub fn post(&self, target: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Post, target)
    }

    pub fn put(&self, target: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Put, target)
    }

    pub fn patch(&self, target: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Patch, target)
    }

    pub fn delete(&self, target: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Delete, target)
    }

    pub fn head(&self, target: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Head, target)
    }

    pub fn options(&self, target: &str) -> RequestBuilder<'_> {
        self.request(HttpMethod::Options, target)
    }

    /// Run one single-shot exchange.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let target = prepare::resolve_target(&self.config.base_url, &request.target, &request.params)?;
        let cookie = self.cookies.as_ref().and_then(|jar| jar.header_value());
        let mut headers = prepare::prepare_headers(&target.host, &request.headers, cookie)?;
        let body = prepare::prepare_body(&mut headers, request.json.as_ref(), request.form.as_ref())?;

        let url = target.url();
        tracing::debug!(method = %request.method, url = %url, body_len = body.len(), "executing request");
        let scope = build_scope(ScopeKind::Http, request.method.as_str(), target, headers, Vec::new());

        let response = exchange::run(
            Arc::clone(&self.app),
            scope,
            body,
            url,
            self.config.raise_server_exceptions,
        )
        .await?;

        if let Some(jar) = &self.cookies {
            jar.store_from(response.headers());
        }
        tracing::debug!(status = response.status_code(), "request completed");
        Ok(response)
    }

    pub fn websocket(&self, target: &str) -> WebSocketBuilder<'_> {
        WebSocketBuilder {
            client: self,
            request: WebSocketRequest::new(target),
        }
    }

    /// Open a session; returns once the application accepted the connection.
    pub async fn open(&self, request: WebSocketRequest) -> Result<WebSocketSession> {
        let target = prepare::resolve_target(&self.config.base_url, &request.target, &request.params)?;
        let cookie = self.cookies.as_ref().and_then(|jar| jar.header_value());
        let headers = prepare::prepare_headers(&target.host, &request.headers, cookie)?;
        tracing::debug!(url = %target.url(), subprotocols = ?request.subprotocols, "opening websocket session");
        let scope = build_scope(ScopeKind::Websocket, "GET", target, headers, request.subprotocols);
        WebSocketSession::open(Arc::clone(&self.app), scope, self.config.raise_server_exceptions).await
    }
}

fn build_scope(
    kind: ScopeKind,
    method: &str,
    target: Target,
    headers: Headers,
    subprotocols: Vec<String>,
) -> Scope {
    let scheme = match (kind, target.scheme.as_str()) {
        (ScopeKind::Websocket, "http") => "ws".to_string(),
        (ScopeKind::Websocket, "https") => "wss".to_string(),
        (_, scheme) => scheme.to_string(),
    };
    Scope {
        kind,
        http_version: "1.1".to_string(),
        method: method.to_string(),
        scheme,
        raw_path: Bytes::from(target.path.clone()),
        path: target.path,
        root_path: String::new(),
        query_string: Bytes::from(target.query),
        headers,
        client: ("testclient".to_string(), 5000),
        server: (target.host, target.port),
        subprotocols,
    }
}

/// Builder for a single-shot request, finished with `send`.
#[must_use = "a request does nothing until `send` is awaited"]
pub struct RequestBuilder<'a> {
    client: &'a TestClient,
    request: Request,
    error: Option<Error>,
}

impl<'a> RequestBuilder<'a> {
    /// Append query parameters after any query already in the target.
    pub fn query(mut self, params: impl Into<Params>) -> Self {
        self.request.params.extend(params.into());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.request.headers.push(HeaderArg::from([(name, value)]));
        self
    }

    pub fn headers(mut self, headers: impl Into<HeaderArg>) -> Self {
        self.request.headers.push(headers.into());
        self
    }

    /// JSON body. Ignored when a non-empty form is also given.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => self.request.json = Some(value),
            Err(e) => self.error = Some(Error::Encode(e.to_string())),
        }
        self
    }

    /// Url-encoded form body.
    pub fn form(mut self, form: impl Into<Params>) -> Self {
        self.request.form = Some(form.into());
        self
    }

    pub fn build(self) -> Result<Request> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.request),
        }
    }

    pub async fn send(self) -> Result<Response> {
        let client = self.client;
        client.execute(self.build()?).await
    }
}

/// A session request described as plain data.
#[derive(Debug, Clone)]
pub struct WebSocketRequest {
    pub target: String,
    pub subprotocols: Vec<String>,
    pub params: Params,
    pub headers: Vec<HeaderArg>,
}

impl WebSocketRequest {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            subprotocols: Vec::new(),
            params: Params::new(),
            headers: Vec::new(),
        }
    }
}

/// Builder for a session, finished with `connect` or `session`.
#[must_use = "a session is not opened until `connect` or `session` is awaited"]
pub struct WebSocketBuilder<'a> {
    client: &'a TestClient,
    request: WebSocketRequest,
}

impl<'a> WebSocketBuilder<'a> {
    pub fn subprotocols<I, S>(mut self, subprotocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.subprotocols = subprotocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn query(mut self, params: impl Into<Params>) -> Self {
        self.request.params.extend(params.into());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.request.headers.push(HeaderArg::from([(name, value)]));
        self
    }

    pub fn headers(mut self, headers: impl Into<HeaderArg>) -> Self {
        self.request.headers.push(headers.into());
        self
    }

    pub fn build(self) -> WebSocketRequest {
        self.request
    }

    pub async fn connect(self) -> Result<WebSocketSession> {
        self.client.open(self.request).await
    }

    /// Open a session, run `f` with it, and close it on every exit path.
    ///
    /// A panic inside `f` still closes the session before it resumes. If the
    /// returned future is dropped mid-way, the session's `Drop` sends the
    /// disconnect signal without waiting for the application.
    pub async fn session<T, F>(self, f: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut WebSocketSession) -> BoxFuture<'s, Result<T>>,
    {
        let mut session = self.connect().await?;
        let outcome = std::panic::AssertUnwindSafe(f(&mut session)).catch_unwind().await;
        let closed = session.close().await;
        match outcome {
            Ok(Ok(value)) => closed.map(|()| value),
            Ok(Err(err)) => {
                if let Err(close_err) = closed {
                    tracing::debug!(error = %close_err, "error while closing after a failed session");
                }
                Err(err)
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::app_fn;
    use crate::channel::{Receiver, Sender};
    use crate::types::{Inbound, Outbound};

    /// Replies with the scope it was given, as JSON.
    fn echo_scope() -> TestClient {
        TestClient::new(app_fn(|scope: Scope, mut receive: Receiver, send: Sender| async move {
            let body = match receive.receive().await {
                Inbound::Request { body, .. } => body,
                other => anyhow::bail!("unexpected {}", other.type_name()),
            };
            let mut reply = serde_json::to_value(&scope)?;
            reply["body"] = serde_json::Value::String(String::from_utf8_lossy(&body).into_owned());
            send.send(Outbound::ResponseStart {
                status: 200,
                headers: Headers::new(),
            })
            .await?;
            send.send(Outbound::ResponseBody {
                body: Bytes::from(serde_json::to_vec(&reply)?),
                more_body: false,
            })
            .await?;
            anyhow::Ok(())
        }))
    }

    #[tokio::test]
    async fn scope_carries_method_path_query_and_server() {
        let client = echo_scope();
        let resp = client
            .get("http://example.com:8080/items?a=1")
            .query([("b", "2")])
            .send()
            .await
            .unwrap();
        let scope: serde_json::Value = resp.json().unwrap();
        assert_eq!(scope["type"], "http");
        assert_eq!(scope["method"], "GET");
        assert_eq!(scope["path"], "/items");
        assert_eq!(scope["scheme"], "http");
        assert_eq!(scope["server"], serde_json::json!(["example.com", 8080]));
        assert_eq!(scope["client"], serde_json::json!(["testclient", 5000]));
        let query: Vec<u8> = serde_json::from_value(scope["query_string"].clone()).unwrap();
        assert_eq!(query, b"a=1&b=2");
    }

    #[tokio::test]
    async fn form_is_preferred_over_json() {
        let client = echo_scope();
        let resp = client
            .post("/")
            .json(&serde_json::json!({"ignored": true}))
            .form([("kept", "yes")])
            .send()
            .await
            .unwrap();
        let scope: serde_json::Value = resp.json().unwrap();
        assert_eq!(scope["body"], "kept=yes");
    }

    #[tokio::test]
    async fn invalid_target_never_reaches_the_application() {
        let client = TestClient::new(app_fn(|_: Scope, _: Receiver, _: Sender| async {
            Err::<(), _>(anyhow::anyhow!("must not run"))
        }));
        let err = client.get("noscheme/").send().await.unwrap_err();
        assert!(matches!(err, Error::InvalidTarget { .. }));
    }

    #[test]
    fn websocket_scope_uses_websocket_scheme() {
        let target = prepare::resolve_target("https://secure", "/ws", &Params::new()).unwrap();
        let scope = build_scope(ScopeKind::Websocket, "GET", target, Headers::new(), vec!["chat".into()]);
        assert_eq!(scope.scheme, "wss");
        assert_eq!(scope.subprotocols, vec!["chat".to_string()]);
        assert_eq!(scope.server, ("secure".to_string(), 443));
    }
}
