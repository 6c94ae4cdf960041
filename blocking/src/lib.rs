//! Blocking facade over `apptest-core`.
//!
//! # Overview
//! Same exchanges and sessions as `TestClient`, callable from plain
//! synchronous tests. Each `BlockingClient` owns a current-thread tokio
//! runtime and drives every call to completion with `block_on`.
//!
//! # Design
//! - A runtime cannot be entered from a thread that is already running one,
//!   so construction and every call check the thread first and fail with
//!   `Error::SchedulerBusy` instead of panicking inside tokio.
//! - Session application tasks live on the client's runtime and only make
//!   progress while a call on that client is blocking. `close` joins them.
//! - Builders wrap the async builders one-to-one; there is no second
//!   implementation of request preparation.

use std::future::Future;

use apptest_core::{
    ClientConfig, CookieJar, Error, HeaderArg, Headers, HttpMethod, Inbound, IntoContract, Outbound, Params,
    Request, RequestBuilder, Response, Result, TestClient, WebSocketBuilder, WebSocketSession,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use apptest_core;

/// Fail with `SchedulerBusy` if a tokio runtime is active on this thread.
fn ensure_idle() -> Result<()> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::SchedulerBusy);
    }
    Ok(())
}

/// Synchronous test client with its own current-thread runtime.
pub struct BlockingClient {
    runtime: tokio::runtime::Runtime,
    inner: TestClient,
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient").field("inner", &self.inner).finish()
    }
}

impl BlockingClient {
    pub fn new<A, M>(app: A) -> Result<Self>
    where
        A: IntoContract<M>,
    {
        Self::with_config(app, ClientConfig::default())
    }

    pub fn with_config<A, M>(app: A, config: ClientConfig) -> Result<Self>
    where
        A: IntoContract<M>,
    {
        ensure_idle()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(Error::Runtime)?;
        tracing::debug!("blocking client runtime started");
        Ok(Self {
            runtime,
            inner: TestClient::with_config(app, config),
        })
    }

    fn run<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        ensure_idle()?;
        self.runtime.block_on(fut)
    }

    pub fn config(&self) -> &ClientConfig {
        self.inner.config()
    }

    pub fn cookies(&self) -> Option<&CookieJar> {
        self.inner.cookies()
    }

    pub fn execute(&self, request: Request) -> Result<Response> {
        self.run(self.inner.execute(request))
    }

    pub fn request(&self, method: HttpMethod, target: &str) -> BlockingRequestBuilder<'_> {
        BlockingRequestBuilder {
            client: self,
            inner: self.inner.request(method, target),
        }
    }

    pub fn get(&self, target: &str) -> BlockingRequestBuilder<'_> {
        self.request(HttpMethod::Get, target)
    }

    pub fn post(&self, target: &str) -> BlockingRequestBuilder<'_> {
        self.request(HttpMethod::Post, target)
    }

    pub fn put(&self, target: &str) -> BlockingRequestBuilder<'_> {
        self.request(HttpMethod::Put, target)
    }

    pub fn patch(&self, target: &str) -> BlockingRequestBuilder<'_> {
        self.request(HttpMethod::Patch, target)
    }

    pub fn delete(&self, target: &str) -> BlockingRequestBuilder<'_> {
        self.request(HttpMethod::Delete, target)
    }

    pub fn head(&self, target: &str) -> BlockingRequestBuilder<'_> {
        self.request(HttpMethod::Head, target)
    }

    pub fn options(&self, target: &str) -> BlockingRequestBuilder<'_> {
        self.request(HttpMethod::Options, target)
    }

    pub fn websocket(&self, target: &str) -> BlockingWebSocketBuilder<'_> {
        BlockingWebSocketBuilder {
            client: self,
            inner: self.inner.websocket(target),
        }
    }
}

#[must_use = "a request does nothing until `send` is called"]
pub struct BlockingRequestBuilder<'a> {
    client: &'a BlockingClient,
    inner: RequestBuilder<'a>,
}

impl<'a> BlockingRequestBuilder<'a> {
    pub fn query(mut self, params: impl Into<Params>) -> Self {
        self.inner = self.inner.query(params);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    pub fn headers(mut self, headers: impl Into<HeaderArg>) -> Self {
        self.inner = self.inner.headers(headers);
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Self {
        self.inner = self.inner.json(payload);
        self
    }

    pub fn form(mut self, form: impl Into<Params>) -> Self {
        self.inner = self.inner.form(form);
        self
    }

    pub fn send(self) -> Result<Response> {
        self.client.run(self.inner.send())
    }
}

#[must_use = "a session is not opened until `connect` or `session` is called"]
pub struct BlockingWebSocketBuilder<'a> {
    client: &'a BlockingClient,
    inner: WebSocketBuilder<'a>,
}

impl<'a> BlockingWebSocketBuilder<'a> {
    pub fn subprotocols<I, S>(mut self, subprotocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner = self.inner.subprotocols(subprotocols);
        self
    }

    pub fn query(mut self, params: impl Into<Params>) -> Self {
        self.inner = self.inner.query(params);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.inner = self.inner.header(name, value);
        self
    }

    pub fn headers(mut self, headers: impl Into<HeaderArg>) -> Self {
        self.inner = self.inner.headers(headers);
        self
    }

    pub fn connect(self) -> Result<BlockingWebSocket<'a>> {
        let session = self.client.run(self.inner.connect())?;
        Ok(BlockingWebSocket {
            client: self.client,
            session,
        })
    }

    /// Open a session, run `f` with it and close it on every exit path.
    ///
    /// A panic inside `f` closes the session first, then resumes.
    pub fn session<T>(self, f: impl FnOnce(&mut BlockingWebSocket<'a>) -> Result<T>) -> Result<T> {
        let mut ws = self.connect()?;
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&mut ws)));
        let closed = ws.close();
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

/// A session driven on the owning client's runtime.
#[derive(Debug)]
pub struct BlockingWebSocket<'a> {
    client: &'a BlockingClient,
    session: WebSocketSession,
}

impl BlockingWebSocket<'_> {
    pub fn subprotocol(&self) -> Option<&str> {
        self.session.subprotocol()
    }

    pub fn accept_headers(&self) -> &Headers {
        self.session.accept_headers()
    }

    pub fn close_code(&self) -> Option<u16> {
        self.session.close_code()
    }

    pub fn send(&self, msg: Inbound) -> Result<()> {
        self.client.run(self.session.send(msg))
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.client.run(self.session.send_text(text))
    }

    pub fn send_bytes(&self, bytes: impl Into<Bytes>) -> Result<()> {
        self.client.run(self.session.send_bytes(bytes))
    }

    pub fn send_json<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        self.client.run(self.session.send_json(payload))
    }

    pub fn receive(&mut self) -> Result<Outbound> {
        self.client.run(self.session.receive())
    }

    pub fn receive_text(&mut self) -> Result<String> {
        self.client.run(self.session.receive_text())
    }

    pub fn receive_bytes(&mut self) -> Result<Bytes> {
        self.client.run(self.session.receive_bytes())
    }

    pub fn receive_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.client.run(self.session.receive_json())
    }

    /// Send the disconnect signal and wait for the application to finish.
    pub fn close(self) -> Result<()> {
        self.client.run(self.session.close())
    }
}
