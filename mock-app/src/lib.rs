//! Applications under test for the client's test suites.
//!
//! `router()` is a plain axum `Router`; `app()` wraps it in `RouterApp` so it
//! speaks the message-passing contract. `ws` holds streaming applications in
//! both calling conventions and `faulty` holds applications that break the
//! contract on purpose.

pub mod bridge;
pub mod faulty;
pub mod ws;

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    body::Body,
    extract::Query,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};

pub use bridge::RouterApp;

/// Number of chunks produced by `/stream`.
pub const STREAM_CHUNKS: usize = 10;

pub fn router() -> Router {
    Router::new()
        .route("/", get(hello).delete(hello))
        .route("/text", get(text))
        .route("/headers", get(headers))
        .route("/args", get(args))
        .route("/json", post(echo_json).put(echo_json).patch(echo_json))
        .route("/data", post(echo_form))
        .route("/stream", get(stream))
        .route("/server", get(not_implemented))
        .route("/cookies", get(cookies))
        .route("/cookies/set", get(set_cookies))
}

/// The router behind the message-passing contract.
pub fn app() -> RouterApp {
    RouterApp::new(router())
}

async fn hello() -> Json<Value> {
    Json(json!({"hello": "world"}))
}

async fn text() -> &'static str {
    "Hello, world!"
}

/// Request headers as an ordered list of `[name, value]` pairs.
async fn headers(headers: HeaderMap) -> Json<Vec<(String, String)>> {
    let pairs = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(pairs)
}

/// Query parameters grouped by key, repeated keys kept in order.
async fn args(Query(pairs): Query<Vec<(String, String)>>) -> Json<BTreeMap<String, Vec<String>>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in pairs {
        grouped.entry(key).or_default().push(value);
    }
    Json(grouped)
}

async fn echo_json(Json(payload): Json<Value>) -> Json<Value> {
    Json(payload)
}

async fn echo_form(Form(pairs): Form<Vec<(String, String)>>) -> Json<Vec<(String, String)>> {
    Json(pairs)
}

async fn stream() -> Response {
    let chunks = (0..STREAM_CHUNKS).map(|_| Ok::<_, Infallible>(Bytes::from_static(b"=")));
    let body = Body::from_stream(futures_util::stream::iter(chunks));
    ([(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

async fn not_implemented() -> (StatusCode, &'static str) {
    (StatusCode::NOT_IMPLEMENTED, "not implemented")
}

/// Cookies sent by the client, as a JSON object.
async fn cookies(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    let jar = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    Json(jar)
}

/// Sets one cookie per query parameter.
async fn set_cookies(Query(pairs): Query<Vec<(String, String)>>) -> Response {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match HeaderValue::from_str(&format!("{name}={value}; Path=/")) {
            Ok(cookie) => {
                headers.append(header::SET_COOKIE, cookie);
            }
            Err(_) => return (StatusCode::BAD_REQUEST, "invalid cookie").into_response(),
        }
    }
    (headers, Json(json!({"set": true}))).into_response()
}

