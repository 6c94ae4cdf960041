//! Single-shot exchanges against the bridged axum router and the faulty apps.
//!
//! # Design
//! Every test drives a real application through `TestClient`, so request
//! preparation, the contract adapter, the exchange driver and the response
//! object are exercised together. Set `RUST_LOG=apptest_core=trace` to see the
//! message flow.

use std::collections::{BTreeMap, HashMap};

use apptest_core::{ClientConfig, Error, HttpMethod, Request, TestClient};
use mock_app::{app, faulty, STREAM_CHUNKS};
use serde_json::{json, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client() -> TestClient {
    init_tracing();
    TestClient::new(app())
}

fn suppressing<A: apptest_core::Application>(app: A) -> TestClient {
    init_tracing();
    let config = ClientConfig {
        raise_server_exceptions: false,
        ..ClientConfig::default()
    };
    TestClient::with_config(app, config)
}

// ---------------------------------------------------------------------------
// Verbs and bodies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_root() {
    let resp = client().get("/").send().await.unwrap();
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.reason(), "OK");
    assert_eq!(resp.url(), "http://testserver/");
    assert_eq!(resp.json::<Value>().unwrap(), json!({"hello": "world"}));
}

#[tokio::test]
async fn delete_root() {
    let resp = client().delete("/").send().await.unwrap();
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.json::<Value>().unwrap(), json!({"hello": "world"}));
}

#[tokio::test]
async fn text_body() {
    let resp = client().get("/text").send().await.unwrap();
    assert_eq!(resp.text(), "Hello, world!");
    assert_eq!(resp.content().as_ref(), b"Hello, world!");
}

#[tokio::test]
async fn streamed_body_is_reassembled() {
    let resp = client().get("/stream").send().await.unwrap();
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.text(), "=".repeat(STREAM_CHUNKS));
}

#[tokio::test]
async fn query_params_are_merged_with_literal_query() {
    let resp = client()
        .get("/args?a=1")
        .query([("list", "x"), ("list", "y"), ("space", "a b")])
        .send()
        .await
        .unwrap();
    let args: BTreeMap<String, Vec<String>> = resp.json().unwrap();
    assert_eq!(args["a"], ["1"]);
    assert_eq!(args["list"], ["x", "y"]);
    assert_eq!(args["space"], ["a b"]);
}

#[tokio::test]
async fn json_payload_for_post_put_patch() {
    let client = client();
    let payload = json!({"name": "apptest", "tags": ["a", "b"], "n": 3});
    for method in [HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch] {
        let resp = client.request(method, "/json").json(&payload).send().await.unwrap();
        assert_eq!(resp.status_code(), 200, "{method}");
        assert_eq!(resp.json::<Value>().unwrap(), payload, "{method}");
    }
}

#[tokio::test]
async fn form_payload_keeps_repeated_keys() {
    let resp = client()
        .post("/data")
        .form([("k", "1"), ("k", "2"), ("other", "x y")])
        .send()
        .await
        .unwrap();
    let pairs: Vec<(String, String)> = resp.json().unwrap();
    let pairs: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    assert_eq!(pairs, [("k", "1"), ("k", "2"), ("other", "x y")]);
}

#[tokio::test]
async fn execute_takes_a_plain_request() {
    let mut request = Request::new(HttpMethod::Post, "/json");
    request.json = Some(json!([1, 2, 3]));
    let resp = client().execute(request).await.unwrap();
    assert_eq!(resp.json::<Value>().unwrap(), json!([1, 2, 3]));
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

async fn echoed_headers(builder: apptest_core::RequestBuilder<'_>) -> Vec<(String, String)> {
    builder.send().await.unwrap().json().unwrap()
}

#[tokio::test]
async fn default_headers_are_sent() {
    let client = client();
    let headers = echoed_headers(client.get("/headers")).await;
    let names: Vec<&str> = headers.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names[0], "host");
    let map: HashMap<&str, &str> = headers.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect();
    assert_eq!(map["host"], "testserver");
    assert_eq!(map["user-agent"], "testclient");
    assert_eq!(map["accept"], "*/*");
    assert_eq!(map["accept-encoding"], "gzip, deflate");
    assert_eq!(map["connection"], "keep-alive");
    assert_eq!(map["content-length"], "0");
}

#[tokio::test]
async fn caller_headers_in_pairs_and_json_shapes() {
    let client = client();
    let headers = echoed_headers(
        client
            .get("/headers")
            .header("X-Pair", "1")
            .headers(json!({"x-object": "2"}))
            .headers(json!([["x-array", "3"]])),
    )
    .await;
    let map: HashMap<&str, &str> = headers.iter().map(|(n, v)| (n.as_str(), v.as_str())).collect();
    assert_eq!(map["x-pair"], "1");
    assert_eq!(map["x-object"], "2");
    assert_eq!(map["x-array"], "3");
}

#[tokio::test]
async fn invalid_header_shape_is_rejected() {
    let err = client().get("/headers").headers(json!("nope")).send().await.unwrap_err();
    assert!(matches!(err, Error::InvalidHeaders(_)), "{err}");
}

#[tokio::test]
async fn illegal_header_value_is_rejected() {
    let err = client()
        .get("/headers")
        .header("x-bad", "line\nbreak")
        .send()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidHeaders(_)), "{err}");
}

#[tokio::test]
async fn absolute_target_sets_host_header() {
    let client = client();
    let headers = echoed_headers(client.get("https://example.org:8443/headers")).await;
    assert_eq!(headers[0], ("host".to_string(), "example.org".to_string()));
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn target_without_scheme_is_rejected() {
    let err = client().get("testserver/").send().await.unwrap_err();
    assert!(matches!(err, Error::InvalidTarget { .. }), "{err}");
}

#[tokio::test]
async fn target_without_host_is_rejected() {
    let err = client().get("http:///path").send().await.unwrap_err();
    assert!(matches!(err, Error::InvalidTarget { .. }), "{err}");
}

#[tokio::test]
async fn configured_base_url_is_used_for_relative_targets() {
    let config = ClientConfig {
        base_url: "https://api.internal".into(),
        ..ClientConfig::default()
    };
    let client = TestClient::with_config(app(), config);
    let resp = client.get("/text").send().await.unwrap();
    assert_eq!(resp.url(), "https://api.internal/text");
}

// ---------------------------------------------------------------------------
// Status checks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ok_and_error_for_status() {
    let client = client();
    let resp = client.get("/").send().await.unwrap();
    assert!(resp.ok());
    resp.error_for_status().unwrap();
    assert_eq!(resp.to_string(), "<Response [200]>");

    let resp = client.get("/server").send().await.unwrap();
    assert!(!resp.ok());
    let err = resp.error_for_status().unwrap_err();
    assert!(matches!(err, Error::Http { status: 501, .. }));
    assert_eq!(
        err.to_string(),
        "501 Server Error: Not Implemented for url: http://testserver/server"
    );
}

// ---------------------------------------------------------------------------
// Cookies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cookies_are_stored_and_replayed() {
    init_tracing();
    let config = ClientConfig {
        cookies: true,
        ..ClientConfig::default()
    };
    let client = TestClient::with_config(app(), config);
    client.get("/cookies/set").query([("a", "1"), ("b", "2")]).send().await.unwrap();
    assert_eq!(client.cookies().unwrap().get("a").as_deref(), Some("1"));

    let resp = client.get("/cookies").send().await.unwrap();
    let jar: BTreeMap<String, String> = resp.json().unwrap();
    assert_eq!(jar.get("a").map(String::as_str), Some("1"));
    assert_eq!(jar.get("b").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn cookies_are_ignored_when_disabled() {
    let client = client();
    client.get("/cookies/set").query([("a", "1")]).send().await.unwrap();
    assert!(client.cookies().is_none());
    let jar: BTreeMap<String, String> = client.get("/cookies").send().await.unwrap().json().unwrap();
    assert!(jar.is_empty());
}

// ---------------------------------------------------------------------------
// Application errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn application_error_is_raised_by_default() {
    init_tracing();
    let client = TestClient::new(faulty::failing());
    let err = client.get("/").send().await.unwrap_err();
    assert!(matches!(err, Error::Application(_)), "{err}");
}

#[tokio::test]
async fn suppressed_error_before_start_yields_500() {
    let client = suppressing(faulty::failing());
    let resp = client.get("/").send().await.unwrap();
    assert_eq!(resp.status_code(), 500);
    assert!(resp.content().is_empty());
}

#[tokio::test]
async fn suppressed_error_after_start_yields_partial_response() {
    let client = suppressing(faulty::partial_then_fail());
    let resp = client.get("/").send().await.unwrap();
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.text(), "partial");
}

#[tokio::test]
#[should_panic(expected = "application panicked before responding")]
async fn application_panic_unwinds_by_default() {
    init_tracing();
    let _ = TestClient::new(faulty::panicking()).get("/").send().await;
}

#[tokio::test]
async fn suppressed_panic_yields_500() {
    let client = suppressing(faulty::panicking());
    let resp = client.get("/").send().await.unwrap();
    assert_eq!(resp.status_code(), 500);
    assert!(resp.content().is_empty());
}

// ---------------------------------------------------------------------------
// Protocol violations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn double_start_is_a_protocol_error_even_when_suppressing() {
    let err = suppressing(faulty::double_start()).get("/").send().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "{err}");
}

#[tokio::test]
async fn body_before_start_is_a_protocol_error() {
    let err = client_for(faulty::body_before_start()).get("/").send().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "{err}");
}

#[tokio::test]
async fn silent_application_is_a_protocol_error() {
    let err = client_for(faulty::silent()).get("/").send().await.unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "{err}");
}

#[tokio::test]
async fn disconnect_is_delivered_after_the_response() {
    let resp = client_for(faulty::waits_for_disconnect()).get("/").send().await.unwrap();
    assert_eq!(resp.status_code(), 204);
}

fn client_for<A: apptest_core::Application>(app: A) -> TestClient {
    init_tracing();
    TestClient::new(app)
}
