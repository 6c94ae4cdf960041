//! The blocking facade against the same applications as the async suites.

use std::collections::BTreeMap;

use apptest_blocking::apptest_core::{ClientConfig, Error};
use apptest_blocking::BlockingClient;
use mock_app::ws::{Echo, Greeter};
use mock_app::{app, faulty};
use serde_json::{json, Value};

// --- exchanges ---

#[test]
fn get_and_delete() {
    let client = BlockingClient::new(app()).unwrap();
    let resp = client.get("/").send().unwrap();
    assert_eq!(resp.status_code(), 200);
    assert_eq!(resp.json::<Value>().unwrap(), json!({"hello": "world"}));

    let resp = client.delete("/").send().unwrap();
    assert_eq!(resp.status_code(), 200);
}

#[test]
fn json_and_form_bodies() {
    let client = BlockingClient::new(app()).unwrap();
    let resp = client.patch("/json").json(&json!({"a": 1})).send().unwrap();
    assert_eq!(resp.json::<Value>().unwrap(), json!({"a": 1}));

    let resp = client.post("/data").form([("x", "1"), ("x", "2")]).send().unwrap();
    let pairs: Vec<(String, String)> = resp.json().unwrap();
    assert_eq!(pairs.len(), 2);
}

#[test]
fn query_and_headers_are_forwarded() {
    let client = BlockingClient::new(app()).unwrap();
    let resp = client.get("/args").query([("k", "v")]).send().unwrap();
    let args: BTreeMap<String, Vec<String>> = resp.json().unwrap();
    assert_eq!(args["k"], ["v"]);

    let resp = client.get("/headers").header("x-blocking", "yes").send().unwrap();
    let headers: Vec<(String, String)> = resp.json().unwrap();
    assert!(headers.contains(&("x-blocking".to_string(), "yes".to_string())));
}

#[test]
fn status_check_and_suppression() {
    let client = BlockingClient::new(app()).unwrap();
    let resp = client.get("/server").send().unwrap();
    assert!(matches!(resp.error_for_status(), Err(Error::Http { status: 501, .. })));

    let config = ClientConfig {
        raise_server_exceptions: false,
        ..ClientConfig::default()
    };
    let client = BlockingClient::with_config(faulty::failing(), config).unwrap();
    assert_eq!(client.get("/").send().unwrap().status_code(), 500);
}

#[test]
fn cookies_persist_across_calls() {
    let config = ClientConfig {
        cookies: true,
        ..ClientConfig::default()
    };
    let client = BlockingClient::with_config(app(), config).unwrap();
    client.get("/cookies/set").query([("session", "abc")]).send().unwrap();
    let jar: BTreeMap<String, String> = client.get("/cookies").send().unwrap().json().unwrap();
    assert_eq!(jar["session"], "abc");
}

#[test]
fn client_works_on_another_thread() {
    let status = std::thread::spawn(|| {
        let client = BlockingClient::new(app()).unwrap();
        client.get("/text").send().unwrap().status_code()
    })
    .join()
    .unwrap();
    assert_eq!(status, 200);
}

// --- scheduler guard ---

#[tokio::test]
async fn construction_inside_a_runtime_is_rejected() {
    let err = BlockingClient::new(app()).unwrap_err();
    assert!(matches!(err, Error::SchedulerBusy));
}

#[test]
fn calls_inside_a_runtime_are_rejected() {
    let client = BlockingClient::new(app()).unwrap();
    let outer = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let err = outer.block_on(async { client.get("/").send().unwrap_err() });
    assert!(matches!(err, Error::SchedulerBusy));
}

// --- sessions ---

#[test]
fn greeter_session() {
    let client = BlockingClient::new(Greeter).unwrap();
    let mut ws = client.websocket("/").subprotocols(["chat"]).connect().unwrap();
    assert_eq!(ws.subprotocol(), Some("chat"));
    assert_eq!(ws.receive_text().unwrap(), "Hello, world!");
    ws.close().unwrap();
}

#[test]
fn echo_session_round_trips() {
    let client = BlockingClient::new(Echo).unwrap();
    let mut ws = client.websocket("/").connect().unwrap();
    ws.send_text("hi").unwrap();
    assert_eq!(ws.receive_text().unwrap(), "hi");
    ws.send_bytes(&b"raw"[..]).unwrap();
    assert_eq!(ws.receive_bytes().unwrap().as_ref(), b"raw");
    ws.send_json(&json!([1, 2])).unwrap();
    assert_eq!(ws.receive_json::<Value>().unwrap(), json!([1, 2]));
    ws.close().unwrap();
}

#[test]
fn rejected_session_fails_connect() {
    let client = BlockingClient::new(Greeter).unwrap();
    let err = client.websocket("/reject").connect().unwrap_err();
    assert!(matches!(err, Error::Disconnected { code: 1008 }));
}

#[test]
fn scoped_session_closes_after_use() {
    let client = BlockingClient::new(Greeter).unwrap();
    let greeting = client.websocket("/json").session(|ws| ws.receive_json::<Value>()).unwrap();
    assert_eq!(greeting, json!({"hello": "world"}));
}

#[test]
#[should_panic(expected = "inside blocking session")]
fn scoped_session_resumes_panics() {
    let client = BlockingClient::new(Echo).unwrap();
    let _ = client.websocket("/").session(|_ws| -> apptest_blocking::apptest_core::Result<()> {
        panic!("inside blocking session")
    });
}
