mod common;

use axum::http::{header, HeaderValue};
use axum_test::TestRequest;
use common::{harness, GOOD_TOKEN};
use serde_json::json;
use warden_providers::RegistryStore;

trait WithAuth {
    fn with_auth(self) -> Self;
}

impl WithAuth for TestRequest {
    fn with_auth(self) -> Self {
        self.add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {GOOD_TOKEN}")).unwrap(),
        )
    }
}

#[tokio::test]
async fn register_then_list_round_trip() {
    let h = harness(false);

    let response = h
        .server
        .post("/servers/register")
        .json(&json!({
            "serverID": "i-0abc",
            "serverName": "smp-main",
            "serverIP": "203.0.113.10"
        }))
        .with_auth()
        .await;
    assert_eq!(response.status_code(), 201);

    let response = h.server.get("/servers").with_auth().await;
    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body[0]["serverID"], "i-0abc");
    assert_eq!(body[0]["serverName"], "smp-main");
    assert_eq!(body[0]["serverIP"], "203.0.113.10");
    assert_eq!(body[0]["isRunning"], false);
}

#[tokio::test]
async fn start_returns_resolved_address_and_updates_registry() {
    let h = harness(false);
    h.compute.script_status(&[Some(80), Some(16)]);
    h.compute.set_address(Some("203.0.113.10"));

    let response = h
        .server
        .post("/servers/start")
        .json(&json!({"serverID": "i-0abc", "serverName": "smp-main"}))
        .with_auth()
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "server running");
    assert_eq!(body["serverIP"], "203.0.113.10");

    let record = h.registry.get("i-0abc").await.unwrap().unwrap();
    assert!(record.is_running);
}

#[tokio::test]
async fn start_on_transitional_state_is_a_conflict() {
    let h = harness(false);
    h.compute.script_status(&[Some(0)]);

    let response = h
        .server
        .post("/servers/start")
        .json(&json!({"serverID": "i-0abc", "serverName": "smp-main"}))
        .with_auth()
        .await;

    assert_eq!(response.status_code(), 409);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "invalid_state_for_transition");
    assert_eq!(h.compute.mutation_count(), 0);
}

#[tokio::test]
async fn stop_reports_stopping() {
    let h = harness(false);
    h.compute.script_status(&[Some(16)]);
    h.compute.set_address(Some("203.0.113.10"));

    let response = h
        .server
        .post("/servers/stop")
        .json(&json!({"serverID": "i-0abc", "serverName": "smp-main"}))
        .with_auth()
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "server stopping");
}

#[tokio::test]
async fn terminate_is_forbidden_unless_enabled() {
    let h = harness(false);
    h.compute.script_status(&[Some(80)]);

    let response = h
        .server
        .post("/servers/terminate")
        .json(&json!({"serverID": "i-0abc"}))
        .with_auth()
        .await;

    assert_eq!(response.status_code(), 403);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "terminate_disabled");
}

#[tokio::test]
async fn terminate_succeeds_when_enabled() {
    let h = harness(true);
    h.compute.script_status(&[Some(80)]);

    let response = h
        .server
        .post("/servers/terminate")
        .json(&json!({"serverID": "i-0abc"}))
        .with_auth()
        .await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "server terminated");
}

#[tokio::test]
async fn ping_reports_state_and_address() {
    let h = harness(false);
    h.compute.script_status(&[Some(16)]);
    h.compute.set_address(Some("203.0.113.10"));

    let response = h.server.get("/servers/i-0abc/ping").with_auth().await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "RUNNING");
    assert_eq!(body["serverIP"], "203.0.113.10");
}

#[tokio::test]
async fn ping_unknown_instance_reports_not_found_state() {
    let h = harness(false);
    h.compute.script_status(&[None]);

    let response = h.server.get("/servers/i-0missing/ping").with_auth().await;

    assert_eq!(response.status_code(), 200);
    let body: serde_json::Value = response.json();
    assert_eq!(body["state"], "NOT_FOUND");
    assert_eq!(body["serverIP"], serde_json::Value::Null);
}
