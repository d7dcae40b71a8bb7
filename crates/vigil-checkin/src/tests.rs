//! Router tests: admin API and device check-in against an in-memory store.

use std::{path::PathBuf, sync::Arc};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use vigil_store_sqlite::SqliteStore;

use super::*;

async fn make_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState::new(
    Arc::new(store),
    ServerConfig {
      host:                   "127.0.0.1".to_string(),
      port:                   8420,
      store_path:             PathBuf::from(":memory:"),
      max_results_per_report: 4,
    },
  )
}

async fn send(
  state:  &AppState<SqliteStore>,
  method: &str,
  uri:    &str,
  body:   Option<Value>,
) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let req = match body {
    Some(b) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(b.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = router(state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

/// Enroll a device and a Windows policy assigned to it; returns their keys.
async fn device_with_policy(state: &AppState<SqliteStore>) -> (i64, i64) {
  let (status, device) = send(
    state,
    "POST",
    "/api/devices",
    Some(json!({ "tenant": 1, "name": "laptop", "serial_number": "SN-1", "os": "windows" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, policy) = send(
    state,
    "POST",
    "/api/policies",
    Some(json!({
      "tenant": 1,
      "name": "camera",
      "payload": {
        "kind": "windows",
        "data": { "csps": {
          "./Device/Vendor/MSFT/Policy/Config/Camera/AllowCamera": { "data": 0 }
        } }
      }
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let device = device["key"].as_i64().unwrap();
  let policy = policy["key"].as_i64().unwrap();

  let (status, _) = send(
    state,
    "POST",
    &format!("/api/policies/{policy}/assignments"),
    Some(json!({ "kind": "device", "key": device })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  (device, policy)
}

async fn deploy(state: &AppState<SqliteStore>, policy: i64) -> i64 {
  let (status, deployment) = send(
    state,
    "POST",
    &format!("/api/policies/{policy}/deployments"),
    Some(json!({ "comment": "rollout" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  deployment["key"].as_i64().unwrap()
}

async fn report(state: &AppState<SqliteStore>, device: i64, deployment: i64, result: &str) -> Value {
  let (status, body) = send(
    state,
    "POST",
    &format!("/checkin/{device}/results"),
    Some(json!({ "results": [{ "deployment": deployment, "result": result }] })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  body
}

fn deployments_in(list: &Value) -> Vec<i64> {
  list
    .as_array()
    .unwrap()
    .iter()
    .map(|d| d["deployment"].as_i64().unwrap())
    .collect()
}

// ── Check-in lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn full_apply_then_remove_cycle() {
  let state = make_state().await;
  let (device, policy) = device_with_policy(&state).await;
  let uri = format!("/checkin/{device}");

  // Assigned but never deployed: nothing to send.
  let (status, body) = send(&state, "POST", &uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body["to_apply"].as_array().unwrap().is_empty());

  let d1 = deploy(&state, policy).await;
  let (_, body) = send(&state, "POST", &uri, None).await;
  assert_eq!(deployments_in(&body["to_apply"]), vec![d1]);
  assert_eq!(body["to_apply"][0]["payload"]["kind"], "windows");

  report(&state, device, d1, "success").await;
  let (_, body) = send(&state, "POST", &uri, None).await;
  assert!(body["to_apply"].as_array().unwrap().is_empty());
  assert!(body["to_remove"].as_array().unwrap().is_empty());

  let (status, _) = send(
    &state,
    "DELETE",
    &format!("/api/policies/{policy}/assignments"),
    Some(json!({ "kind": "device", "key": device })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, body) = send(&state, "POST", &uri, None).await;
  assert_eq!(deployments_in(&body["to_remove"]), vec![d1]);

  report(&state, device, d1, "removed").await;
  let (_, body) = send(&state, "POST", &uri, None).await;
  assert!(body["to_remove"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn checkin_stamps_last_synced() {
  let state = make_state().await;
  let (device, _) = device_with_policy(&state).await;

  let (_, before) = send(&state, "GET", &format!("/api/devices/{device}"), None).await;
  assert!(before["last_synced"].is_null());

  send(&state, "POST", &format!("/checkin/{device}"), None).await;

  let (_, after) = send(&state, "GET", &format!("/api/devices/{device}"), None).await;
  assert!(after["last_synced"].is_string());
}

#[tokio::test]
async fn checkin_for_unknown_device_is_404() {
  let state = make_state().await;
  let (status, body) = send(&state, "POST", "/checkin/999", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn deleted_policy_shows_up_as_removal() {
  let state = make_state().await;
  let (device, policy) = device_with_policy(&state).await;
  let d1 = deploy(&state, policy).await;
  report(&state, device, d1, "success").await;

  let (status, _) = send(&state, "DELETE", &format!("/api/policies/{policy}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, body) = send(&state, "POST", &format!("/checkin/{device}"), None).await;
  assert_eq!(deployments_in(&body["to_remove"]), vec![d1]);
}

// ── Result reports ───────────────────────────────────────────────────────────

#[tokio::test]
async fn result_for_missing_deployment_is_dropped() {
  let state = make_state().await;
  let (device, _) = device_with_policy(&state).await;

  let body = report(&state, device, 4242, "success").await;
  assert_eq!(body["outcomes"][0]["outcome"], "dropped");
}

#[tokio::test]
async fn recorded_results_echo_the_status_row() {
  let state = make_state().await;
  let (device, policy) = device_with_policy(&state).await;
  let d1 = deploy(&state, policy).await;

  let body = report(&state, device, d1, "failure").await;
  assert_eq!(body["outcomes"][0]["outcome"], "recorded");
  assert_eq!(body["outcomes"][0]["status"]["result"], "failure");

  report(&state, device, d1, "success").await;
  let (_, statuses) = send(&state, "GET", &format!("/api/devices/{device}/statuses"), None).await;
  assert_eq!(statuses.as_array().unwrap().len(), 1);
  assert_eq!(statuses[0]["result"], "success");
}

#[tokio::test]
async fn oversized_report_is_rejected() {
  let state = make_state().await;
  let (device, _) = device_with_policy(&state).await;
  let results: Vec<Value> =
    (1..=5).map(|d| json!({ "deployment": d, "result": "success" })).collect();

  let (status, _) = send(
    &state,
    "POST",
    &format!("/checkin/{device}/results"),
    Some(json!({ "results": results })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_from_unknown_device_is_404() {
  let state = make_state().await;
  let (_, policy) = device_with_policy(&state).await;
  let d1 = deploy(&state, policy).await;

  let (status, _) = send(
    &state,
    "POST",
    "/checkin/77/results",
    Some(json!({ "results": [{ "deployment": d1, "result": "success" }] })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Device actions ───────────────────────────────────────────────────────────

#[tokio::test]
async fn queued_action_is_delivered_once() {
  let state = make_state().await;
  let (device, _) = device_with_policy(&state).await;

  let (status, action) = send(
    &state,
    "POST",
    &format!("/api/devices/{device}/actions"),
    Some(json!({ "action": "restart", "created_by": "admin" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let action = action["key"].as_i64().unwrap();

  let (_, body) = send(&state, "POST", &format!("/checkin/{device}"), None).await;
  assert_eq!(body["pending_actions"][0]["action"], "restart");

  let (status, delivered) = send(
    &state,
    "POST",
    &format!("/checkin/{device}/actions/{action}/delivered"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert!(delivered["deployed_at"].is_string());

  let (_, body) = send(&state, "POST", &format!("/checkin/{device}"), None).await;
  assert!(body["pending_actions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn another_devices_action_cannot_be_acknowledged() {
  let state = make_state().await;
  let (device, _) = device_with_policy(&state).await;
  let (_, action) = send(
    &state,
    "POST",
    &format!("/api/devices/{device}/actions"),
    Some(json!({ "action": "wipe" })),
  )
  .await;
  let action = action["key"].as_i64().unwrap();

  let (status, _) = send(
    &state,
    "POST",
    &format!("/checkin/{}/actions/{action}/delivered", device + 1),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Admin API ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn device_scope_reports_how_policies_arrive() {
  let state = make_state().await;
  let (device, policy) = device_with_policy(&state).await;

  let (_, group) = send(&state, "POST", "/api/groups", Some(json!({ "tenant": 1, "name": "all" })))
    .await;
  let group = group["key"].as_i64().unwrap();
  let (status, _) = send(
    &state,
    "POST",
    &format!("/api/groups/{group}/members"),
    Some(json!({ "kind": "device", "key": device })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, grouped) = send(
    &state,
    "POST",
    "/api/policies",
    Some(json!({ "tenant": 1, "name": "profile", "kind": "apple" })),
  )
  .await;
  let grouped = grouped["key"].as_i64().unwrap();
  send(
    &state,
    "POST",
    &format!("/api/policies/{grouped}/assignments"),
    Some(json!({ "kind": "group", "key": group })),
  )
  .await;

  let (status, scope) = send(&state, "GET", &format!("/api/devices/{device}/scope"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    scope,
    json!([
      { "policy": policy, "via": "direct" },
      { "policy": grouped, "via": "group" },
    ])
  );
}

#[tokio::test]
async fn policy_needs_payload_or_kind() {
  let state = make_state().await;
  let (status, _) =
    send(&state, "POST", "/api/policies", Some(json!({ "tenant": 1, "name": "empty" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(
    &state,
    "POST",
    "/api/policies",
    Some(json!({ "tenant": 1, "name": "odd", "kind": "android" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cross_tenant_assignment_is_rejected() {
  let state = make_state().await;
  let (_, policy) = device_with_policy(&state).await;
  let (_, foreign) = send(
    &state,
    "POST",
    "/api/devices",
    Some(json!({ "tenant": 2, "name": "other", "serial_number": "SN-2", "os": "apple" })),
  )
  .await;

  let (status, _) = send(
    &state,
    "POST",
    &format!("/api/policies/{policy}/assignments"),
    Some(json!({ "kind": "device", "key": foreign["key"] })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn policy_patch_edits_draft_only() {
  let state = make_state().await;
  let (device, policy) = device_with_policy(&state).await;
  let d1 = deploy(&state, policy).await;
  report(&state, device, d1, "success").await;

  let (status, patched) = send(
    &state,
    "PATCH",
    &format!("/api/policies/{policy}"),
    Some(json!({ "name": "camera (strict)", "description": null })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(patched["name"], "camera (strict)");

  // Not redeployed: the device has nothing new to apply.
  let (_, body) = send(&state, "POST", &format!("/checkin/{device}"), None).await;
  assert!(body["to_apply"].as_array().unwrap().is_empty());

  let (_, history) =
    send(&state, "GET", &format!("/api/policies/{policy}/deployments"), None).await;
  assert_eq!(history[0]["comment"], "rollout");
}

#[tokio::test]
async fn missing_resources_are_404() {
  let state = make_state().await;
  for uri in ["/api/devices/5", "/api/groups/5", "/api/policies/5", "/api/deployments/5"] {
    let (status, _) = send(&state, "GET", uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
  }
}
