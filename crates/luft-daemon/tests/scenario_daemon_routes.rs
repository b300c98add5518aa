//! In-process scenario tests for luft-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; no network I/O required.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use luft_core::testkit::{RecordingSink, ScriptedFetcher};
use luft_core::{DeviceRegistry, Poller};
use luft_daemon::api_types::DeviceView;
use luft_daemon::{routes, state};
use luft_md::RawRecord;
use serde_json::json;
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn call(router: axum::Router, uri: &str) -> (StatusCode, bytes::Bytes) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

/// State whose device snapshot holds sensor 42 after one real pass.
async fn state_with_sensor_42() -> Arc<state::AppState> {
    let st = Arc::new(state::AppState::new());
    let fetcher = ScriptedFetcher::new([Ok(vec![RawRecord::new(json!({
        "sensor": { "id": 42, "sensor_type": { "name": "SDS011", "manufacturer": "Nova Fitness" } },
        "sensordatavalues": [
            { "value_type": "P1", "value": "10.5" },
            { "value_type": "P2", "value": "4.2" }
        ]
    }))])]);
    let mut poller = Poller::new(
        Box::new(fetcher),
        Arc::new(RecordingSink::default()),
        DeviceRegistry::new("Luftdaten sensor"),
    );
    let report = poller.run_pass().await.expect("pass");

    let mut devices = st.devices.write().await;
    for d in poller.registry().devices() {
        devices.insert(d.id.clone(), DeviceView::from_record(d, Some(report.pass_seq)));
    }
    drop(devices);
    st
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let (status, body) = call(router, "/v1/health").await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "luft-daemon");
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_status_is_idle_with_no_passes() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let (status, body) = call(router, "/v1/status").await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["phase"], "idle");
    assert_eq!(json["passes_ok"], 0);
    assert_eq!(json["passes_failed"], 0);
    assert_eq!(json["device_count"], 0);
    assert!(json["last_error"].is_null());
    assert!(json["last_report"].is_null());
}

#[tokio::test]
async fn status_reports_live_phase() {
    let st = Arc::new(state::AppState::new());
    st.phase.send_replace(luft_core::PollPhase::Fetching);

    let (_, body) = call(routes::build_router(Arc::clone(&st)), "/v1/status").await;
    assert_eq!(parse_json(body)["phase"], "fetching");
}

// ---------------------------------------------------------------------------
// GET /v1/devices, /v1/devices/:id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn devices_empty_before_first_pass() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let (status, body) = call(router, "/v1/devices").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["devices"], json!([]));
}

#[tokio::test]
async fn device_listing_carries_values_and_metadata() {
    let st = state_with_sensor_42().await;
    let (status, body) = call(routes::build_router(st), "/v1/devices").await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    let devices = json["devices"].as_array().expect("array");
    assert_eq!(devices.len(), 1);

    let d = &devices[0];
    assert_eq!(d["id"], "sensor-42");
    assert_eq!(d["title"], "Nova Fitness SDS011");
    assert_eq!(d["description"], "Luftdaten sensor");
    assert_eq!(d["@context"], "https://iot.mozilla.org/schemas/");

    let props = d["properties"].as_array().expect("properties");
    let names: Vec<&str> = props.iter().filter_map(|p| p["name"].as_str()).collect();
    assert_eq!(names, vec!["P1", "P2"]);
    assert_eq!(props[0]["value"], "10.5");
    assert_eq!(props[0]["type"], "number");
    assert_eq!(props[0]["read_only"], true);
    assert_eq!(props[0]["stale"], false);
}

#[tokio::test]
async fn device_by_id_returns_the_device() {
    let st = state_with_sensor_42().await;
    let (status, body) = call(routes::build_router(st), "/v1/devices/sensor-42").await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["source_id"], 42);
    assert_eq!(json["kind"], "SDS011");
    assert_eq!(json["vendor"], "Nova Fitness");
}

#[tokio::test]
async fn unknown_device_is_404() {
    let st = state_with_sensor_42().await;
    let (status, body) = call(routes::build_router(st), "/v1/devices/sensor-7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(parse_json(body)["error"]
        .as_str()
        .unwrap_or_default()
        .contains("sensor-7"));
}

// ---------------------------------------------------------------------------
// GET /v1/stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stream_is_event_stream() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let req = Request::builder()
        .method("GET")
        .uri("/v1/stream")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.expect("oneshot failed");

    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(ct.starts_with("text/event-stream"), "content-type was {ct}");
}

#[tokio::test]
async fn control_routes_do_not_exist() {
    let router = routes::build_router(Arc::new(state::AppState::new()));
    let req = Request::builder()
        .method("POST")
        .uri("/v1/devices")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.expect("oneshot failed");
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}
