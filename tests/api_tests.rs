//! HTTP-level tests driving the router in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use sensorium::api::{create_router, AppState};
use sensorium::config::StorageConfig;
use sensorium::ingest::parse_offset;
use sensorium::{ManualClock, MetricStore, Timestamp};

/// 2025-01-01T00:00:00Z
const T0_SECS: i64 = 1_735_689_600;

struct Harness {
    app: Router,
    state: Arc<AppState>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(Timestamp::from_secs(T0_SECS)));
    let store = MetricStore::from_config(&StorageConfig::default()).unwrap();
    let state = Arc::new(AppState::new(
        Arc::new(store),
        clock.clone(),
        parse_offset("+05:30").unwrap(),
    ));

    Harness {
        app: create_router(Arc::clone(&state), true),
        state,
        clock,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

fn voltage_payload(voltage: f64, timestamp: &str) -> Value {
    json!({
        "energy_meter": { "voltage_V": voltage },
        "timestamp": timestamp,
    })
}

#[tokio::test]
async fn test_ingest_then_query_raw_range() {
    let h = harness();

    let (status, body) = post_json(&h.app, "/api/ingest", &voltage_payload(230.5, "2025-01-01T00:00:00Z")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "ok": true, "timestamp": "2025-01-01T00:00:00.000Z", "metricsStored": 1 })
    );

    let (status, _) = post_json(&h.app, "/api/ingest", &voltage_payload(231.0, "2025-01-01T00:00:05Z")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(
        &h.app,
        "/api/metrics?metrics=voltage&from=2025-01-01T00:00:00Z&to=2025-01-01T00:00:05Z",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["samples"]["voltage"],
        json!([
            { "ts": 1_735_689_600_000i64, "value": 230.5 },
            { "ts": 1_735_689_605_000i64, "value": 231.0 },
        ])
    );
    assert_eq!(body["latest"]["voltage"], json!(231.0));
    assert_eq!(body["sampleCounts"]["voltage"], json!(2));
    assert_eq!(body["aggregation"], json!("raw"));
    assert_eq!(
        body["range"],
        json!({ "from": "2025-01-01T00:00:00.000Z", "to": "2025-01-01T00:00:05.000Z" })
    );
}

#[tokio::test]
async fn test_full_payload_with_local_timestamp() {
    let h = harness();
    let payload = json!({
        "temperature": { "CH1": 32.0, "CH3": 31.0, "CH5": 31.05 },
        "energy_meter": { "energy_kWh": 17.39, "frequency_Hz": 50.02, "voltage_V": 230.4, "current_A": 4.1 },
        "vibrator_meter": { "s4_voltage": 2.9588 },
        "timestamp": "2025-01-01 05:30:00",
    });

    let (status, body) = post_json(&h.app, "/api/ingest", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timestamp"], json!("2025-01-01T00:00:00.000Z"));
    assert_eq!(body["metricsStored"], json!(8));

    let (_, body) = get(&h.app, "/api/metrics").await;
    assert_eq!(body["latest"]["current"], json!(4.1));
    assert_eq!(body["latest"]["temp.CH5"], json!(31.05));
    assert_eq!(body["latest"]["energy_kWh"], json!(17.39));
}

#[tokio::test]
async fn test_ingest_rejections() {
    let h = harness();

    let (status, body) = post_json(&h.app, "/api/ingest", &json!({ "energy_meter": { "voltage_V": 230.0 } })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing timestamp" }));

    let (status, body) = post_json(&h.app, "/api/ingest", &voltage_payload(230.0, "last tuesday")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid timestamp format" }));

    let request = Request::post("/api/ingest")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON payload"));

    assert!(h.state.store.latest_snapshot().is_empty());
}

#[tokio::test]
async fn test_metrics_defaults() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["range"], json!({ "from": "all", "to": "all" }));
    assert_eq!(body["aggregation"], json!("raw"));

    let mut names: Vec<&str> = body["samples"].as_object().unwrap().keys().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["current", "temp.CH1", "temp.CH2", "temp.CH3", "vibration", "voltage"]);

    let latest = body["latest"].as_object().unwrap();
    assert_eq!(latest.len(), 9);
    assert!(latest.values().all(|v| v == &json!(0.0)));
}

#[tokio::test]
async fn test_metrics_skips_unmapped_names() {
    let h = harness();
    let (status, body) = get(&h.app, "/api/metrics?metrics=voltage,pressure,current_A").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["samples"], json!({ "voltage": [] }));
    assert_eq!(body["sampleCounts"], json!({ "voltage": 0 }));
}

#[tokio::test]
async fn test_metrics_rejections() {
    let h = harness();

    let (status, body) = get(&h.app, "/api/metrics?agg=15min").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid aggregation parameter. Use raw, 1min, or 5min" }));

    let (status, body) = get(&h.app, "/api/metrics?from=yesterday&to=2025-01-01T00:00:00Z").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid date format. Use ISO strings" }));

    let (status, _) = get(&h.app, "/api/metrics?range=2d").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_one_minute_aggregation() {
    let h = harness();
    for (value, ts) in [
        (10.0, "2025-01-01T00:00:00Z"),
        (20.0, "2025-01-01T00:00:10Z"),
        (40.0, "2025-01-01T00:01:10Z"),
    ] {
        let (status, _) = post_json(&h.app, "/api/ingest", &voltage_payload(value, ts)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = get(&h.app, "/api/metrics?metrics=voltage&agg=1min").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aggregation"], json!("1min"));
    assert_eq!(body["samples"]["voltage"], json!([{ "ts": 1_735_689_600_000i64, "value": 15.0 }]));

    // Nothing has closed at five-minute granularity yet
    let (_, body) = get(&h.app, "/api/metrics?metrics=voltage&agg=5min").await;
    assert_eq!(body["samples"]["voltage"], json!([]));
}

#[tokio::test]
async fn test_range_preset_uses_clock() {
    let h = harness();
    for ts in ["2025-01-01T00:00:00Z", "2025-01-01T00:09:00Z"] {
        post_json(&h.app, "/api/ingest", &voltage_payload(230.0, ts)).await;
    }
    h.clock.set(Timestamp::from_secs(T0_SECS + 600));

    let (status, body) = get(&h.app, "/api/metrics?metrics=voltage&range=5m").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sampleCounts"]["voltage"], json!(1));
    assert_eq!(
        body["range"],
        json!({ "from": "2025-01-01T00:05:00.000Z", "to": "2025-01-01T00:10:00.000Z" })
    );
}

#[tokio::test]
async fn test_percentages() {
    let h = harness();
    let now = Timestamp::from_secs(T0_SECS);
    h.clock.set(now);

    let store = &h.state.store;
    store.write("voltage", 200.0, now.sub_duration(Duration::from_secs(5400)));
    store.write("voltage", 220.0, now.sub_duration(Duration::from_secs(600)));
    store.write("temp.CH1", 30.0, now.sub_duration(Duration::from_secs(600)));

    let (status, body) = get(&h.app, "/api/percentages").await;
    assert_eq!(status, StatusCode::OK);

    let percentages = body["percentages"].as_object().unwrap();
    assert_eq!(percentages.len(), 9);
    assert_eq!(percentages["voltage"], json!(10.0));
    // No previous-hour baseline
    assert_eq!(percentages["temp.CH1"], json!(0.0));
    assert_eq!(percentages["current"], json!(0.0));
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let h = harness();
    post_json(&h.app, "/api/ingest", &voltage_payload(230.0, "2025-01-01T00:00:00Z")).await;
    post_json(&h.app, "/api/ingest", &voltage_payload(231.0, "2025-01-01T00:01:00Z")).await;

    let (status, body) = send(&h.app, Request::post("/api/reset").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "success": true, "message": "All data has been cleared successfully" })
    );

    for agg in ["raw", "1min", "5min"] {
        let (_, body) = get(&h.app, &format!("/api/metrics?metrics=voltage&agg={agg}")).await;
        assert_eq!(body["samples"]["voltage"], json!([]), "{agg}");
        assert_eq!(body["latest"]["voltage"], json!(0.0));
    }
}

#[tokio::test]
async fn test_info_endpoints() {
    let h = harness();

    let (status, body) = get(&h.app, "/api/ingest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], json!("POST"));
    assert_eq!(body["expectedPayload"]["timestamp"], json!("2025-09-25 09:54:39"));

    let (status, body) = get(&h.app, "/api/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], json!("POST"));
}

#[tokio::test]
async fn test_health() {
    let h = harness();
    post_json(&h.app, "/api/ingest", &voltage_payload(230.0, "2025-01-01T00:00:00Z")).await;

    let (status, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["series"], json!(9));
    assert_eq!(body["store"]["totalWrites"], json!(1));
}
