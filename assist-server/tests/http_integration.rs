//! HTTP integration tests for the assistant REST API
//!
//! The app state is wired from a TOML config exactly as the binary does it,
//! with the backend base URL pointed at a wiremock server. Requests go
//! through the full axum router via `oneshot`.

use std::sync::Arc;

use assist_core::AssistConfig;
use assist_server::http::build_router;
use assist_server::router::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointing every backend call at `base_url`, echo renderer, and a
/// catalog directory written under the temp dir.
fn config_for(base_url: &str, data_dir: &str, inventory_source: &str) -> AssistConfig {
    AssistConfig::from_toml(&format!(
        r#"
        [service]
        socket_path = "/tmp/assist-http-it.sock"
        log_level = "debug"

        [gateway]
        base_url = "{base_url}"
        timeout_seconds = 5

        [renderer]
        backend = "echo"
        model = "unused"
        assistant_name = "SheNergy"
        region = "Bangalore"
        max_retries = 0
        retry_delay_ms = 10

        [inventory]
        source = "{inventory_source}"

        [catalog]
        data_dir = "{data_dir}"
        "#
    ))
    .unwrap()
}

fn write_catalog(name: &str) -> String {
    let dir = std::env::temp_dir().join(format!("assist-it-{}-{}", name, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("dealerships.json"),
        json!([
            {
                "dealership_id": "BLR-01",
                "name": "Indiranagar",
                "inventory": [
                    { "part_name": "Brake Pads Front", "quantity": 0 },
                    { "part_name": "Engine Oil 5W30", "quantity": 8 }
                ]
            },
            {
                "dealership_id": "BLR-02",
                "inventory": [
                    { "part_name": "Brake Pads Front", "quantity": 3 }
                ]
            }
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join("services_master.json"),
        json!([
            {
                "service_code": "BRAKE_CHECK",
                "name": "Brake inspection",
                "description": "Pads, discs and fluid",
                "average_time_minutes": 45,
                "categories": ["safety"]
            }
        ])
        .to_string(),
    )
    .unwrap();
    dir.display().to_string()
}

async fn app_for(server: &MockServer, name: &str, inventory_source: &str) -> axum::Router {
    let data_dir = write_catalog(name);
    let state = AppState::from_config(config_for(&server.uri(), &data_dir, inventory_source))
        .expect("state should wire");
    build_router(Arc::new(state))
}

async fn send(app: &axum::Router, method_name: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method_name).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn mount_planning(server: &MockServer, inventory_ok: bool) {
    Mock::given(method("POST"))
        .and(path("/predict-maintenance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recommendations": [
                { "service_code": "BRAKE_CHECK", "priority": 1, "reason": "spongy pedal" }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/dealerships/rank"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rankings": [
                { "dealership_id": "BLR-01", "estimated_delay_minutes": 15, "score": 0.92 },
                { "dealership_id": "BLR-02", "score": 0.81 }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/inventory/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "inventory_ok": inventory_ok })))
        .mount(server)
        .await;
}

// ===========================================================================
// TEST 1: GET /version: returns version and protocol
// ===========================================================================
#[tokio::test]
async fn test_version_endpoint() {
    let server = MockServer::start().await;
    let app = app_for(&server, "version", "gateway").await;

    let (status, json) = send(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["version"].is_string());
    assert_eq!(json["protocol"], "assist/1");
}

// ===========================================================================
// TEST 2: GET /health: checks the backend and reports local state
// ===========================================================================
#[tokio::test]
async fn test_health_reports_backend_and_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let app = app_for(&server, "health", "catalog").await;

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["renderer"], "echo");
    assert_eq!(json["inventory_source"], "catalog");
    assert_eq!(json["catalog"]["dealerships"], 2);
    assert_eq!(json["backend"]["reachable"], true);
    assert_eq!(json["sessions"], 0);
}

// ===========================================================================
// TEST 3: POST /chat/session: 201 with id and greeting
// ===========================================================================
#[tokio::test]
async fn test_create_session() {
    let server = MockServer::start().await;
    let app = app_for(&server, "session", "gateway").await;

    let (status, json) = send(
        &app,
        "POST",
        "/chat/session",
        Some(json!({ "customer_id": "C1", "vin": "V1" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["session_id"].is_string());
    assert_eq!(
        json["message"],
        "Chat session created for SheNergy assistant in Bangalore."
    );

    let (status, _) = send(&app, "POST", "/chat/session", None).await;
    assert_eq!(status, StatusCode::CREATED, "body is optional");
}

// ===========================================================================
// TEST 4: POST /chat/message without message: 400
// ===========================================================================
#[tokio::test]
async fn test_message_required() {
    let server = MockServer::start().await;
    let app = app_for(&server, "required", "gateway").await;

    let (status, json) = send(&app, "POST", "/chat/message", Some(json!({ "customer_id": "C1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "message is required");

    let (status, _) = send(&app, "POST", "/chat/message", Some(json!({ "message": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// TEST 5: full booking when parts are in stock
// ===========================================================================
#[tokio::test]
async fn test_booking_flow_in_stock() {
    let server = MockServer::start().await;
    mount_planning(&server, true).await;
    Mock::given(method("POST"))
        .and(path("/appointments/book"))
        .and(body_partial_json(json!({
            "customer_id": "C1",
            "vin": "V1",
            "dealership_id": "BLR-01",
            "service_codes_requested": ["BRAKE_CHECK"],
            "inventory_needed": ["Brake Pads Front"],
            "inventory_ok": true,
            "estimated_delay_minutes": 15
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "appointment": { "appointment_id": "APT-1", "dealership_id": "BLR-01" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_for(&server, "in-stock", "gateway").await;

    let (status, json) = send(
        &app,
        "POST",
        "/chat/message",
        Some(json!({
            "message": "My brakes feel spongy",
            "customer_id": "C1",
            "vin": "V1"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "booked");
    assert_eq!(json["appointment"]["appointment_id"], "APT-1");
    assert_eq!(json["recommendations"][0]["service_code"], "BRAKE_CHECK");
    assert_eq!(json["rankings"][1]["score"], 0.81);
    assert!(json["reply"].is_string());
    assert!(json["took_ms"].is_u64());
}

// ===========================================================================
// TEST 6: parts short → ask about delay → "yes" books with 60 minute delay
// ===========================================================================
#[tokio::test]
async fn test_delay_confirmation_flow() {
    let server = MockServer::start().await;
    mount_planning(&server, false).await;
    Mock::given(method("POST"))
        .and(path("/appointments/book"))
        .and(body_partial_json(json!({
            "dealership_id": "BLR-01",
            "inventory_ok": false,
            "estimated_delay_minutes": 60,
            "inventory_needed": ["Brake Pads Front"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "appointment": { "appointment_id": "APT-2" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app_for(&server, "delay", "gateway").await;

    let (_, created) = send(
        &app,
        "POST",
        "/chat/session",
        Some(json!({ "customer_id": "C1", "vin": "V1" })),
    )
    .await;
    let session_id = created["session_id"].as_str().unwrap().to_string();

    let (status, short) = send(
        &app,
        "POST",
        "/chat/message",
        Some(json!({ "session_id": session_id, "message": "brake pedal is soft" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(short["outcome"], "inventory_short");
    assert_eq!(short["selected_dealership"]["dealership_id"], "BLR-01");

    let (_, unclear) = send(
        &app,
        "POST",
        "/chat/message",
        Some(json!({ "session_id": session_id, "message": "how long?" })),
    )
    .await;
    assert_eq!(unclear["outcome"], "unclear");

    let (status, confirmed) = send(
        &app,
        "POST",
        "/chat/message",
        Some(json!({ "session_id": session_id, "message": "Yes, that's fine" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["outcome"], "confirmed");
    assert_eq!(confirmed["appointment"]["appointment_id"], "APT-2");
    assert_eq!(confirmed["session_id"], session_id.as_str());
}

// ===========================================================================
// TEST 7: catalog inventory source drives the stock decision
// ===========================================================================
#[tokio::test]
async fn test_catalog_inventory_source_skips_remote_check() {
    let server = MockServer::start().await;
    mount_planning(&server, true).await;

    let app = app_for(&server, "catalog-source", "catalog").await;

    // BLR-01 has zero brake pads in the local catalog.
    let (status, json) = send(
        &app,
        "POST",
        "/chat/message",
        Some(json!({ "message": "brake noise", "customer_id": "C1", "vin": "V1" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "inventory_short");

    let remote_checks = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/inventory/check")
        .count();
    assert_eq!(remote_checks, 0);
}

// ===========================================================================
// TEST 8: backend failure surfaces as 500 with the failing operation
// ===========================================================================
#[tokio::test]
async fn test_upstream_failure_is_500() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict-maintenance"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({ "message": "model offline" })))
        .mount(&server)
        .await;

    let app = app_for(&server, "upstream", "gateway").await;

    let (status, json) = send(
        &app,
        "POST",
        "/chat/message",
        Some(json!({ "message": "service due", "customer_id": "C1", "vin": "V1" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["message"], "Chat handler error");
    assert_eq!(json["kind"], "upstream");
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("predictive_maintenance"));
    assert!(error.contains("model offline"));
}

// ===========================================================================
// TEST 9: GET /services and POST /inventory/check serve the catalog
// ===========================================================================
#[tokio::test]
async fn test_catalog_endpoints() {
    let server = MockServer::start().await;
    let app = app_for(&server, "catalog-endpoints", "gateway").await;

    let (status, json) = send(&app, "GET", "/services", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["services"][0]["service_code"], "BRAKE_CHECK");

    let (status, json) = send(
        &app,
        "POST",
        "/inventory/check",
        Some(json!({ "dealership_id": "BLR-02", "inventory_needed": ["Brake Pads Front"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["inventory_ok"], true);

    let (status, json) = send(
        &app,
        "POST",
        "/inventory/check",
        Some(json!({ "dealership_id": "BLR-01", "inventory_needed": ["Brake Pads Front"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["inventory_ok"], false);

    let (status, _) = send(
        &app,
        "POST",
        "/inventory/check",
        Some(json!({ "dealership_id": "NOPE", "inventory_needed": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, "POST", "/inventory/check", Some(json!({ "dealership_id": "BLR-01" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "dealership_id and inventory_needed are required");
}
