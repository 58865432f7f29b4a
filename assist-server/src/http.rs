//! Assistant HTTP REST API
//!
//! Axum-based HTTP server exposing the chat and catalog operations. Runs
//! alongside the Unix socket IPC server on port 8787 (configurable).
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, Value)`, so the logic is testable without axum.
//!
//! Endpoints:
//! - GET  /health: session count, renderer, inventory source, backend reachability
//! - GET  /version: server version info
//! - POST /chat/session: start a conversation
//! - POST /chat/message: run one conversational turn
//! - GET  /services: service catalog
//! - POST /inventory/check: part availability at a catalog dealership

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use assist_core::ipc::{AssistRequest, AssistResponse, PROTOCOL_VERSION};
use assist_core::models::Coordinates;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::router::{self, AppState};

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/chat/session", post(create_session_handler))
        .route("/chat/message", post(message_handler))
        .route("/services", get(services_handler))
        .route("/inventory/check", post(inventory_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Assistant HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct CreateSessionRequest {
    pub customer_id: Option<String>,
    pub vin: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct MessageRequest {
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub customer_id: Option<String>,
    pub vin: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Deserialize, Default)]
pub struct InventoryCheckRequest {
    pub dealership_id: Option<String>,
    pub inventory_needed: Option<Vec<String>>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    let mut body = router::health_report(state).await;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("version".to_string(), serde_json::json!(env!("CARGO_PKG_VERSION")));
        obj.insert(
            "socket".to_string(),
            serde_json::json!(state.config.service.socket_path),
        );
    }
    (StatusCode::OK, body)
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL_VERSION,
    })
}

pub async fn create_session_inner(
    state: &AppState,
    req: CreateSessionRequest,
) -> (StatusCode, serde_json::Value) {
    let request = AssistRequest::CreateSession {
        customer_id: req.customer_id,
        vin: req.vin,
    };

    match response_to_http(router::handle_request(request, state).await) {
        Ok(data) => (StatusCode::CREATED, data),
        Err(failure) => failure.into_http("Failed to create session"),
    }
}

/// Inner message: one turn through the orchestrator, with timing.
pub async fn message_inner(
    state: &AppState,
    req: MessageRequest,
) -> (StatusCode, serde_json::Value) {
    let start = Instant::now();

    let request = AssistRequest::SendMessage {
        session_id: req.session_id,
        message: req.message,
        customer_id: req.customer_id,
        vin: req.vin,
        coordinates: req.coordinates,
    };

    let response = router::handle_request(request, state).await;
    let took_ms = start.elapsed().as_millis() as u64;

    match response_to_http(response) {
        Ok(mut data) => {
            if let Some(obj) = data.as_object_mut() {
                obj.insert("took_ms".to_string(), serde_json::json!(took_ms));
            }
            (StatusCode::OK, data)
        }
        Err(failure) => failure.into_http("Chat handler error"),
    }
}

pub async fn services_inner(state: &AppState) -> (StatusCode, serde_json::Value) {
    match response_to_http(router::handle_request(AssistRequest::ListServices, state).await) {
        Ok(data) => (StatusCode::OK, data),
        Err(failure) => failure.into_http("Failed to load services"),
    }
}

pub async fn inventory_inner(
    state: &AppState,
    req: InventoryCheckRequest,
) -> (StatusCode, serde_json::Value) {
    let request = AssistRequest::CheckInventory {
        dealership_id: req.dealership_id,
        inventory_needed: req.inventory_needed,
    };

    match response_to_http(router::handle_request(request, state).await) {
        Ok(data) => (StatusCode::OK, data),
        Err(failure) => failure.into_http("Failed to check inventory"),
    }
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

/// The body is optional; an empty POST starts an anonymous session.
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    req: Option<Json<CreateSessionRequest>>,
) -> impl IntoResponse {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let (status, body) = create_session_inner(&state, req).await;
    (status, Json(body))
}

pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> impl IntoResponse {
    let (status, body) = message_inner(&state, req).await;
    (status, Json(body))
}

pub async fn services_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = services_inner(&state).await;
    (status, Json(body))
}

pub async fn inventory_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InventoryCheckRequest>,
) -> impl IntoResponse {
    let (status, body) = inventory_inner(&state, req).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// A failed router response, carrying its failure class.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub error: String,
    pub kind: Option<String>,
}

impl Failure {
    pub fn status_code(&self) -> StatusCode {
        match self.kind.as_deref() {
            Some("client_input") => StatusCode::BAD_REQUEST,
            Some("not_found") => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client mistakes echo the reason as the message; server-side failures
    /// get the endpoint's context as message and the cause as `error`.
    pub fn into_http(self, context: &str) -> (StatusCode, serde_json::Value) {
        let status = self.status_code();
        let body = if status.is_server_error() {
            serde_json::json!({
                "status": "error",
                "message": context,
                "error": self.error,
                "kind": self.kind,
            })
        } else {
            serde_json::json!({
                "status": "error",
                "message": self.error,
                "kind": self.kind,
            })
        };
        (status, body)
    }
}

/// Convert an IPC `AssistResponse` into an HTTP body value, or a failure.
pub fn response_to_http(response: AssistResponse) -> std::result::Result<serde_json::Value, Failure> {
    if response.is_ok() {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        Err(Failure {
            error: response.error.unwrap_or_else(|| "unknown error".to_string()),
            kind: response.kind,
        })
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
