use std::sync::Arc;

use assist_core::catalog::{Catalog, CatalogError, CatalogInventory};
use assist_core::config::AssistConfig;
use assist_core::gateway::{Gateway, HttpGateway};
use assist_core::ipc::{AssistRequest, AssistResponse};
use assist_core::models::Coordinates;
use assist_core::renderer::{create_renderer, ReplyRenderer};
use assist_core::session_store::{InMemorySessionStore, SessionStore};
use assist_core::AssistError;

use crate::subsystems::booking::{BookingOrchestrator, InboundMessage};

/// Everything a transport needs to answer requests.
pub struct AppState {
    pub orchestrator: Arc<BookingOrchestrator>,
    pub catalog: Arc<Catalog>,
    /// Remote backend, checked by health requests. `None` in tests.
    pub backend: Option<HttpGateway>,
    pub config: AssistConfig,
}

impl AppState {
    /// Wire the store, gateway, renderer and catalog from configuration.
    pub fn from_config(config: AssistConfig) -> Result<Self, AssistError> {
        let catalog = Arc::new(Catalog::load(&config.catalog.data_dir)?);

        let http = HttpGateway::new(&config.gateway)
            .map_err(|e| AssistError::Other(format!("failed to build gateway client: {}", e)))?;
        let mut gateway = Gateway::from_http(http.clone());
        if config.inventory.source == "catalog" {
            gateway = gateway.with_inventory(Arc::new(CatalogInventory::new(catalog.clone())));
        }

        let renderer: Arc<dyn ReplyRenderer> = Arc::from(
            create_renderer(&config.renderer)
                .map_err(|e| AssistError::Other(format!("failed to build renderer: {}", e)))?,
        );

        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let orchestrator = BookingOrchestrator::new(
            store,
            gateway,
            renderer,
            config.renderer.region.clone(),
        );

        tracing::info!(
            backend = %http.base_url(),
            renderer = orchestrator.renderer_name(),
            inventory = orchestrator.inventory_source(),
            "Assistant wired"
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            catalog,
            backend: Some(http),
            config,
        })
    }

    fn session_greeting(&self) -> String {
        format!(
            "Chat session created for {} assistant in {}.",
            self.config.renderer.assistant_name, self.config.renderer.region
        )
    }
}

pub async fn handle_request(request: AssistRequest, state: &AppState) -> AssistResponse {
    match request {
        AssistRequest::Ping => AssistResponse::pong(),
        AssistRequest::Health => AssistResponse::ok(health_report(state).await),
        AssistRequest::CreateSession { customer_id, vin } => {
            match state.orchestrator.create_session(customer_id, vin).await {
                Ok(session) => AssistResponse::ok(serde_json::json!({
                    "session_id": session.id,
                    "message": state.session_greeting(),
                })),
                Err(e) => AssistResponse::err(e.to_string()).with_kind("store"),
            }
        }
        AssistRequest::SendMessage {
            session_id,
            message,
            customer_id,
            vin,
            coordinates,
        } => handle_send_message(state, session_id, message, customer_id, vin, coordinates).await,
        AssistRequest::ListServices => AssistResponse::ok(serde_json::json!({
            "services": state.catalog.services(),
        })),
        AssistRequest::CheckInventory {
            dealership_id,
            inventory_needed,
        } => check_inventory(&state.catalog, dealership_id, inventory_needed),
    }
}

async fn handle_send_message(
    state: &AppState,
    session_id: Option<String>,
    message: Option<String>,
    customer_id: Option<String>,
    vin: Option<String>,
    coordinates: Option<Coordinates>,
) -> AssistResponse {
    let inbound = InboundMessage {
        session_id,
        message,
        customer_id,
        vin,
        coordinates,
    };

    match state.orchestrator.handle_message(inbound).await {
        Ok(reply) => match serde_json::to_value(&reply) {
            Ok(data) => AssistResponse::ok(data),
            Err(e) => AssistResponse::err(format!("Failed to encode reply: {}", e)),
        },
        Err(e) => AssistResponse::err(e.to_string()).with_kind(e.kind()),
    }
}

fn check_inventory(
    catalog: &Catalog,
    dealership_id: Option<String>,
    inventory_needed: Option<Vec<String>>,
) -> AssistResponse {
    let (dealership_id, parts) = match (dealership_id, inventory_needed) {
        (Some(d), Some(parts)) if !d.is_empty() => (d, parts),
        _ => {
            return AssistResponse::err("dealership_id and inventory_needed are required")
                .with_kind("client_input")
        }
    };

    match catalog.parts_available(&dealership_id, &parts) {
        Ok(true) => AssistResponse::ok(serde_json::json!({ "inventory_ok": true })),
        Ok(false) => AssistResponse::ok(serde_json::json!({
            "inventory_ok": false,
            "message": "Some required parts are currently unavailable. Are you okay with a delay?",
        })),
        Err(CatalogError::DealershipNotFound(_)) => {
            AssistResponse::err("Dealership not found").with_kind("not_found")
        }
        Err(e) => AssistResponse::err(e.to_string()),
    }
}

/// Local state plus a reachability check of the backend, if one is wired.
pub async fn health_report(state: &AppState) -> serde_json::Value {
    let sessions = state.orchestrator.store().len().await.unwrap_or(0);

    let (backend, healthy) = match &state.backend {
        Some(http) => match http.health().await {
            Ok(code) => (
                serde_json::json!({
                    "url": http.base_url(),
                    "reachable": true,
                    "status": code,
                }),
                (200..300).contains(&code),
            ),
            Err(e) => (
                serde_json::json!({
                    "url": http.base_url(),
                    "reachable": false,
                    "error": e.to_string(),
                }),
                false,
            ),
        },
        None => (serde_json::Value::Null, true),
    };

    serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "sessions": sessions,
        "renderer": state.orchestrator.renderer_name(),
        "inventory_source": state.orchestrator.inventory_source(),
        "catalog": {
            "dealerships": state.catalog.dealership_count(),
            "services": state.catalog.services().len(),
        },
        "backend": backend,
    })
}
