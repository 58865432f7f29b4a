//! Downstream gateway: typed adapters for the backend services the booking
//! flow depends on.
//!
//! Each capability is its own trait so the orchestrator can be wired against
//! any mix of implementations:
//! - **PredictiveMaintenance**: `POST /predict-maintenance`
//! - **DealershipRanking**: `POST /dealerships/rank`
//! - **InventoryCheck**: `POST /inventory/check` (or the local catalog)
//! - **AppointmentBooking**: `POST /appointments/book`
//!
//! `HttpGateway` implements all four against a single backend base URL.
//! Failures come back as `GatewayError` values tagged with the operation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::GatewayConfig;
use crate::models::{
    BookingRequest, BookingResponse, InventoryRequest, InventoryResponse, MaintenanceRequest,
    MaintenanceResponse, RankingRequest, RankingResponse,
};

// ============================================================================
// Operations and errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PredictiveMaintenance,
    DealershipRanking,
    InventoryCheck,
    AppointmentBooking,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::PredictiveMaintenance => "predictive_maintenance",
            Operation::DealershipRanking => "dealership_ranking",
            Operation::InventoryCheck => "inventory_check",
            Operation::AppointmentBooking => "appointment_booking",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            Operation::PredictiveMaintenance => "/predict-maintenance",
            Operation::DealershipRanking => "/dealerships/rank",
            Operation::InventoryCheck => "/inventory/check",
            Operation::AppointmentBooking => "/appointments/book",
        }
    }

    /// Booking creates a record on the backend, so it is never re-sent.
    fn is_idempotent(&self) -> bool {
        !matches!(self, Operation::AppointmentBooking)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{operation} request failed: {source}")]
    Http {
        operation: Operation,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {code}: {message}")]
    Status {
        operation: Operation,
        code: u16,
        message: String,
    },

    #[error("{operation} returned a malformed payload: {message}")]
    Decode { operation: Operation, message: String },

    #[error("{operation}: invalid request: {message}")]
    InvalidRequest { operation: Operation, message: String },

    #[error("{operation}: {what} not found")]
    NotFound { operation: Operation, what: String },

    #[error("dealership_ranking returned no candidates")]
    NoCandidates,
}

impl GatewayError {
    pub fn operation(&self) -> Operation {
        match self {
            GatewayError::Http { operation, .. }
            | GatewayError::Status { operation, .. }
            | GatewayError::Decode { operation, .. }
            | GatewayError::InvalidRequest { operation, .. }
            | GatewayError::NotFound { operation, .. } => *operation,
            GatewayError::NoCandidates => Operation::DealershipRanking,
        }
    }

    /// Worth another attempt: connection problems, throttling, server errors.
    fn is_transient(&self) -> bool {
        match self {
            GatewayError::Http { source, .. } => source.is_connect() || source.is_timeout(),
            GatewayError::Status { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Capability traits
// ============================================================================

#[async_trait]
pub trait PredictiveMaintenance: Send + Sync {
    async fn recommend(
        &self,
        request: &MaintenanceRequest,
    ) -> Result<MaintenanceResponse, GatewayError>;
}

#[async_trait]
pub trait DealershipRanking: Send + Sync {
    async fn rank(&self, request: &RankingRequest) -> Result<RankingResponse, GatewayError>;
}

#[async_trait]
pub trait InventoryCheck: Send + Sync {
    async fn check(&self, request: &InventoryRequest) -> Result<InventoryResponse, GatewayError>;

    /// Where inventory answers come from, for health output and logs.
    fn source(&self) -> &str;
}

#[async_trait]
pub trait AppointmentBooking: Send + Sync {
    async fn book(&self, request: &BookingRequest) -> Result<BookingResponse, GatewayError>;
}

/// The full set of downstream capabilities handed to the orchestrator.
#[derive(Clone)]
pub struct Gateway {
    pub maintenance: Arc<dyn PredictiveMaintenance>,
    pub ranking: Arc<dyn DealershipRanking>,
    pub inventory: Arc<dyn InventoryCheck>,
    pub booking: Arc<dyn AppointmentBooking>,
}

impl Gateway {
    /// Route every capability through one HTTP backend.
    pub fn from_http(http: HttpGateway) -> Self {
        let http = Arc::new(http);
        Self {
            maintenance: http.clone(),
            ranking: http.clone(),
            inventory: http.clone(),
            booking: http,
        }
    }

    /// Swap in a different inventory source (e.g. the local catalog).
    pub fn with_inventory(mut self, inventory: Arc<dyn InventoryCheck>) -> Self {
        self.inventory = inventory;
        self
    }
}

// ============================================================================
// HttpGateway
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    max_retries: usize,
    retry_delay_ms: u64,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call the backend's `/health` endpoint. Returns the HTTP status code.
    pub async fn health(&self) -> Result<u16, reqwest::Error> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().as_u16())
    }

    async fn call<Req, Resp>(&self, operation: Operation, body: &Req) -> Result<Resp, GatewayError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let retries = if operation.is_idempotent() {
            self.max_retries
        } else {
            0
        };
        let retry_strategy = ExponentialBackoff::from_millis(self.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(retries);

        RetryIf::spawn(
            retry_strategy,
            || self.call_once(operation, body),
            |e: &GatewayError| {
                let transient = e.is_transient();
                if transient {
                    tracing::warn!(operation = %operation, error = %e, "Transient gateway failure, retrying");
                }
                transient
            },
        )
        .await
    }

    async fn call_once<Req, Resp>(
        &self,
        operation: Operation,
        body: &Req,
    ) -> Result<Resp, GatewayError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, operation.path());

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| GatewayError::Http { operation, source })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| GatewayError::Http { operation, source })?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["message"].as_str().map(str::to_string))
                .unwrap_or(text);

            tracing::error!(operation = %operation, code = status.as_u16(), message = %message, "Gateway call rejected");

            return Err(GatewayError::Status {
                operation,
                code: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| GatewayError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl PredictiveMaintenance for HttpGateway {
    async fn recommend(
        &self,
        request: &MaintenanceRequest,
    ) -> Result<MaintenanceResponse, GatewayError> {
        self.call(Operation::PredictiveMaintenance, request).await
    }
}

#[async_trait]
impl DealershipRanking for HttpGateway {
    async fn rank(&self, request: &RankingRequest) -> Result<RankingResponse, GatewayError> {
        self.call(Operation::DealershipRanking, request).await
    }
}

#[async_trait]
impl InventoryCheck for HttpGateway {
    async fn check(&self, request: &InventoryRequest) -> Result<InventoryResponse, GatewayError> {
        self.call(Operation::InventoryCheck, request).await
    }

    fn source(&self) -> &str {
        "gateway"
    }
}

#[async_trait]
impl AppointmentBooking for HttpGateway {
    async fn book(&self, request: &BookingRequest) -> Result<BookingResponse, GatewayError> {
        self.call(Operation::AppointmentBooking, request).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
