//! Read-only catalog lookups backed by flat JSON files.
//!
//! - `dealerships.json`: dealership id → parts on hand
//! - `services_master.json`: service code definitions
//!
//! `CatalogInventory` answers inventory checks from the dealership file
//! instead of calling the remote inventory service.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{GatewayError, InventoryCheck, Operation};
use crate::models::{InventoryRequest, InventoryResponse};

pub const DEALERSHIPS_FILE: &str = "dealerships.json";
pub const SERVICES_FILE: &str = "services_master.json";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("dealership {0} not found")]
    DealershipNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub part_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dealership {
    pub dealership_id: String,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub service_code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub average_time_minutes: u32,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    dealerships: HashMap<String, Dealership>,
    services: Vec<ServiceDefinition>,
}

impl Catalog {
    pub fn new(dealerships: Vec<Dealership>, services: Vec<ServiceDefinition>) -> Self {
        Self {
            dealerships: dealerships
                .into_iter()
                .map(|d| (d.dealership_id.clone(), d))
                .collect(),
            services,
        }
    }

    /// Load both catalog files from `data_dir`. A missing file is treated as
    /// an empty list; a malformed one is an error.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let dir = data_dir.as_ref();
        let dealerships: Vec<Dealership> = read_json_or_default(&dir.join(DEALERSHIPS_FILE))?;
        let services: Vec<ServiceDefinition> = read_json_or_default(&dir.join(SERVICES_FILE))?;

        tracing::info!(
            dealerships = dealerships.len(),
            services = services.len(),
            "Catalog loaded from {}",
            dir.display()
        );

        Ok(Self::new(dealerships, services))
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn dealership(&self, id: &str) -> Option<&Dealership> {
        self.dealerships.get(id)
    }

    pub fn dealership_count(&self) -> usize {
        self.dealerships.len()
    }

    /// True when every needed part is stocked (quantity > 0) at the dealership.
    pub fn parts_available(&self, dealership_id: &str, parts: &[String]) -> Result<bool, CatalogError> {
        let dealership = self
            .dealership(dealership_id)
            .ok_or_else(|| CatalogError::DealershipNotFound(dealership_id.to_string()))?;

        Ok(parts.iter().all(|label| {
            dealership
                .inventory
                .iter()
                .any(|item| &item.part_name == label && item.quantity > 0)
        }))
    }
}

fn read_json_or_default<T>(path: &Path) -> Result<Vec<T>, CatalogError>
where
    T: serde::de::DeserializeOwned,
{
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Catalog file {} not found, using empty list", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(CatalogError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
        path: path.display().to_string(),
        source,
    })
}

// ============================================================================
// CatalogInventory
// ============================================================================

/// Inventory checks answered from the local dealership catalog.
#[derive(Debug, Clone)]
pub struct CatalogInventory {
    catalog: Arc<Catalog>,
}

impl CatalogInventory {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl InventoryCheck for CatalogInventory {
    async fn check(&self, request: &InventoryRequest) -> Result<InventoryResponse, GatewayError> {
        if request.dealership_id.is_empty() {
            return Err(GatewayError::InvalidRequest {
                operation: Operation::InventoryCheck,
                message: "dealership_id is required".to_string(),
            });
        }

        match self
            .catalog
            .parts_available(&request.dealership_id, &request.parts_needed)
        {
            Ok(true) => Ok(InventoryResponse {
                inventory_ok: true,
                message: None,
            }),
            Ok(false) => Ok(InventoryResponse {
                inventory_ok: false,
                message: Some(
                    "Some required parts are currently unavailable. Are you okay with a delay?"
                        .to_string(),
                ),
            }),
            Err(CatalogError::DealershipNotFound(id)) => Err(GatewayError::NotFound {
                operation: Operation::InventoryCheck,
                what: format!("dealership {}", id),
            }),
            Err(e) => Err(GatewayError::Decode {
                operation: Operation::InventoryCheck,
                message: e.to_string(),
            }),
        }
    }

    fn source(&self) -> &str {
        "catalog"
    }
}
