use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRequest {
    pub customer_id: String,
    pub vin: String,
    pub service_codes_requested: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

/// A dealership as ranked by the ranking service. Order in the response is
/// authoritative; the first entry is the one we book at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingCandidate {
    pub dealership_id: String,
    /// Reported as-is; the ranking service may send fractional or negative values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delay_minutes: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RankingCandidate {
    pub fn new(dealership_id: impl Into<String>, estimated_delay_minutes: Option<u32>) -> Self {
        Self {
            dealership_id: dealership_id.into(),
            estimated_delay_minutes: estimated_delay_minutes.map(f64::from),
            extra: serde_json::Map::new(),
        }
    }

    /// Whole minutes of delay, rounded. Negative or non-finite reports count as none.
    pub fn delay_minutes(&self) -> u32 {
        match self.estimated_delay_minutes {
            Some(m) if m.is_finite() && m > 0.0 => m.round().min(u32::MAX as f64) as u32,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingResponse {
    pub rankings: Vec<RankingCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRequest {
    pub dealership_id: String,
    #[serde(rename = "inventory_needed")]
    pub parts_needed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub inventory_ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
