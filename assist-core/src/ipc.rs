use serde::{Deserialize, Serialize};

use crate::models::Coordinates;

pub const PROTOCOL_VERSION: &str = "assist/1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AssistRequest {
    Ping,
    Health,
    CreateSession {
        customer_id: Option<String>,
        vin: Option<String>,
    },
    SendMessage {
        session_id: Option<String>,
        message: Option<String>,
        customer_id: Option<String>,
        vin: Option<String>,
        #[serde(default)]
        coordinates: Option<Coordinates>,
    },
    ListServices,
    CheckInventory {
        dealership_id: Option<String>,
        #[serde(default)]
        inventory_needed: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssistResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Failure class (`client_input`, `upstream`, ...) when `status` is "error".
    #[serde(default)]
    pub kind: Option<String>,
    pub version: String,
}

impl AssistResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            kind: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            kind: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Decode one MessagePack request frame.
pub fn decode_request(frame: &[u8]) -> Result<AssistRequest, rmp_serde::decode::Error> {
    rmp_serde::from_slice(frame)
}

/// Encode a response as a MessagePack frame body (named fields).
pub fn encode_response(response: &AssistResponse) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(response)
}
