use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub customer_id: String,
    pub vin: String,
    pub dealership_id: String,
    pub service_codes_requested: Vec<String>,
    pub requested_datetime: DateTime<Utc>,
    #[serde(rename = "inventory_needed")]
    pub parts_needed: Vec<String>,
    pub inventory_ok: bool,
    pub estimated_delay_minutes: u32,
}

/// Booking record returned by the appointment service. Opaque to us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Appointment(pub serde_json::Value);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub appointment: Appointment,
}
