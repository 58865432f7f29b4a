use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dealership::RankingRequest;

/// Per-conversation state carried between turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub customer_id: Option<String>,
    pub vin: Option<String>,
    #[serde(default)]
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// Where the conversation stands.
///
/// A session can only ever hold a single pending confirmation because the
/// confirmation data lives inside the variant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingConfirmation(PendingConfirmation),
}

/// A delayed booking the customer has not yet accepted or rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub dealership_id: String,
    pub parts_needed: Vec<String>,
    /// Ranking query that produced the candidate; re-sent verbatim on rejection.
    pub ranking_request: RankingRequest,
}

impl Session {
    pub fn new(customer_id: Option<String>, vin: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            vin,
            state: ConversationState::Idle,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Overwrite stored identifiers with whichever values were supplied.
    /// Empty strings count as not supplied.
    pub fn apply_identifiers(&mut self, customer_id: Option<String>, vin: Option<String>) {
        if let Some(c) = customer_id.filter(|c| !c.is_empty()) {
            self.customer_id = Some(c);
        }
        if let Some(v) = vin.filter(|v| !v.is_empty()) {
            self.vin = Some(v);
        }
    }

    /// Both identifiers, when both are known and non-empty.
    pub fn identifiers(&self) -> Option<(&str, &str)> {
        match (self.customer_id.as_deref(), self.vin.as_deref()) {
            (Some(c), Some(v)) if !c.is_empty() && !v.is_empty() => Some((c, v)),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        match &self.state {
            ConversationState::AwaitingConfirmation(p) => Some(p),
            ConversationState::Idle => None,
        }
    }

    /// Clear any pending confirmation, returning it.
    pub fn take_pending(&mut self) -> Option<PendingConfirmation> {
        match std::mem::take(&mut self.state) {
            ConversationState::AwaitingConfirmation(p) => Some(p),
            ConversationState::Idle => None,
        }
    }

    /// Enter confirmation mode. Only valid from `Idle`.
    pub fn await_confirmation(&mut self, pending: PendingConfirmation) {
        debug_assert!(
            matches!(self.state, ConversationState::Idle),
            "session already awaiting confirmation"
        );
        self.state = ConversationState::AwaitingConfirmation(pending);
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }
}
