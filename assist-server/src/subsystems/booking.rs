//! Booking orchestrator: drives one conversational turn.
//!
//! A turn is: load (or create) the session, apply any supplied identifiers,
//! pick a branch, make the gateway calls that branch needs strictly in order,
//! render a reply, then persist the session.
//!
//! Branches, in priority order:
//! 1. Session awaiting a yes/no on a delayed booking:
//!    affirmative → book with the stored dealership (Confirmed),
//!    "no" → re-rank with the stored request (ReRanked),
//!    otherwise ask again (Unclear).
//! 2. Message mentions a service keyword:
//!    identifiers missing → NeedsIdentifiers;
//!    else predict → rank → derive parts → inventory, then either
//!    InventoryShort (awaits confirmation) or Booked.
//! 3. Anything else → Greeting.
//!
//! The session is edited on a private copy and written back only after the
//! reply renders, so a failed gateway or renderer call leaves the stored
//! session exactly as it was.

use std::sync::Arc;

use assist_core::gateway::{Gateway, GatewayError};
use assist_core::models::{
    Appointment, BookingRequest, Coordinates, InventoryRequest, MaintenanceRequest,
    PendingConfirmation, RankingCandidate, RankingRequest, Recommendation, Session,
};
use assist_core::renderer::ReplyRenderer;
use assist_core::session_store::{SessionStore, StoreError, TurnGate};
use assist_core::TurnError;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Keywords that start the service-planning flow.
pub const SERVICE_KEYWORDS: [&str; 4] = ["pickup", "brake", "clutch", "service"];

const AFFIRMATIVE_TOKENS: [&str; 3] = ["yes", "ok", "fine"];
const NEGATIVE_TOKEN: &str = "no";

/// Delay quoted when the customer accepts waiting for parts.
pub const ACCEPTED_DELAY_MINUTES: u32 = 60;

/// Part stocked for codes that match no known prefix.
const DEFAULT_PART: &str = "Engine Oil 5W30";

// ============================================================================
// Turn input / output
// ============================================================================

/// One inbound customer message.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub session_id: Option<String>,
    pub message: Option<String>,
    pub customer_id: Option<String>,
    pub vin: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// How a turn ended, with whatever structured data that branch produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    Confirmed {
        appointment: Appointment,
    },
    ReRanked {
        rankings: Vec<RankingCandidate>,
    },
    Unclear,
    NeedsIdentifiers,
    InventoryShort {
        selected_dealership: RankingCandidate,
    },
    Booked {
        recommendations: Vec<Recommendation>,
        rankings: Vec<RankingCandidate>,
        appointment: Appointment,
    },
    Greeting,
}

impl TurnOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Confirmed { .. } => "confirmed",
            TurnOutcome::ReRanked { .. } => "re_ranked",
            TurnOutcome::Unclear => "unclear",
            TurnOutcome::NeedsIdentifiers => "needs_identifiers",
            TurnOutcome::InventoryShort { .. } => "inventory_short",
            TurnOutcome::Booked { .. } => "booked",
            TurnOutcome::Greeting => "greeting",
        }
    }

    pub fn directive(&self) -> Directive {
        match self {
            TurnOutcome::Confirmed { .. } => Directive::ConfirmDelayedBooking,
            TurnOutcome::ReRanked { .. } => Directive::OfferAlternatives,
            TurnOutcome::Unclear => Directive::AskYesNo,
            TurnOutcome::NeedsIdentifiers => Directive::AskForIdentifiers,
            TurnOutcome::InventoryShort { .. } => Directive::AskAboutDelay,
            TurnOutcome::Booked { .. } => Directive::ExplainBooking,
            TurnOutcome::Greeting => Directive::Introduce,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub session_id: Uuid,
    pub reply: String,
    #[serde(flatten)]
    pub outcome: TurnOutcome,
}

// ============================================================================
// Directives
// ============================================================================

/// What the reply should communicate. Rendered into an instruction for the
/// reply model; shown verbatim only when no model is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    ConfirmDelayedBooking,
    OfferAlternatives,
    AskYesNo,
    AskForIdentifiers,
    AskAboutDelay,
    ExplainBooking,
    Introduce,
}

impl Directive {
    pub fn instruction(&self, region: &str) -> String {
        match self {
            Directive::ConfirmDelayedBooking => format!(
                "The customer accepted a delayed appointment while parts are restocked at a {} dealership. Confirm the booking warmly and mention the expected delay.",
                region
            ),
            Directive::OfferAlternatives => format!(
                "The customer does not want to wait for parts. Say the delayed slot will not be booked and present the alternative {} dealerships from the new ranking.",
                region
            ),
            Directive::AskYesNo => format!(
                "Politely ask again whether the customer can accept a service delay while parts arrive in {}. Ask for a clear YES or NO.",
                region
            ),
            Directive::AskForIdentifiers => format!(
                "Ask the customer for their registered customer ID and vehicle VIN so their {} service history can be looked up.",
                region
            ),
            Directive::AskAboutDelay => format!(
                "Tell the customer some required parts are out of stock at the chosen {} dealership and ask whether a delay is acceptable.",
                region
            ),
            Directive::ExplainBooking => format!(
                "Explain that based on the reported symptoms and typical {} driving, services were recommended, nearby dealerships ranked, and a confirmed appointment booked.",
                region
            ),
            Directive::Introduce => format!(
                "Introduce yourself as the automotive service assistant for {} and invite the customer to describe symptoms such as poor pickup, spongy brakes or a hard clutch so you can recommend services and book a nearby service centre.",
                region
            ),
        }
    }
}

// ============================================================================
// Message classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationAnswer {
    Accept,
    Reject,
    Unclear,
}

impl ConfirmationAnswer {
    /// Plain substring matching on the lower-cased text. Affirmative wins
    /// when both kinds of token appear.
    pub fn classify(lowered: &str) -> Self {
        if AFFIRMATIVE_TOKENS.iter().any(|t| lowered.contains(t)) {
            ConfirmationAnswer::Accept
        } else if lowered.contains(NEGATIVE_TOKEN) {
            ConfirmationAnswer::Reject
        } else {
            ConfirmationAnswer::Unclear
        }
    }
}

pub fn mentions_service(lowered: &str) -> bool {
    SERVICE_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Map each service code to the part it consumes. One part per code, in
/// order, duplicates kept.
pub fn parts_for_codes<S: AsRef<str>>(codes: &[S]) -> Vec<String> {
    codes
        .iter()
        .map(|code| {
            let code = code.as_ref();
            if code.starts_with("PERIODIC") {
                "Engine Oil 5W30"
            } else if code.starts_with("BRAKE") {
                "Brake Pads Front"
            } else if code.starts_with("CLUTCH") {
                "Clutch Plate Assembly"
            } else {
                DEFAULT_PART
            }
            .to_string()
        })
        .collect()
}

// ============================================================================
// BookingOrchestrator
// ============================================================================

pub struct BookingOrchestrator {
    store: Arc<dyn SessionStore>,
    gate: TurnGate,
    gateway: Gateway,
    renderer: Arc<dyn ReplyRenderer>,
    region: String,
}

impl BookingOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        gateway: Gateway,
        renderer: Arc<dyn ReplyRenderer>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gate: TurnGate::new(),
            gateway,
            renderer,
            region: region.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn gate(&self) -> &TurnGate {
        &self.gate
    }

    pub fn renderer_name(&self) -> &str {
        self.renderer.name()
    }

    pub fn inventory_source(&self) -> &str {
        self.gateway.inventory.source()
    }

    /// Start an idle session with optional identifiers.
    pub async fn create_session(
        &self,
        customer_id: Option<String>,
        vin: Option<String>,
    ) -> Result<Session, StoreError> {
        let session = self.store.create(customer_id, vin).await?;
        tracing::info!(session_id = %session.id, "Chat session created");
        Ok(session)
    }

    /// Run one turn. On error nothing about the session is persisted.
    pub async fn handle_message(&self, inbound: InboundMessage) -> Result<TurnReply, TurnError> {
        let message = match inbound.message.as_deref() {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => return Err(TurnError::ClientInput("message is required".to_string())),
        };

        let (mut session, turn, is_new) = self.load_session(&inbound).await?;
        let session_id = session.id;

        let result = self.run_turn(&mut session, &message, inbound).await;
        drop(turn);

        match result {
            Ok(reply) => {
                tracing::info!(
                    session_id = %session_id,
                    outcome = reply.outcome.label(),
                    "Turn complete"
                );
                Ok(reply)
            }
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    kind = e.kind(),
                    operation = e.operation().unwrap_or("-"),
                    error = %e,
                    "Turn aborted"
                );
                if is_new {
                    self.gate.release(&[session_id]).await;
                }
                Err(e)
            }
        }
    }

    /// Resolve the session for this message, holding its turn gate. The flag
    /// is true when the session was started by this message.
    ///
    /// Unknown or malformed ids start a new session; that session is only
    /// stored once the turn commits.
    async fn load_session(
        &self,
        inbound: &InboundMessage,
    ) -> Result<(Session, OwnedMutexGuard<()>, bool), StoreError> {
        if let Some(id) = inbound
            .session_id
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
        {
            let guard = self.gate.acquire(id).await;
            if let Some(session) = self.store.get(id).await? {
                return Ok((session, guard, false));
            }
            drop(guard);
            self.gate.release(&[id]).await;
            tracing::debug!(session_id = %id, "Unknown session id, starting a new session");
        }

        let session = Session::new(inbound.customer_id.clone(), inbound.vin.clone());
        let guard = self.gate.acquire(session.id).await;
        Ok((session, guard, true))
    }

    async fn run_turn(
        &self,
        session: &mut Session,
        message: &str,
        inbound: InboundMessage,
    ) -> Result<TurnReply, TurnError> {
        session.apply_identifiers(inbound.customer_id, inbound.vin);

        let lowered = message.to_lowercase();
        let answer = ConfirmationAnswer::classify(&lowered);

        let outcome = match session.take_pending() {
            Some(pending) if answer == ConfirmationAnswer::Unclear => {
                session.await_confirmation(pending);
                TurnOutcome::Unclear
            }
            Some(pending) => self.resolve_confirmation(session, pending, answer).await?,
            None if mentions_service(&lowered) => {
                self.plan_service(session, inbound.coordinates).await?
            }
            None => TurnOutcome::Greeting,
        };

        let directive = outcome.directive().instruction(&self.region);
        let reply = self.renderer.render(&directive, message).await?;

        session.touch();
        self.store.upsert(session.clone()).await?;

        Ok(TurnReply {
            session_id: session.id,
            reply,
            outcome,
        })
    }

    /// The pending booking has already been cleared from `session`.
    async fn resolve_confirmation(
        &self,
        session: &Session,
        pending: PendingConfirmation,
        answer: ConfirmationAnswer,
    ) -> Result<TurnOutcome, GatewayError> {
        if answer == ConfirmationAnswer::Reject {
            tracing::debug!(session_id = %session.id, "Delay rejected, re-ranking with stored request");
            let ranking = self.gateway.ranking.rank(&pending.ranking_request).await?;
            return Ok(TurnOutcome::ReRanked {
                rankings: ranking.rankings,
            });
        }

        let PendingConfirmation {
            dealership_id,
            parts_needed,
            ranking_request,
        } = pending;

        let booking = BookingRequest {
            customer_id: session
                .customer_id
                .clone()
                .unwrap_or_else(|| ranking_request.customer_id.clone()),
            vin: session
                .vin
                .clone()
                .unwrap_or_else(|| ranking_request.vin.clone()),
            dealership_id,
            service_codes_requested: ranking_request.service_codes_requested,
            requested_datetime: Utc::now(),
            parts_needed,
            inventory_ok: false,
            estimated_delay_minutes: ACCEPTED_DELAY_MINUTES,
        };

        let booked = self.gateway.booking.book(&booking).await?;
        Ok(TurnOutcome::Confirmed {
            appointment: booked.appointment,
        })
    }

    async fn plan_service(
        &self,
        session: &mut Session,
        coordinates: Option<Coordinates>,
    ) -> Result<TurnOutcome, GatewayError> {
        let (customer_id, vin) = match session.identifiers() {
            Some((c, v)) => (c.to_string(), v.to_string()),
            None => return Ok(TurnOutcome::NeedsIdentifiers),
        };

        let predicted = self
            .gateway
            .maintenance
            .recommend(&MaintenanceRequest {
                customer_id: customer_id.clone(),
                vin: vin.clone(),
            })
            .await?;

        let service_codes: Vec<String> = predicted
            .recommendations
            .iter()
            .map(|r| r.service_code.clone())
            .collect();

        let ranking_request = RankingRequest {
            customer_id: customer_id.clone(),
            vin: vin.clone(),
            service_codes_requested: service_codes.clone(),
            coordinates,
        };
        let ranking = self.gateway.ranking.rank(&ranking_request).await?;
        let top = ranking
            .rankings
            .first()
            .cloned()
            .ok_or(GatewayError::NoCandidates)?;

        let parts_needed = parts_for_codes(&service_codes);

        let inventory = self
            .gateway
            .inventory
            .check(&InventoryRequest {
                dealership_id: top.dealership_id.clone(),
                parts_needed: parts_needed.clone(),
            })
            .await?;

        if !inventory.inventory_ok {
            tracing::info!(
                session_id = %session.id,
                dealership_id = %top.dealership_id,
                "Parts short, awaiting delay confirmation"
            );
            session.await_confirmation(PendingConfirmation {
                dealership_id: top.dealership_id.clone(),
                parts_needed,
                ranking_request,
            });
            return Ok(TurnOutcome::InventoryShort {
                selected_dealership: top,
            });
        }

        let booked = self
            .gateway
            .booking
            .book(&BookingRequest {
                customer_id,
                vin,
                dealership_id: top.dealership_id.clone(),
                service_codes_requested: service_codes,
                requested_datetime: Utc::now(),
                parts_needed,
                inventory_ok: true,
                estimated_delay_minutes: top.delay_minutes(),
            })
            .await?;

        Ok(TurnOutcome::Booked {
            recommendations: predicted.recommendations,
            rankings: ranking.rankings,
            appointment: booked.appointment,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
