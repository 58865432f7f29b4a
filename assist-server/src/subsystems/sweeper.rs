//! Idle session eviction.
//!
//! Only runs when `sessions.idle_ttl_minutes` is set. Each sweep drops
//! sessions whose last turn is older than the TTL and forgets their turn
//! gates. A gate still held by an in-flight turn is carried to the next sweep
//! and released then if its session did not come back.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use assist_core::config::SessionConfig;
use assist_core::session_store::{SessionStore, TurnGate};

// ============================================================================
// PUBLIC API
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub remaining: usize,
    /// Gates left for the next sweep because a turn still held them.
    pub deferred: usize,
}

/// One sweep: evict sessions idle for longer than `ttl`.
///
/// `deferred` holds gate ids that could not be released on an earlier sweep.
/// It is rewritten with the ids still held after this one.
pub async fn sweep_idle_sessions(
    store: &dyn SessionStore,
    gate: &TurnGate,
    ttl: chrono::Duration,
    deferred: &mut Vec<Uuid>,
) -> Result<SweepReport> {
    let cutoff = Utc::now() - ttl;
    let mut releasable = store.evict_idle(cutoff).await?;
    let evicted = releasable.len();

    // A deferred session that was written back by its turn keeps its gate.
    for id in deferred.iter() {
        if store.get(*id).await?.is_none() && !releasable.contains(id) {
            releasable.push(*id);
        }
    }
    *deferred = gate.release(&releasable).await;

    Ok(SweepReport {
        evicted,
        remaining: store.len().await?,
        deferred: deferred.len(),
    })
}

/// Called from main.rs when an idle TTL is configured.
pub async fn run_session_sweeper(
    store: Arc<dyn SessionStore>,
    gate: TurnGate,
    config: SessionConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let Some(ttl_minutes) = config.idle_ttl_minutes else {
        tracing::debug!("Session sweeper disabled (no idle TTL)");
        return;
    };
    let ttl = chrono::Duration::minutes(ttl_minutes as i64);

    let interval = tokio::time::Duration::from_secs(config.sweep_interval_seconds.max(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut deferred = Vec::new();

    tracing::info!(
        "Session sweeper started (ttl: {}min, interval: {}s)",
        ttl_minutes,
        config.sweep_interval_seconds
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep_idle_sessions(store.as_ref(), &gate, ttl, &mut deferred).await {
                    Ok(report) if report.evicted > 0 => {
                        tracing::info!(
                            evicted = report.evicted,
                            remaining = report.remaining,
                            deferred = report.deferred,
                            "Idle sessions evicted"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Session sweep error (non-fatal): {}", e),
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Session sweeper shutting down");
                break;
            }
        }
    }
}
