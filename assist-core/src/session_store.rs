//! Session store: keyed session state plus per-session turn serialization.
//!
//! `SessionStore` is the seam for swapping in a durable backend; the
//! in-memory implementation is enough for a single process.
//!
//! `TurnGate` hands out one async mutex per session id so two messages for
//! the same conversation never run their turns concurrently, while different
//! sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::models::Session;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate and store a fresh idle session.
    async fn create(
        &self,
        customer_id: Option<String>,
        vin: Option<String>,
    ) -> Result<Session, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    /// Replace the stored state for `session.id`. Last write wins.
    async fn upsert(&self, session: Session) -> Result<(), StoreError>;

    /// Drop sessions whose last activity is older than `cutoff`.
    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}

// ============================================================================
// InMemorySessionStore
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        customer_id: Option<String>,
        vin: Option<String>,
    ) -> Result<Session, StoreError> {
        let session = Session::new(customer_id, vin);
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        tracing::debug!(session_id = %session.id, "Session created");
        Ok(session)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn upsert(&self, session: Session) -> Result<(), StoreError> {
        self.sessions.write().await.insert(session.id, session);
        Ok(())
    }

    async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let mut sessions = self.sessions.write().await;
        let stale: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.last_active_at < cutoff)
            .map(|s| s.id)
            .collect();
        for id in &stale {
            sessions.remove(id);
        }
        Ok(stale)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.sessions.read().await.len())
    }
}

// ============================================================================
// TurnGate
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct TurnGate {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl TurnGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `id`. Hold the guard for the whole turn.
    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Forget gates for sessions that no longer exist. A gate currently held
    /// by a turn is kept and its id returned so the caller can retry later.
    pub async fn release(&self, ids: &[Uuid]) -> Vec<Uuid> {
        let mut locks = self.locks.lock().await;
        let mut held = Vec::new();
        for id in ids {
            if let Some(lock) = locks.get(id) {
                if Arc::strong_count(lock) == 1 {
                    locks.remove(id);
                } else {
                    held.push(*id);
                }
            }
        }
        held
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
