// src/services/session_store.rs
use crate::errors::AdlensError;
use crate::models::AnalysisSession;
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Where submitted analyses live between the analyze and results screens.
/// Every save restarts the session's TTL.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &AnalysisSession) -> Result<(), AdlensError>;
    async fn load(&self, id: &Uuid) -> Result<Option<AnalysisSession>, AdlensError>;
    async fn exists(&self, id: &Uuid) -> Result<bool, AdlensError>;
}

pub struct RedisSessionStore {
    client: Client,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub async fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, AdlensError> {
        let client = Client::open(redis_url).map_err(|e| AdlensError::Redis(e.to_string()))?;

        // Test connection
        let mut conn = client
            .get_async_connection()
            .await
            .map_err(|e| AdlensError::Redis(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AdlensError::Redis(e.to_string()))?;

        Ok(Self { client, ttl_secs })
    }

    fn key(id: &Uuid) -> String {
        format!("session:{}", id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, session: &AnalysisSession) -> Result<(), AdlensError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| AdlensError::Redis(e.to_string()))?;

        let value = serde_json::to_string(session)
            .map_err(|e| AdlensError::Serialization(e.to_string()))?;

        conn.set_ex::<_, _, ()>(Self::key(&session.id), value, self.ttl_secs as usize)
            .await
            .map_err(|e| AdlensError::Redis(e.to_string()))
    }

    async fn load(&self, id: &Uuid) -> Result<Option<AnalysisSession>, AdlensError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| AdlensError::Redis(e.to_string()))?;

        let value: Option<String> = conn
            .get(Self::key(id))
            .await
            .map_err(|e| AdlensError::Redis(e.to_string()))?;

        value
            .map(|value| {
                serde_json::from_str(&value).map_err(|e| AdlensError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn exists(&self, id: &Uuid) -> Result<bool, AdlensError> {
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| AdlensError::Redis(e.to_string()))?;

        conn.exists(Self::key(id))
            .await
            .map_err(|e| AdlensError::Redis(e.to_string()))
    }
}

/// Process-local store used when no Redis URL is configured. Expired entries
/// are evicted on every save and hidden from reads.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, StoredSession>>,
    ttl: Duration,
}

struct StoredSession {
    session: AnalysisSession,
    saved_at: Instant,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn is_live(&self, stored: &StoredSession) -> bool {
        stored.saved_at.elapsed() < self.ttl
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &AnalysisSession) -> Result<(), AdlensError> {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, stored| self.is_live(stored));
        if sessions.len() < before {
            debug!("Evicted {} expired session(s)", before - sessions.len());
        }
        sessions.insert(
            session.id,
            StoredSession {
                session: session.clone(),
                saved_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn load(&self, id: &Uuid) -> Result<Option<AnalysisSession>, AdlensError> {
        let mut sessions = self.sessions.lock();
        let Some(stored) = sessions.get(id) else {
            return Ok(None);
        };
        if self.is_live(stored) {
            return Ok(Some(stored.session.clone()));
        }
        sessions.remove(id);
        Ok(None)
    }

    async fn exists(&self, id: &Uuid) -> Result<bool, AdlensError> {
        Ok(self
            .sessions
            .lock()
            .get(id)
            .is_some_and(|stored| self.is_live(stored)))
    }
}

/// Serializes load-modify-save cycles on one session across every worker of
/// this process. Locks nobody holds are pruned on the next acquire.
#[derive(Debug, Clone, Default)]
pub struct SessionLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
