use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::consultation::{Consultant, ConsultationSession};

/// A session handle. Turns of one conversation serialize on the lock;
/// different conversations never contend.
pub type SharedSession = Arc<Mutex<ConsultationSession>>;

/// Trait for storing and retrieving consultation sessions by conversation id
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn get(&self, id: &str) -> Option<SharedSession>;
    /// Returns the session for `id`, creating a fresh one on first use.
    async fn get_or_create(&self, id: &str) -> SharedSession;
    async fn delete(&self, id: &str);
    async fn len(&self) -> usize;
    /// Drops sessions idle for longer than the storage's TTL. Returns how many went.
    async fn purge_idle(&self) -> usize;
}

struct SessionEntry {
    session: SharedSession,
    last_active: Instant,
}

/// In-memory implementation of SessionStorage.
///
/// Sessions idle past `idle_ttl` are removed by [`SessionStorage::purge_idle`],
/// and creating a session at `max_sessions` evicts the least recently active one.
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, SessionEntry>>,
    consultant: Arc<Consultant>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl InMemorySessionStorage {
    pub fn new(consultant: Arc<Consultant>, idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            consultant,
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    fn touch(&self, id: &str) -> Option<SharedSession> {
        self.sessions.get_mut(id).map(|mut entry| {
            entry.last_active = Instant::now();
            entry.session.clone()
        })
    }

    fn evict_least_recent(&self) {
        // The iterator's shard guards must be gone before `remove`.
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.last_active)
            .map(|entry| entry.key().clone());

        if let Some(id) = oldest {
            self.sessions.remove(&id);
            info!(
                session_id = %id,
                max_sessions = self.max_sessions,
                "Evicted least recently active session"
            );
        }
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn get(&self, id: &str) -> Option<SharedSession> {
        self.touch(id)
    }

    async fn get_or_create(&self, id: &str) -> SharedSession {
        if let Some(session) = self.touch(id) {
            return session;
        }
        if self.sessions.len() >= self.max_sessions {
            self.evict_least_recent();
        }

        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| SessionEntry {
                session: Arc::new(Mutex::new(ConsultationSession::new(
                    id,
                    self.consultant.clone(),
                ))),
                last_active: Instant::now(),
            })
            .session
            .clone()
    }

    async fn delete(&self, id: &str) {
        self.sessions.remove(id);
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }

    async fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.sessions.retain(|id, entry| {
            // A handle held outside the map means a turn is still running.
            let keep = Arc::strong_count(&entry.session) > 1
                || now.duration_since(entry.last_active) < self.idle_ttl;
            if !keep {
                debug!(session_id = %id, "Dropping idle session");
                removed += 1;
            }
            keep
        });
        removed
    }
}

/// Periodically purges idle sessions until the runtime shuts down.
pub fn spawn_session_sweeper(
    sessions: Arc<dyn SessionStorage>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sessions.purge_idle().await;
            if removed > 0 {
                let remaining = sessions.len().await;
                info!(removed, remaining, "Purged idle sessions");
            }
        }
    })
}
