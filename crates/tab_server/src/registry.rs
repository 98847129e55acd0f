//! In-memory table of live sessions and matchmaking.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tab_game::{Session, SessionId};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, RwLock};
use tracing::{debug, info, instrument};

/// A session behind its own lock. Holding the guard serializes every
/// mutation of that one game.
pub type SharedSession = Arc<Mutex<Session>>;

/// A live session with the fields matchmaking filters on. They never
/// change, so reading them needs no session lock.
#[derive(Debug)]
struct Entry {
    shared: SharedSession,
    group: u32,
    columns: usize,
}

#[derive(Debug, Default)]
struct Entries {
    by_id: HashMap<SessionId, Entry>,
    order: Vec<SessionId>,
}

/// Proof that the caller holds the matchmaking gate.
///
/// Only one join can search-or-create at a time, so two players asking for
/// the same (group, columns) never open two half-empty sessions.
#[derive(Debug)]
pub struct Matchmaker<'a> {
    _gate: MutexGuard<'a, ()>,
}

/// Live sessions keyed by id, remembered in creation order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    entries: RwLock<Entries>,
    gate: Mutex<()>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the matchmaking gate.
    pub async fn matchmaker(&self) -> Matchmaker<'_> {
        Matchmaker {
            _gate: self.gate.lock().await,
        }
    }

    /// First session, in creation order, that `nick` may join for
    /// (group, columns). Returned already locked.
    #[instrument(skip(self, _gate))]
    pub async fn find_open(
        &self,
        _gate: &Matchmaker<'_>,
        group: u32,
        columns: usize,
        nick: &str,
    ) -> Option<OwnedMutexGuard<Session>> {
        let candidates: Vec<SharedSession> = {
            let entries = self.entries.read().await;
            entries
                .order
                .iter()
                .filter_map(|id| entries.by_id.get(id))
                .filter(|entry| entry.group == group && entry.columns == columns)
                .map(|entry| entry.shared.clone())
                .collect()
        };

        for shared in candidates {
            let session = shared.lock_owned().await;
            if session.is_open_for(group, columns, nick) {
                debug!(session_id = %session.id(), "Open session found");
                return Some(session);
            }
        }
        None
    }

    /// Adds a session and returns its shared handle.
    #[instrument(skip(self, _gate, session), fields(session_id = %session.id()))]
    pub async fn insert(&self, _gate: &Matchmaker<'_>, session: Session) -> SharedSession {
        self.insert_unchecked(session).await
    }

    async fn insert_unchecked(&self, session: Session) -> SharedSession {
        let id = session.id().clone();
        let (group, columns) = (*session.group(), *session.columns());
        let shared = Arc::new(Mutex::new(session));
        let entry = Entry {
            shared: shared.clone(),
            group,
            columns,
        };
        let mut entries = self.entries.write().await;
        if entries.by_id.insert(id.clone(), entry).is_none() {
            entries.order.push(id);
        }
        shared
    }

    /// Looks up a session by id.
    pub async fn get(&self, id: &str) -> Option<SharedSession> {
        self.entries
            .read()
            .await
            .by_id
            .get(id)
            .map(|entry| entry.shared.clone())
    }

    /// Number of sessions, ended ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.order.len()
    }

    /// Whether no session was ever registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Reloads persisted sessions, oldest first, so matchmaking keeps the
    /// order it had before a restart.
    #[instrument(skip(self, sessions), fields(count = sessions.len()))]
    pub async fn restore(&self, mut sessions: Vec<Session>) -> usize {
        sessions.sort_by(|a, b| {
            a.created_at()
                .cmp(b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        let count = sessions.len();
        for session in sessions {
            self.insert_unchecked(session).await;
        }
        info!(count, "Sessions restored");
        count
    }
}

/// Fresh, unguessable session id: the first 16 bytes of
/// SHA-256(nick, timestamp, random), hex encoded.
pub fn mint_session_id(nick: &str) -> SessionId {
    let seed: u64 = rand::random();
    let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let digest = Sha256::digest(format!("{nick}-{timestamp}-{seed}").as_bytes());
    hex::encode(&digest[..16])
}
