//! In-memory session table.
//!
//! Sessions are kept in recency order: every field access moves a session to
//! the most-recently-used end, so garbage collection only ever has to look at
//! a prefix of the table starting from the least-recently-used end.

mod gc;

pub use gc::GcHandle;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;

const SESSION_ID_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

struct Entry {
    values: HashMap<String, Value>,
    last_access: Instant,
    /// Position in `Table::recency`.
    order: u64,
}

#[derive(Default)]
struct Table {
    entries: HashMap<String, Entry>,
    /// touch counter -> session id, least recently used first
    recency: BTreeMap<u64, String>,
    next_order: u64,
}

impl Table {
    fn bump(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    fn insert(&mut self, sid: &str) {
        let order = self.bump();
        self.entries.insert(
            sid.to_string(),
            Entry {
                values: HashMap::new(),
                last_access: Instant::now(),
                order,
            },
        );
        self.recency.insert(order, sid.to_string());
    }

    /// Mark `sid` as just used and hand back its entry.
    fn touch(&mut self, sid: &str) -> Option<&mut Entry> {
        let order = self.bump();
        let entry = self.entries.get_mut(sid)?;
        self.recency.remove(&entry.order);
        self.recency.insert(order, sid.to_string());
        entry.order = order;
        entry.last_access = Instant::now();
        Some(entry)
    }

    fn remove(&mut self, sid: &str) -> bool {
        match self.entries.remove(sid) {
            Some(entry) => {
                self.recency.remove(&entry.order);
                true
            }
            None => false,
        }
    }

    /// Evict from the least-recently-used end until a live session is found.
    fn expire(&mut self, now: Instant, max_lifetime: Duration) -> usize {
        let mut evicted = 0;
        loop {
            let Some((&order, sid)) = self.recency.first_key_value() else {
                break;
            };
            let expired = self
                .entries
                .get(sid)
                .map_or(true, |e| now.saturating_duration_since(e.last_access) > max_lifetime);
            if !expired {
                break;
            }
            let sid = sid.clone();
            self.recency.remove(&order);
            self.entries.remove(&sid);
            evicted += 1;
        }
        evicted
    }
}

/// Shared, lock-guarded session table. Clones share the same table.
#[derive(Clone, Default)]
pub struct SessionStore {
    table: Arc<Mutex<Table>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the tracked session for `sid`, or start an empty one under that id.
    /// An existing session keeps its fields.
    pub fn start_or_create(&self, sid: &str) -> Session {
        let mut table = self.table.lock();
        if table.touch(sid).is_none() {
            table.insert(sid);
            tracing::debug!("Started session {}", sid);
        }
        Session {
            id: sid.to_string(),
            store: self.clone(),
        }
    }

    /// Start a session under a freshly generated id.
    pub fn create(&self) -> Session {
        let sid = generate_session_id();
        self.start_or_create(&sid)
    }

    /// Look up a tracked session. Never creates one.
    pub fn read(&self, sid: &str) -> Result<Session, SessionError> {
        let table = self.table.lock();
        if table.entries.contains_key(sid) {
            Ok(Session {
                id: sid.to_string(),
                store: self.clone(),
            })
        } else {
            Err(SessionError::NotFound(sid.to_string()))
        }
    }

    /// Look up a tracked session and mark it as just used, under one lock.
    /// `None` if the id is unknown or already evicted; never creates.
    pub fn resume(&self, sid: &str) -> Option<Session> {
        self.table.lock().touch(sid)?;
        Some(Session {
            id: sid.to_string(),
            store: self.clone(),
        })
    }

    /// Forget a session. Unknown ids are ignored.
    pub fn destroy(&self, sid: &str) {
        if self.table.lock().remove(sid) {
            tracing::debug!("Destroyed session {}", sid);
        }
    }

    /// Evict every session idle for longer than `max_lifetime`. Returns how
    /// many were evicted.
    pub fn run_gc(&self, max_lifetime: Duration) -> usize {
        self.gc_at(Instant::now(), max_lifetime)
    }

    pub(crate) fn gc_at(&self, now: Instant, max_lifetime: Duration) -> usize {
        let evicted = self.table.lock().expire(now, max_lifetime);
        if evicted > 0 {
            tracing::info!("Session GC evicted {} sessions", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session.
    pub fn clear(&self) {
        let mut table = self.table.lock();
        table.entries.clear();
        table.recency.clear();
    }

    pub fn last_access(&self, sid: &str) -> Option<Instant> {
        self.table.lock().entries.get(sid).map(|e| e.last_access)
    }

    /// Session ids from least to most recently used.
    pub fn ids_by_recency(&self) -> Vec<String> {
        self.table.lock().recency.values().cloned().collect()
    }

    fn with_entry<T>(&self, sid: &str, f: impl FnOnce(&mut Entry) -> T) -> Result<T, SessionError> {
        let mut table = self.table.lock();
        let entry = table
            .touch(sid)
            .ok_or_else(|| SessionError::NotFound(sid.to_string()))?;
        Ok(f(entry))
    }
}

/// Handle to one session. Every handle for the same id sees the same fields.
#[derive(Clone)]
pub struct Session {
    id: String,
    store: SessionStore,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), SessionError> {
        let value = value.into();
        self.store.with_entry(&self.id, |entry| {
            entry.values.insert(key.to_string(), value);
        })
    }

    /// `None` when the key is unset or the session is gone.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store
            .with_entry(&self.id, |entry| entry.values.get(key).cloned())
            .ok()
            .flatten()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.store.with_entry(&self.id, |entry| {
            entry.values.remove(key);
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}

/// Generate a random 32-character alphanumeric session id.
fn generate_session_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
