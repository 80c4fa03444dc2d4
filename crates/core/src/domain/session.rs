use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::product::ProductId;

/// Mutable per-conversation search state. The page cursor and seen-set live
/// in one unit so a turn can read-modify-write them under a single lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    /// Current pagination cursor, starting at 1.
    pub page: u32,
    /// The query the cursor and seen-set belong to.
    pub last_query: Option<String>,
    /// Product identifiers already surfaced for the current query context.
    pub seen: HashSet<ProductId>,
}

impl SessionState {
    pub fn new() -> Self {
        Self { page: 1, last_query: None, seen: HashSet::new() }
    }

    /// A topic change forgets prior exclusions: cursor back to page 1, seen-set
    /// cleared, new query recorded.
    pub fn reset_for_query(&mut self, query: &str) {
        self.page = 1;
        self.seen.clear();
        self.last_query = Some(query.to_string());
    }

    pub fn mark_seen<'a>(&mut self, products: impl IntoIterator<Item = &'a ProductId>) {
        self.seen.extend(products.into_iter().copied());
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one session's state. Holding the lock for the duration of a turn
/// serializes concurrent messages on the same session identifier.
pub type SessionHandle = Arc<tokio::sync::Mutex<SessionState>>;

struct SessionEntry {
    handle: SessionHandle,
    last_touched: Instant,
}

/// Bounded get-or-create cache of session state, keyed by the caller-supplied
/// session identifier. Entries expire after `ttl` of inactivity and the least
/// recently touched entry is evicted when `capacity` is reached.
pub struct SessionStore {
    inner: Mutex<HashMap<String, SessionEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { inner: Mutex::new(HashMap::new()), capacity: capacity.max(1), ttl }
    }

    pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let mut entries = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.last_touched) < self.ttl);

        if let Some(entry) = entries.get_mut(session_id) {
            entry.last_touched = now;
            return entry.handle.clone();
        }

        if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_touched)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                entries.remove(&id);
            }
        }

        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(SessionState::new()));
        entries.insert(
            session_id.to_string(),
            SessionEntry { handle: handle.clone(), last_touched: now },
        );
        handle
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(session_id)
    }
}
