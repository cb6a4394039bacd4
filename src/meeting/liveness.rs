//! In-memory last-activity tracking per bot id.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Cloneable handle to the last-activity map.
///
/// Entries are process-local: lost on restart and rebuilt from the next
/// inbound fragment, so the worst case after a crash is one extra idle
/// cycle before a dead meeting is swept. Mutated from every ingest/chat
/// event and read by the sweeper, hence the lock.
#[derive(Clone, Default)]
pub struct LivenessTracker {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity for a bot id, creating the entry on first touch.
    pub fn touch(&self, bot_id: &str) {
        self.lock().insert(bot_id.to_string(), Instant::now());
    }

    pub fn remove(&self, bot_id: &str) {
        self.lock().remove(bot_id);
    }

    pub fn contains(&self, bot_id: &str) -> bool {
        self.lock().contains_key(bot_id)
    }

    /// Bot ids whose last activity is more than `threshold` ago.
    pub fn idle_longer_than(&self, threshold: Duration) -> Vec<String> {
        let now = Instant::now();
        self.lock()
            .iter()
            .filter(|(_, last)| now.duration_since(**last) > threshold)
            .map(|(bot_id, _)| bot_id.clone())
            .collect()
    }

    /// Drop entries for bot ids no longer in `live`. Returns how many were
    /// collected, for sweep logging.
    pub fn retain_known(&self, live: &HashSet<String>) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|bot_id, _| live.contains(bot_id));
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
