//! Per-meeting serialized transcript appends.

use crate::db::MeetingStore;
use crate::transcript::TranscriptEntry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

/// Serializes appends per meeting id.
///
/// tokio's async `Mutex` wakes waiters in FIFO order, so entries land in
/// acceptance order even when deliveries for the same meeting overlap.
/// The storage write is itself a single atomic UPDATE, so the lock exists
/// only to pin ordering, not to prevent lost updates.
#[derive(Clone)]
pub struct TranscriptAppender {
    store: MeetingStore,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TranscriptAppender {
    pub fn new(store: MeetingStore) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Append one line to a meeting's transcript.
    ///
    /// Returns false (never errors) when the meeting id is unknown or the
    /// write fails, so callers can log and continue.
    pub async fn append(&self, meeting_id: &str, text_line: &str) -> bool {
        let lock = self.lock_for(meeting_id);
        let _guard = lock.lock().await;

        // Timestamp after the lock is held so stored timestamps follow
        // acceptance order.
        let entry = TranscriptEntry::new(text_line);

        match self.store.append_transcript(meeting_id, &entry).await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Transcript append skipped, unknown meeting {}", meeting_id);
                false
            }
            Err(e) => {
                error!("Transcript append failed for {}: {:#}", meeting_id, e);
                false
            }
        }
    }

    /// Drop lock entries for meetings no longer in `keep`.
    pub fn retain(&self, keep: &HashSet<String>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|meeting_id, _| keep.contains(meeting_id));
    }

    pub fn tracked_meetings(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn lock_for(&self, meeting_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(meeting_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
