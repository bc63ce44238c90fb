//! In-memory record of messages already turned into events, per channel.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Per-channel set of message ids already emitted as events.
///
/// Grows without bound until explicitly cleared; a process restart resets
/// all history. Owned by the app state and shared behind an `Arc`, never a
/// process-wide global. The lock is only held for map operations.
#[derive(Debug, Default)]
pub struct SeenStore {
    seen: Mutex<HashMap<String, HashSet<String>>>,
}

impl SeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a message has not been emitted for this channel yet.
    pub fn is_new(&self, channel_id: &str, message_id: &str) -> bool {
        let seen = self.seen.lock().unwrap();
        seen.get(channel_id)
            .is_none_or(|ids| !ids.contains(message_id))
    }

    /// Record a message as emitted. Idempotent.
    pub fn mark_seen(&self, channel_id: &str, message_id: &str) {
        let mut seen = self.seen.lock().unwrap();
        seen.entry(channel_id.to_string())
            .or_default()
            .insert(message_id.to_string());
    }

    /// Number of recorded messages for one channel.
    pub fn seen_count(&self, channel_id: &str) -> usize {
        let seen = self.seen.lock().unwrap();
        seen.get(channel_id).map_or(0, HashSet::len)
    }

    /// Recorded message counts per channel, for the health report.
    pub fn counts(&self) -> HashMap<String, usize> {
        let seen = self.seen.lock().unwrap();
        seen.iter().map(|(id, ids)| (id.clone(), ids.len())).collect()
    }

    /// Drop recorded history for one channel, or for all channels when
    /// `None`. Returns how many channel entries were dropped.
    pub fn clear(&self, channel_id: Option<&str>) -> usize {
        let mut seen = self.seen.lock().unwrap();
        match channel_id {
            Some(id) => seen.remove(id).map_or(0, |_| 1),
            None => {
                let dropped = seen.len();
                seen.clear();
                dropped
            }
        }
    }
}
