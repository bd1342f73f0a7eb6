//! Presence registry: which participants currently hold a chat connection.
//!
//! A participant may have several connections open (two tabs, a phone and a
//! laptop). Presence is a multiset: each connection increments a counter and
//! the participant is offline only once the last one closes.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mymind_types::participant::ParticipantId;

/// Tracks live chat connections per participant.
pub trait PresenceRegistry: Send + Sync {
    fn mark_connected(&self, id: &ParticipantId);

    /// Drop one connection. Returns `true` if it was the participant's last.
    ///
    /// Unknown ids are a no-op returning `false`.
    fn mark_disconnected(&self, id: &ParticipantId) -> bool;

    fn is_connected(&self, id: &ParticipantId) -> bool;
}

/// Process-local registry backed by a sharded map.
#[derive(Debug, Default)]
pub struct InMemoryPresence {
    connections: DashMap<ParticipantId, usize>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of participants with at least one connection.
    pub fn online_count(&self) -> usize {
        self.connections.len()
    }
}

impl PresenceRegistry for InMemoryPresence {
    fn mark_connected(&self, id: &ParticipantId) {
        *self.connections.entry(*id).or_insert(0) += 1;
    }

    fn mark_disconnected(&self, id: &ParticipantId) -> bool {
        match self.connections.entry(*id) {
            Entry::Occupied(mut entry) => {
                if *entry.get() <= 1 {
                    entry.remove();
                    true
                } else {
                    *entry.get_mut() -= 1;
                    false
                }
            }
            Entry::Vacant(_) => false,
        }
    }

    fn is_connected(&self, id: &ParticipantId) -> bool {
        self.connections.contains_key(id)
    }
}
