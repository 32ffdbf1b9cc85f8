//! Time-bounded duplicate-suppression cache.

use crate::message::MessageId;
use fnv::FnvHashMap;
use std::time::{Duration, Instant};

/// A mapping from message identifier to insertion time, bounded by a
/// validity window. Entries older than the window are swept lazily on
/// access rather than on a timer, per the design notes.
pub struct DuplicateCache {
    ttl: Duration,
    entries: FnvHashMap<MessageId, Instant>,
}

impl DuplicateCache {
    pub fn new(ttl: Duration) -> Self {
        DuplicateCache {
            ttl,
            entries: FnvHashMap::default(),
        }
    }

    /// Returns true only for entries still inside the validity window.
    pub fn contains(&mut self, id: &MessageId) -> bool {
        self.prune();
        self.entries.contains_key(id)
    }

    /// Inserts `id` with the current time, overwriting any stale entry.
    pub fn insert(&mut self, id: MessageId) {
        self.prune();
        self.entries.insert(id, Instant::now());
    }

    fn prune(&mut self) {
        let ttl = self.ttl;
        let now = Instant::now();
        self.entries.retain(|_, inserted| now.duration_since(*inserted) < ttl);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn id(b: &[u8]) -> MessageId {
        // Reuse Message::id indirectly via a minimal from/seqno split isn't
        // available here (MessageId's constructor is private to message.rs),
        // so build messages instead.
        crate::message::Message {
            from: b.to_vec(),
            data: vec![],
            seqno: vec![],
            hops: 0,
            topic_ids: Default::default(),
        }
        .id()
    }

    #[test]
    fn fresh_entry_is_found() {
        let mut cache = DuplicateCache::new(Duration::from_secs(60));
        let a = id(b"a");
        assert!(!cache.contains(&a));
        cache.insert(a.clone());
        assert!(cache.contains(&a));
    }

    #[test]
    fn expired_entry_is_evicted_on_access() {
        let mut cache = DuplicateCache::new(Duration::from_millis(10));
        let a = id(b"a");
        cache.insert(a.clone());
        assert!(cache.contains(&a));
        sleep(Duration::from_millis(30));
        assert!(!cache.contains(&a));
        assert_eq!(cache.len(), 0);
    }
}
