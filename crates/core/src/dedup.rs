//! Process-lifetime set of seen content fingerprints

use crate::hash::Fingerprint;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

/// Set of fingerprints already turned into jobs
///
/// Not durable: a restart forgets everything. With a capacity the oldest
/// fingerprint is evicted first, so a document can be re-ingested once enough
/// newer ones have been seen.
pub struct DedupSet {
    capacity: Option<usize>,
    inner: Mutex<Seen>,
}

#[derive(Default)]
struct Seen {
    set: HashSet<Fingerprint>,
    order: VecDeque<Fingerprint>,
}

impl DedupSet {
    /// Unbounded set (grows by one entry per distinct document)
    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            inner: Mutex::new(Seen::default()),
        }
    }

    /// Set holding at most `capacity` fingerprints; 0 means unbounded
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity == 0 {
            return Self::unbounded();
        }
        Self {
            capacity: Some(capacity),
            inner: Mutex::new(Seen::default()),
        }
    }

    /// Record a fingerprint
    ///
    /// Returns `true` if it was not present. Check and insert happen under one
    /// lock, so concurrent callers with the same fingerprint see exactly one
    /// `true`.
    pub fn insert(&self, fingerprint: Fingerprint) -> bool {
        let mut seen = self.inner.lock();
        if !seen.set.insert(fingerprint) {
            return false;
        }

        if let Some(capacity) = self.capacity {
            seen.order.push_back(fingerprint);
            while seen.order.len() > capacity {
                if let Some(evicted) = seen.order.pop_front() {
                    seen.set.remove(&evicted);
                }
            }
        }
        true
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.lock().set.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every fingerprint
    pub fn clear(&self) {
        let mut seen = self.inner.lock();
        seen.set.clear();
        seen.order.clear();
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for DedupSet {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl std::fmt::Debug for DedupSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupSet")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
