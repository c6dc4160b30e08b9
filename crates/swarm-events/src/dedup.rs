//! Bounded duplicate suppression keyed on raw payload identity.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use tracing::debug;

/// Seen-set size after which the window is cleared in full.
pub const DEFAULT_DEDUP_CAPACITY: usize = 5000;

type PayloadDigest = [u8; 32];

/// Seen-set over exact serialized payloads.
///
/// Two deliveries with byte-identical text are the same event. Once the set
/// holds more than `capacity` digests it is emptied before the next
/// admission; a duplicate that arrives right after a clear is admitted again.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    seen: HashSet<PayloadDigest>,
    capacity: usize,
    clears: u64,
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            capacity,
            clears: 0,
        }
    }

    /// Record `raw` and return `true` if it was not seen in the current window.
    pub fn admit(&mut self, raw: &str) -> bool {
        let digest = digest(raw);
        if self.seen.contains(&digest) {
            debug!(digest = %hex::encode(&digest[..8]), "duplicate payload suppressed");
            return false;
        }
        if self.seen.len() > self.capacity {
            debug!(
                entries = self.seen.len(),
                capacity = self.capacity,
                "dedup window cleared"
            );
            self.seen.clear();
            self.clears = self.clears.saturating_add(1);
        }
        self.seen.insert(digest);
        true
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.seen.contains(&digest(raw))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of full clears since creation.
    pub fn clears(&self) -> u64 {
        self.clears
    }
}

fn digest(raw: &str) -> PayloadDigest {
    Sha256::digest(raw.as_bytes()).into()
}
