//! Redelivery suppression for webhook messages

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long a message key is remembered (5 minutes)
const DEDUP_TTL_SECS: u64 = 300;

/// Maximum remembered keys
const DEDUP_MAX_ENTRIES: usize = 2000;

/// Platform message-id cache
///
/// Platforms retry webhooks they consider failed or slow; the same message
/// can arrive more than once. Keys seen within the TTL are reported as
/// duplicates. Best-effort and in-memory only.
#[derive(Debug)]
pub struct MessageDedup {
    seen: HashMap<String, Instant>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for MessageDedup {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEDUP_TTL_SECS), DEDUP_MAX_ENTRIES)
    }
}

impl MessageDedup {
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Record `key`, returning `true` if it was already seen within the TTL
    pub fn is_duplicate(&mut self, key: &str) -> bool {
        let now = Instant::now();

        if let Some(ts) = self.seen.get(key) {
            if now.duration_since(*ts) < self.ttl {
                return true;
            }
        }

        if self.seen.len() >= self.max_entries {
            self.seen.retain(|_, ts| now.duration_since(*ts) < self.ttl);
        }

        // Still full: drop the oldest key
        if self.seen.len() >= self.max_entries {
            if let Some(oldest) = self
                .seen
                .iter()
                .min_by_key(|(_, ts)| **ts)
                .map(|(k, _)| k.clone())
            {
                self.seen.remove(&oldest);
            }
        }

        self.seen.insert(key.to_string(), now);
        false
    }
}
