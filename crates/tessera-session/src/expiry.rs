//! Per-key expiry tracking for the in-memory backend.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Deadline used when `now + ttl` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Tracks the deadline of every stored key.
#[derive(Debug, Default)]
pub(crate) struct ExpiryTracker {
    /// Instant after which each key is considered gone.
    deadlines: HashMap<String, Instant>,
}

impl ExpiryTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or reset) the deadline for a key to `now + ttl`.
    ///
    /// A TTL too large for `Instant` is clamped to a deadline a century out.
    pub fn set(&mut self, key: &str, ttl: Duration) {
        let now = Instant::now();
        let deadline = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        self.deadlines.insert(key.to_string(), deadline);
    }

    /// Check if a key has expired.
    ///
    /// Keys without a deadline are treated as expired.
    pub fn is_expired(&self, key: &str) -> bool {
        match self.deadlines.get(key) {
            None => true,
            Some(deadline) => Instant::now() >= *deadline,
        }
    }

    /// Stop tracking a key.
    pub fn remove(&mut self, key: &str) {
        self.deadlines.remove(key);
    }

    /// Remove all expired entries and return their keys.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let now = Instant::now();
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.deadlines.remove(key);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_untracked_key_is_expired() {
        let tracker = ExpiryTracker::new();
        assert!(tracker.is_expired("missing"));
    }

    #[test]
    fn test_set_resets_deadline() {
        let mut tracker = ExpiryTracker::new();
        tracker.set("key-1", Duration::from_millis(50));

        thread::sleep(Duration::from_millis(30));

        // Rewrite extends the deadline
        tracker.set("key-1", Duration::from_millis(50));

        thread::sleep(Duration::from_millis(30));

        assert!(!tracker.is_expired("key-1"));
    }

    #[test]
    fn test_expiration() {
        let mut tracker = ExpiryTracker::new();
        tracker.set("key-1", Duration::from_millis(10));

        thread::sleep(Duration::from_millis(20));

        assert!(tracker.is_expired("key-1"));
    }

    #[test]
    fn test_per_key_ttls() {
        let mut tracker = ExpiryTracker::new();
        tracker.set("short", Duration::from_millis(10));
        tracker.set("long", Duration::from_secs(60));

        thread::sleep(Duration::from_millis(20));

        assert!(tracker.is_expired("short"));
        assert!(!tracker.is_expired("long"));
    }

    #[test]
    fn test_unrepresentable_ttl_is_clamped() {
        let mut tracker = ExpiryTracker::new();
        tracker.set("forever", Duration::MAX);
        tracker.set("long", Duration::from_secs(u64::MAX / 2));

        assert!(!tracker.is_expired("forever"));
        assert!(!tracker.is_expired("long"));
        assert!(tracker.drain_expired().is_empty());
    }

    #[test]
    fn test_drain_expired() {
        let mut tracker = ExpiryTracker::new();
        tracker.set("key-1", Duration::from_millis(10));
        tracker.set("key-2", Duration::from_millis(10));
        tracker.set("key-3", Duration::from_secs(60));

        thread::sleep(Duration::from_millis(20));

        let mut expired = tracker.drain_expired();
        expired.sort();
        assert_eq!(expired, vec!["key-1".to_string(), "key-2".to_string()]);
        assert_eq!(tracker.deadlines.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut tracker = ExpiryTracker::new();
        tracker.set("key-1", Duration::from_secs(60));
        tracker.set("key-2", Duration::from_secs(60));

        tracker.remove("key-1");

        assert_eq!(tracker.deadlines.len(), 1);
        assert!(tracker.is_expired("key-1"));
    }
}
