use super::*;

/// Pending window expirations, ordered by expiry time and then by registration order.
///
/// Besides the queue itself it keeps a *closed horizon*: the highest watermark
/// a sweep has sealed. Anything expiring at or before the horizon was either
/// already drained by that sweep or must be refused, which is what keeps a
/// closed window from being created a second time.
///
/// # Invariant
/// Every registered entry has `expires_at > horizon` at the time of registration.
#[derive(Debug)]
pub struct ExpiryQueue<K> {
    /// (expires_at, seq) -> key
    entries: BTreeMap<(EventTime, u64), K>,
    next_seq: u64,
    horizon: EventTime,
}

impl<K: Clone> ExpiryQueue<K> {
    /// Create an empty queue with no sealed horizon.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
            horizon: EVENT_TIME_MIN,
        }
    }

    /// Register `key` to expire at `expires_at`.
    ///
    /// Returns the sequence number that identifies the entry, or `None` if
    /// `expires_at` is already behind the sealed horizon.
    pub fn register(&mut self, key: K, expires_at: EventTime) -> Option<u64> {
        if self.is_sealed(expires_at) {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((expires_at, seq), key);
        Some(seq)
    }

    /// Remove an entry. No-op if it was not registered.
    pub fn remove(&mut self, expires_at: EventTime, seq: u64) -> Option<K> {
        self.entries.remove(&(expires_at, seq))
    }

    /// Raise the closed horizon to `watermark`. Never lowers it.
    pub fn seal(&mut self, watermark: EventTime) {
        self.horizon = self.horizon.max(watermark);
    }

    /// Whether a window expiring at `expires_at` can no longer be registered.
    pub fn is_sealed(&self, expires_at: EventTime) -> bool {
        expires_at <= self.horizon
    }

    pub fn horizon(&self) -> EventTime {
        self.horizon
    }

    /// Entries with `expires_at <= watermark`, as `(expires_at, seq, key)` in
    /// ascending `(expires_at, seq)` order. The queue is left untouched.
    pub fn due(&self, watermark: EventTime) -> Vec<(EventTime, u64, K)> {
        self.entries
            .range(..=(watermark, u64::MAX))
            .map(|((expires_at, seq), key)| (*expires_at, *seq, key.clone()))
            .collect()
    }

    /// Expiry time of the earliest pending entry.
    pub fn next_expiry(&self) -> Option<EventTime> {
        self.entries.keys().next().map(|(expires_at, _)| *expires_at)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and reset the horizon.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
        self.horizon = EVENT_TIME_MIN;
    }
}

impl<K: Clone> Default for ExpiryQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
