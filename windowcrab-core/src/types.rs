use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Event time in milliseconds since epoch.
pub type EventTime = i64;

/// `d` in milliseconds, or `None` if that does not fit in an [`EventTime`].
pub fn duration_millis(d: Duration) -> Option<EventTime> {
    i64::try_from(d.as_millis()).ok()
}

/// A keyed record as seen by the window table.
///
/// Immutable once received: the table only ever moves the payload into a
/// window accumulator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyedRecord<V> {
    pub event_time: EventTime,
    pub partition_key: String,
    pub payload: V,
}

impl<V> KeyedRecord<V> {
    pub fn new(partition_key: impl Into<String>, event_time: EventTime, payload: V) -> Self {
        Self {
            event_time,
            partition_key: partition_key.into(),
            payload,
        }
    }
}

/// Watermark indicates that no elements with timestamp <= this value are expected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    pub timestamp: EventTime,
}

impl Watermark {
    /// Create a new watermark at the given timestamp.
    pub fn new(timestamp: EventTime) -> Self {
        Self { timestamp }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Watermark({}ms)", self.timestamp)
    }
}

/// Identifies one window instance: `(partition key, window start)`.
///
/// Derived from a record's event time, never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub partition_key: String,
    pub window_start: EventTime,
}

impl WindowKey {
    pub fn new(partition_key: impl Into<String>, window_start: EventTime) -> Self {
        Self {
            partition_key: partition_key.into(),
            window_start,
        }
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.partition_key, self.window_start)
    }
}

/// Count summary of one closed window.
///
/// Built once at close time and handed straight to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub window_start: EventTime,
    pub partition_key: String,
    pub count: u64,
}

impl AggregateResult {
    /// Count the records of a closed window.
    pub fn count_of<V>(key: &WindowKey, records: &[V]) -> Self {
        Self {
            window_start: key.window_start,
            partition_key: key.partition_key.clone(),
            count: records.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_key_display() {
        let key = WindowKey::new("k1", 10_000);
        assert_eq!(key.to_string(), "k1@10000");
    }

    #[test]
    fn test_window_key_orders_by_partition_then_start() {
        let mut keys = vec![
            WindowKey::new("k2", 0),
            WindowKey::new("k1", 10),
            WindowKey::new("k1", 0),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                WindowKey::new("k1", 0),
                WindowKey::new("k1", 10),
                WindowKey::new("k2", 0),
            ]
        );
    }

    #[test]
    fn test_aggregate_result_count_of() {
        let key = WindowKey::new("k1", 20_000);
        let result = AggregateResult::count_of(&key, &["a", "b", "c"]);
        assert_eq!(result.partition_key, "k1");
        assert_eq!(result.window_start, 20_000);
        assert_eq!(result.count, 3);
    }

    #[test]
    fn test_aggregate_result_empty_window() {
        let key = WindowKey::new("k1", 0);
        let result = AggregateResult::count_of::<u8>(&key, &[]);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn test_keyed_record_new() {
        let rec = KeyedRecord::new("k1", 999, 3u32);
        assert_eq!(rec.partition_key, "k1");
        assert_eq!(rec.event_time, 999);
        assert_eq!(rec.payload, 3);
    }

    #[test]
    fn test_watermark_display() {
        assert_eq!(Watermark::new(42_000).to_string(), "Watermark(42000ms)");
    }
}
