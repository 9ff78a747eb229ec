use super::*;

/// A half-open event-time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: EventTime,
    pub end: EventTime,
}

impl TimeWindow {
    pub fn new(start: EventTime, end: EventTime) -> Self {
        Self { start, end }
    }

    /// Return true if `timestamp` falls inside this window.
    pub fn contains(&self, timestamp: EventTime) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TimeWindow([{}, {}))", self.start, self.end)
    }
}

/// Metadata of one window held by the [`WindowIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub key: WindowKey,
    pub expires_at: EventTime,
    /// Records accumulated at the time the info was taken.
    pub len: usize,
}

/// Point-in-time copy of a window's accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot<V> {
    pub key: WindowKey,
    pub expires_at: EventTime,
    pub records: Vec<V>,
    pub closed: bool,
}
