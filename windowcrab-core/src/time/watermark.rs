use super::*;

/// Minimum possible event time. Used as the initial "no watermark" sentinel.
pub const EVENT_TIME_MIN: EventTime = i64::MIN;

/// Event-time high-water mark shared by the ingest path and the expiration sweep.
///
/// The watermark is `max_seen_timestamp - lateness`: the table waits
/// `lateness` past the newest event before treating earlier time as complete.
///
/// Only the ingest path advances it; any thread may read it. Updates are a
/// single atomic `fetch_max`, so a reader can be one update behind but never
/// observes the watermark moving backwards.
#[derive(Debug)]
pub struct WatermarkTracker {
    lateness_ms: i64,
    current: AtomicI64,
}

impl WatermarkTracker {
    /// Create a tracker with no watermark yet.
    ///
    /// A lateness beyond `i64::MAX` ms saturates.
    pub fn new(lateness: Duration) -> Self {
        Self {
            lateness_ms: duration_millis(lateness).unwrap_or(EventTime::MAX),
            current: AtomicI64::new(EVENT_TIME_MIN),
        }
    }

    /// Observe an event time.
    ///
    /// Returns `Some(watermark)` if the watermark advanced, `None` if the event
    /// was older than what has already been seen.
    pub fn advance(&self, event_time: EventTime) -> Option<Watermark> {
        self.observe_watermark(event_time.saturating_sub(self.lateness_ms))
    }

    /// Move the watermark to at least `timestamp`, bypassing the lateness offset.
    ///
    /// Used when restoring a persisted table.
    pub fn observe_watermark(&self, timestamp: EventTime) -> Option<Watermark> {
        let previous = self.current.fetch_max(timestamp, Ordering::AcqRel);
        (timestamp > previous).then(|| Watermark::new(timestamp))
    }

    /// Current watermark timestamp, `EVENT_TIME_MIN` until the first event.
    pub fn current(&self) -> EventTime {
        self.current.load(Ordering::Acquire)
    }

    /// Current watermark, or `None` if no event has been observed yet.
    pub fn current_watermark(&self) -> Option<Watermark> {
        match self.current() {
            EVENT_TIME_MIN => None,
            ts => Some(Watermark::new(ts)),
        }
    }

    pub fn lateness_ms(&self) -> i64 {
        self.lateness_ms
    }
}
