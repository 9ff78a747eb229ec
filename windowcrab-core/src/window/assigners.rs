use super::*;

/// Fixed-size, non-overlapping event-time windows aligned to multiples of `size`.
#[derive(Debug, Clone, Copy)]
pub struct TumblingEventTimeWindows {
    size_ms: i64,
}

impl TumblingEventTimeWindows {
    /// Create tumbling windows of the given `size`.
    ///
    /// A size beyond `i64::MAX` ms saturates.
    pub fn of(size: Duration) -> Self {
        Self {
            size_ms: duration_millis(size).unwrap_or(EventTime::MAX),
        }
    }

    pub fn size_ms(&self) -> i64 {
        self.size_ms
    }

    /// Start of the window containing `timestamp`: `floor(timestamp / size) * size`.
    ///
    /// Uses euclidean remainder so negative timestamps round down as well.
    /// `None` if the start is below `i64::MIN`.
    pub fn window_start(&self, timestamp: EventTime) -> Option<EventTime> {
        timestamp.checked_sub(timestamp.rem_euclid(self.size_ms))
    }

    /// The window containing `timestamp`, or `None` if either bound is not
    /// representable as an `i64`.
    pub fn assign_window(&self, timestamp: EventTime) -> Option<TimeWindow> {
        let start = self.window_start(timestamp)?;
        let end = start.checked_add(self.size_ms)?;
        Some(TimeWindow::new(start, end))
    }
}
