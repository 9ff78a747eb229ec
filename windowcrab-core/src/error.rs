//! Error taxonomy of the window engine.
//!
//! Nothing in here is fatal: ingest and the expiration sweep report the error
//! and keep going with the next record or window.

use crate::types::EventTime;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    /// The record's window had already expired relative to the watermark.
    #[error(
        "late record for {partition_key}: window {window_start} expired at {expires_at}, watermark is {watermark}"
    )]
    LateRecord {
        partition_key: String,
        window_start: EventTime,
        expires_at: EventTime,
        watermark: EventTime,
    },

    /// Append or create against a window that was already closed or evicted.
    #[error("unknown window {partition_key}@{window_start}: already closed or evicted")]
    UnknownWindow {
        partition_key: String,
        window_start: EventTime,
    },

    /// The close callback failed (returned an error or panicked).
    #[error("close callback failed for {partition_key}@{window_start}: {reason}")]
    CallbackFailure {
        partition_key: String,
        window_start: EventTime,
        reason: String,
    },

    /// A sink could not queue a value for delivery.
    #[error("failed to enqueue onto topic {topic}: {reason}")]
    SinkEnqueue { topic: String, reason: String },

    /// The record's window bounds do not fit in an `i64`.
    #[error("event time {event_time} of {partition_key} has no representable window")]
    EventTimeOutOfRange {
        partition_key: String,
        event_time: EventTime,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("window state error: {0}")]
    State(String),
}

impl WindowError {
    /// True for the two rejection kinds caused by a record arriving too late.
    pub fn is_late(&self) -> bool {
        matches!(
            self,
            WindowError::LateRecord { .. } | WindowError::UnknownWindow { .. }
        )
    }
}

pub type WindowResult<T> = std::result::Result<T, WindowError>;
