//! Window table configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{WindowError, WindowResult};
use crate::types::{duration_millis, EventTime};

/// Default tumbling window length.
pub const DEFAULT_WINDOW_SIZE: Duration = Duration::from_secs(10);
/// Default grace period after a window's end before it closes.
pub const DEFAULT_LATENESS: Duration = Duration::from_secs(1);
/// Default period between expiration sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Sizing and expiry policy of a tumbling window table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Fixed window length.
    pub window_size: Duration,
    /// Grace period after the window end; also subtracted from the watermark.
    pub lateness: Duration,
    /// Expiration sweep period.
    pub cleanup_interval: Duration,
    /// Number of index shards.
    pub partitions: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            lateness: DEFAULT_LATENESS,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            partitions: 1,
        }
    }
}

impl WindowConfig {
    pub fn new(window_size: Duration, lateness: Duration) -> Self {
        Self {
            window_size,
            lateness,
            ..Self::default()
        }
    }

    pub fn with_cleanup_interval(mut self, cleanup_interval: Duration) -> Self {
        self.cleanup_interval = cleanup_interval;
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    /// Window size in ms, saturating at `EventTime::MAX`.
    pub fn window_size_ms(&self) -> EventTime {
        duration_millis(self.window_size).unwrap_or(EventTime::MAX)
    }

    /// Lateness in ms, saturating at `EventTime::MAX`.
    pub fn lateness_ms(&self) -> EventTime {
        duration_millis(self.lateness).unwrap_or(EventTime::MAX)
    }

    /// Reject settings the table cannot run with.
    pub fn validate(&self) -> WindowResult<()> {
        if duration_millis(self.window_size).is_none() {
            return Err(WindowError::InvalidConfig(format!(
                "window_size {:?} does not fit in i64 milliseconds",
                self.window_size
            )));
        }
        if duration_millis(self.lateness).is_none() {
            return Err(WindowError::InvalidConfig(format!(
                "lateness {:?} does not fit in i64 milliseconds",
                self.lateness
            )));
        }
        if self.window_size_ms() <= 0 {
            return Err(WindowError::InvalidConfig(
                "window_size must be at least 1ms".into(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(WindowError::InvalidConfig(
                "cleanup_interval must be non-zero".into(),
            ));
        }
        if self.partitions == 0 {
            return Err(WindowError::InvalidConfig(
                "partitions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_deployment() {
        let config = WindowConfig::default();
        assert_eq!(config.window_size_ms(), 10_000);
        assert_eq!(config.lateness_ms(), 1_000);
        assert_eq!(config.cleanup_interval, Duration::from_secs(1));
        assert_eq!(config.partitions, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = WindowConfig::new(Duration::ZERO, Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(WindowError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_sub_millisecond_window() {
        let config = WindowConfig::new(Duration::from_micros(500), Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_partitions_and_interval() {
        let config = WindowConfig::default().with_partitions(0);
        assert!(config.validate().is_err());
        let config = WindowConfig::default().with_cleanup_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_durations_beyond_i64_millis() {
        let config = WindowConfig::new(Duration::from_secs(10), Duration::from_secs(u64::MAX / 2));
        assert!(matches!(
            config.validate(),
            Err(WindowError::InvalidConfig(_))
        ));
        // Never wraps to a negative offset.
        assert_eq!(config.lateness_ms(), EventTime::MAX);

        let config = WindowConfig::new(Duration::from_secs(u64::MAX), Duration::ZERO);
        assert!(config.validate().is_err());
        assert_eq!(config.window_size_ms(), EventTime::MAX);
    }

    #[test]
    fn test_validate_accepts_largest_millisecond_lateness() {
        let config = WindowConfig::new(
            Duration::from_secs(10),
            Duration::from_millis(i64::MAX as u64),
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.lateness_ms(), i64::MAX);
    }

    #[test]
    fn test_zero_lateness_is_allowed() {
        let config = WindowConfig::new(Duration::from_secs(5), Duration::ZERO);
        assert!(config.validate().is_ok());
        assert_eq!(config.lateness_ms(), 0);
    }
}
