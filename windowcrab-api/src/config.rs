//! Application configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use windowcrab_core::bus::DEFAULT_TOPIC_CAPACITY;
use windowcrab_core::config::WindowConfig;
use windowcrab_core::error::{WindowError, WindowResult};

pub const DEFAULT_APP_ID: &str = "windowed-agg";
pub const DEFAULT_BROKER_ADDRESS: &str = "kafka://localhost:9092";
pub const DEFAULT_SOURCE_TOPIC: &str = "event-orders";
pub const DEFAULT_SINK_TOPIC: &str = "event-orders-agg";
pub const DEFAULT_DEAD_LETTER_TOPIC: &str = "event-orders-late";
pub const DEFAULT_TABLE_NAME: &str = "tumbling_table";

/// What happens to an order rejected as late.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateDataPolicy {
    /// Log, count and discard.
    #[default]
    Drop,
    /// Log, count and republish on the dead-letter topic.
    DeadLetter,
}

impl FromStr for LateDataPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "dead-letter" | "dead_letter" | "deadletter" => Ok(Self::DeadLetter),
            other => Err(format!(
                "unknown late data policy '{other}', expected 'drop' or 'dead-letter'"
            )),
        }
    }
}

impl fmt::Display for LateDataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("drop"),
            Self::DeadLetter => f.write_str("dead-letter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_id: String,
    /// Broker the topics would live on. Topics are in-process; this is
    /// reported at startup only.
    pub broker_address: String,
    pub source_topic: String,
    pub sink_topic: String,
    pub dead_letter_topic: String,
    pub table_name: String,
    /// Capacity of each bounded topic.
    pub channel_capacity: usize,
    pub late_data_policy: LateDataPolicy,
    pub window: WindowConfig,
    /// Directory for table snapshots. `None` keeps state in memory only.
    pub state_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            broker_address: DEFAULT_BROKER_ADDRESS.to_string(),
            source_topic: DEFAULT_SOURCE_TOPIC.to_string(),
            sink_topic: DEFAULT_SINK_TOPIC.to_string(),
            dead_letter_topic: DEFAULT_DEAD_LETTER_TOPIC.to_string(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            channel_capacity: DEFAULT_TOPIC_CAPACITY,
            late_data_policy: LateDataPolicy::default(),
            window: WindowConfig::default(),
            state_path: None,
        }
    }
}

impl AppConfig {
    pub fn with_window(mut self, window: WindowConfig) -> Self {
        self.window = window;
        self
    }

    pub fn with_late_data_policy(mut self, policy: LateDataPolicy) -> Self {
        self.late_data_policy = policy;
        self
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn validate(&self) -> WindowResult<()> {
        self.window.validate()?;
        if self.channel_capacity == 0 {
            return Err(WindowError::InvalidConfig(
                "channel_capacity must be at least 1".into(),
            ));
        }
        if self.table_name.is_empty() {
            return Err(WindowError::InvalidConfig(
                "table_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}
