//! Wire models of the order topics.

use serde::{Deserialize, Serialize};
use windowcrab_core::types::{AggregateResult, EventTime, KeyedRecord};

/// An order placed at a kitchen, as published on the inbound topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Event time of the order (ms since epoch).
    pub date: EventTime,
    pub kitchen: String,
    pub items: u32,
}

impl Order {
    pub fn new(kitchen: impl Into<String>, date: EventTime, items: u32) -> Self {
        Self {
            date,
            kitchen: kitchen.into(),
            items,
        }
    }

    /// Key the order by kitchen at its event time.
    pub fn into_record(self) -> KeyedRecord<Order> {
        KeyedRecord::new(self.kitchen.clone(), self.date, self)
    }
}

/// Number of orders one kitchen received in one window.
///
/// `date` is the window start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggOrder {
    pub date: EventTime,
    pub kitchen: String,
    pub count: u64,
}

impl From<AggregateResult> for AggOrder {
    fn from(result: AggregateResult) -> Self {
        Self {
            date: result.window_start,
            kitchen: result.partition_key,
            count: result.count,
        }
    }
}
