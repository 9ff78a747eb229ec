use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::types::{duration_millis, EventTime, Watermark};

mod expiry_queue;
mod watermark;

pub use expiry_queue::*;
pub use watermark::*;

#[cfg(test)]
#[path = "tests/time_tests.rs"]
mod tests;
