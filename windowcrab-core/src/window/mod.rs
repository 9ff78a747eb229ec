use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::WindowConfig;
use crate::error::{WindowError, WindowResult};
use crate::partitioner::{HashPartitioner, Partitioner};
use crate::time::{ExpiryQueue, WatermarkTracker, EVENT_TIME_MIN};
use crate::types::{duration_millis, EventTime, KeyedRecord, Watermark, WindowKey};

mod assigners;
mod driver;
mod functions;
mod index;
mod primitives;
mod table;

pub use assigners::*;
pub use driver::*;
pub use functions::*;
pub use index::*;
pub use primitives::*;
pub use table::*;

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/index_tests.rs"]
mod index_tests;

#[cfg(test)]
#[path = "tests/driver_tests.rs"]
mod driver_tests;
