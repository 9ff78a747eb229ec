//! # WindowCrab API
//!
//! Windowed order aggregation on top of `windowcrab-core`: orders keyed by
//! kitchen are counted per tumbling event-time window and each count is
//! published when its window closes.
//!
//! ```rust,no_run
//! use windowcrab_api::{AggOrder, AppConfig, Order, WindowedApp};
//! use windowcrab_core::bus::CollectingSink;
//!
//! let results = CollectingSink::<AggOrder>::new();
//! let app = WindowedApp::new(AppConfig::default(), results.clone())?.start()?;
//! let source = app.source();
//! source.send(Order::new("k1", 2_000, 3))?;
//! let _report = app.shutdown()?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! - [`models`] — [`Order`] and [`AggOrder`].
//! - [`config`] — [`AppConfig`] and [`LateDataPolicy`].
//! - [`agent`] — [`AggregationAgent`] and the [`OrderCountHandler`] close callback.
//! - [`app`] — [`WindowedApp`]: ingest and expiration threads plus state restore.

pub mod agent;
pub mod app;
pub mod config;
pub mod models;

pub use agent::{count_orders, AgentStats, AgentStatsSnapshot, AggregationAgent, OrderCountHandler};
pub use app::{AppReport, RunningApp, WindowedApp};
pub use config::{AppConfig, LateDataPolicy};
pub use models::{AggOrder, Order};

pub use windowcrab_core;
