//! # WindowCrab Core
//!
//! Keyed tumbling event-time windows with watermark-driven expiration.
//!
//! - [`types`] — [`KeyedRecord`](types::KeyedRecord), [`WindowKey`](types::WindowKey),
//!   [`Watermark`](types::Watermark) and [`AggregateResult`](types::AggregateResult).
//! - [`time`] — [`WatermarkTracker`](time::WatermarkTracker) and the expiry queue.
//! - [`window`] — [`TumblingWindowTable`](window::TumblingWindowTable), its sharded
//!   [`WindowIndex`](window::WindowIndex) and the
//!   [`ExpirationDriver`](window::ExpirationDriver) that closes expired windows.
//! - [`bus`] — in-process named topics and the [`Sink`](bus::Sink) trait.
//! - [`state`] — snapshot stores for window tables.
//! - [`config`] / [`error`] — [`WindowConfig`](config::WindowConfig) and
//!   [`WindowError`](error::WindowError).

pub mod bus;
pub mod config;
pub mod error;
pub mod partitioner;
pub mod state;
pub mod time;
pub mod types;
pub mod window;
