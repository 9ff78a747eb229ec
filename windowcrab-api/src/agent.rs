//! The order aggregation agent: ingest side and close callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{select, Receiver};
use tracing::{debug, info, warn};
use windowcrab_core::bus::{Sink, TopicReceiver};
use windowcrab_core::error::{WindowError, WindowResult};
use windowcrab_core::types::{AggregateResult, WindowKey};
use windowcrab_core::window::{TumblingWindowTable, WindowCloseHandler};

use crate::models::{AggOrder, Order};

/// Running counters of an [`AggregationAgent`] and its close callback.
#[derive(Debug, Default)]
pub struct AgentStats {
    accepted: AtomicU64,
    late: AtomicU64,
    unknown: AtomicU64,
    dead_lettered: AtomicU64,
    emitted: AtomicU64,
    enqueue_failures: AtomicU64,
}

/// Point-in-time copy of [`AgentStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AgentStatsSnapshot {
    /// Orders added to a window.
    pub accepted: u64,
    /// Orders rejected with `LateRecord`.
    pub late: u64,
    /// Orders rejected with `UnknownWindow`.
    pub unknown: u64,
    /// Rejected orders republished on the dead-letter topic.
    pub dead_lettered: u64,
    /// Aggregates handed to the sink.
    pub emitted: u64,
    /// Aggregates or dead letters the sink refused.
    pub enqueue_failures: u64,
}

impl AgentStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AgentStatsSnapshot {
        AgentStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            late: self.late.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
        }
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Count the orders of a closed window.
pub fn count_orders(key: &WindowKey, orders: &[Order]) -> AggOrder {
    AggOrder::from(AggregateResult::count_of(key, orders))
}

/// Close callback publishing one [`AggOrder`] per closed window.
pub struct OrderCountHandler<S> {
    sink: S,
    stats: Arc<AgentStats>,
}

impl<S> OrderCountHandler<S> {
    pub fn new(sink: S, stats: Arc<AgentStats>) -> Self {
        Self { sink, stats }
    }
}

impl<S: Sink<AggOrder>> WindowCloseHandler<Order> for OrderCountHandler<S> {
    fn on_window_close(&self, key: &WindowKey, records: &[Order]) -> anyhow::Result<()> {
        let agg = count_orders(key, records);
        info!(
            kitchen = %agg.kitchen,
            window_start = agg.date,
            count = agg.count,
            "processing window"
        );
        if let Err(err) = self.sink.send_soon(agg) {
            AgentStats::incr(&self.stats.enqueue_failures);
            warn!(window = %key, error = %err, "aggregate not published");
            return Err(err.into());
        }
        AgentStats::incr(&self.stats.emitted);
        Ok(())
    }
}

/// Feeds orders into the window table, one kitchen per partition key.
///
/// Late orders are not fatal: they are counted, logged and either dropped or
/// republished on a dead-letter sink.
pub struct AggregationAgent {
    table: Arc<TumblingWindowTable<Order>>,
    stats: Arc<AgentStats>,
    dead_letter: Option<Box<dyn Sink<Order>>>,
}

impl AggregationAgent {
    pub fn new(table: Arc<TumblingWindowTable<Order>>, stats: Arc<AgentStats>) -> Self {
        Self {
            table,
            stats,
            dead_letter: None,
        }
    }

    /// Republish late orders on `sink` instead of dropping them.
    pub fn with_dead_letter(mut self, sink: impl Sink<Order> + 'static) -> Self {
        self.dead_letter = Some(Box::new(sink));
        self
    }

    pub fn table(&self) -> &Arc<TumblingWindowTable<Order>> {
        &self.table
    }

    pub fn stats(&self) -> AgentStatsSnapshot {
        self.stats.snapshot()
    }

    /// Add one order to its kitchen's window.
    pub fn process(&self, order: Order) -> WindowResult<WindowKey> {
        let rejected = self.dead_letter.as_ref().map(|_| order.clone());
        let kitchen = order.kitchen.clone();
        let date = order.date;

        let err = match self.table.record(&kitchen, date, order) {
            Ok(key) => {
                AgentStats::incr(&self.stats.accepted);
                return Ok(key);
            }
            Err(err) => err,
        };

        match &err {
            WindowError::LateRecord { .. } => AgentStats::incr(&self.stats.late),
            WindowError::UnknownWindow { .. } => AgentStats::incr(&self.stats.unknown),
            _ => {}
        }
        warn!(kitchen = %kitchen, date, error = %err, "order rejected");

        if let (Some(sink), Some(order)) = (&self.dead_letter, rejected) {
            if err.is_late() {
                match sink.send_soon(order) {
                    Ok(()) => AgentStats::incr(&self.stats.dead_lettered),
                    Err(send_err) => {
                        AgentStats::incr(&self.stats.enqueue_failures);
                        warn!(kitchen = %kitchen, date, error = %send_err, "dead letter not published");
                    }
                }
            }
        }
        Err(err)
    }

    /// Consume `source` until `shutdown` fires or every producer is gone.
    ///
    /// On shutdown, orders already queued on `source` are still processed.
    /// Returns the number of orders consumed.
    pub fn run(&self, source: &TopicReceiver<Order>, shutdown: &Receiver<()>) -> u64 {
        let mut consumed = 0u64;
        info!(table = %self.table.name(), topic = %source.topic(), "aggregation agent started");
        loop {
            select! {
                recv(source.as_receiver()) -> msg => match msg {
                    Ok(order) => {
                        let _ = self.process(order);
                        consumed += 1;
                    }
                    Err(_) => {
                        debug!(topic = %source.topic(), "source topic closed");
                        break;
                    }
                },
                recv(shutdown) -> _ => {
                    while let Ok(Some(order)) = source.try_recv() {
                        let _ = self.process(order);
                        consumed += 1;
                    }
                    break;
                }
            }
        }
        info!(table = %self.table.name(), consumed, "aggregation agent stopped");
        consumed
    }
}

#[cfg(test)]
#[path = "tests/agent_tests.rs"]
mod tests;
