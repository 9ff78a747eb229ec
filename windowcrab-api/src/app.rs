//! Wiring of one windowed aggregation application.
//!
//! ```text
//! source topic -> ingest thread (AggregationAgent) -> TumblingWindowTable
//!                                                         |
//!                          expiry thread (ExpirationDriver) -> OrderCountHandler -> sink
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Sender};
use tracing::{info, warn};
use windowcrab_core::bus::{topic, Sink, TopicSender};
use windowcrab_core::state::{FsTableStateStore, TableStateStore};
use windowcrab_core::window::{DriverHandle, DriverStats, ExpirationDriver, TumblingWindowTable};

use crate::agent::{AgentStats, AgentStatsSnapshot, AggregationAgent, OrderCountHandler};
use crate::config::{AppConfig, LateDataPolicy};
use crate::models::{AggOrder, Order};

/// A configured, not yet started application.
pub struct WindowedApp {
    config: AppConfig,
    table: Arc<TumblingWindowTable<Order>>,
    stats: Arc<AgentStats>,
    dead_letter: Option<Box<dyn Sink<Order>>>,
    store: Option<Arc<dyn TableStateStore>>,
}

impl WindowedApp {
    /// Build the window table, publishing one [`AggOrder`] per closed window
    /// on `sink`.
    ///
    /// When `config.state_path` is set, table state is kept in a
    /// [`FsTableStateStore`] under that directory.
    pub fn new(config: AppConfig, sink: impl Sink<AggOrder> + 'static) -> Result<Self> {
        config.validate().context("invalid application config")?;

        let stats = Arc::new(AgentStats::new());
        let handler = OrderCountHandler::new(sink, Arc::clone(&stats));
        let table = TumblingWindowTable::new(config.table_name.clone(), config.window.clone(), handler)
            .context("failed to create window table")?;

        let store: Option<Arc<dyn TableStateStore>> = match &config.state_path {
            Some(path) => Some(Arc::new(FsTableStateStore::new(path)?)),
            None => None,
        };

        Ok(Self {
            config,
            table: Arc::new(table),
            stats,
            dead_letter: None,
            store,
        })
    }

    /// Sink for orders rejected as late under [`LateDataPolicy::DeadLetter`].
    pub fn with_dead_letter(mut self, sink: impl Sink<Order> + 'static) -> Self {
        self.dead_letter = Some(Box::new(sink));
        self
    }

    /// Replace the state store picked from `state_path`.
    pub fn with_state_store(mut self, store: Arc<dyn TableStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn table(&self) -> &Arc<TumblingWindowTable<Order>> {
        &self.table
    }

    /// Restore saved table state, then start the expiry and ingest threads.
    pub fn start(self) -> Result<RunningApp> {
        let WindowedApp {
            config,
            table,
            stats,
            dead_letter,
            store,
        } = self;

        let mut agent = AggregationAgent::new(Arc::clone(&table), Arc::clone(&stats));
        match (config.late_data_policy, dead_letter) {
            (LateDataPolicy::DeadLetter, Some(sink)) => {
                agent = agent.with_dead_letter(sink);
            }
            (LateDataPolicy::DeadLetter, None) => {
                bail!(
                    "late data policy is dead-letter but no sink was given for topic {}",
                    config.dead_letter_topic
                );
            }
            (LateDataPolicy::Drop, Some(_)) => {
                warn!(topic = %config.dead_letter_topic, "dead-letter sink ignored, late data policy is drop");
            }
            (LateDataPolicy::Drop, None) => {}
        }

        if let Some(store) = &store {
            if let Some(bytes) = store
                .load(&config.table_name)
                .with_context(|| format!("failed to load state of table {}", config.table_name))?
            {
                table
                    .restore_state(&bytes)
                    .with_context(|| format!("failed to restore table {}", config.table_name))?;
            }
        }

        let driver = Arc::new(ExpirationDriver::new(Arc::clone(&table)))
            .spawn()
            .context("failed to spawn expiration driver")?;

        let (source_tx, source_rx) = topic::<Order>(&config.source_topic, config.channel_capacity);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let ingest = std::thread::Builder::new()
            .name(format!("{}-ingest", config.app_id))
            .spawn(move || agent.run(&source_rx, &shutdown_rx))
            .context("failed to spawn ingest thread")?;

        info!(
            app_id = %config.app_id,
            broker = %config.broker_address,
            source = %config.source_topic,
            sink = %config.sink_topic,
            table = %config.table_name,
            late_data_policy = %config.late_data_policy,
            "windowed app started"
        );

        Ok(RunningApp {
            config,
            table,
            stats,
            store,
            source: source_tx,
            shutdown_tx,
            ingest,
            driver,
        })
    }
}

/// Summary returned by [`RunningApp::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppReport {
    /// Orders taken off the source topic.
    pub consumed: u64,
    pub agent: AgentStatsSnapshot,
    pub driver: DriverStats,
    /// Windows still open at shutdown (saved when a state store is set).
    pub open_windows: usize,
}

/// A started application.
pub struct RunningApp {
    config: AppConfig,
    table: Arc<TumblingWindowTable<Order>>,
    stats: Arc<AgentStats>,
    store: Option<Arc<dyn TableStateStore>>,
    source: TopicSender<Order>,
    shutdown_tx: Sender<()>,
    ingest: JoinHandle<u64>,
    driver: DriverHandle,
}

impl RunningApp {
    /// Producer handle of the source topic.
    pub fn source(&self) -> TopicSender<Order> {
        self.source.clone()
    }

    pub fn table(&self) -> &Arc<TumblingWindowTable<Order>> {
        &self.table
    }

    pub fn stats(&self) -> AgentStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop ingest (draining queued orders), stop the expiration driver after
    /// a final sweep, then save the remaining open windows.
    pub fn shutdown(self) -> Result<AppReport> {
        let RunningApp {
            config,
            table,
            stats,
            store,
            source,
            shutdown_tx,
            ingest,
            driver,
        } = self;

        drop(source);
        let _ = shutdown_tx.send(());
        let consumed = match ingest.join() {
            Ok(consumed) => consumed,
            Err(_) => bail!("ingest thread panicked"),
        };
        let driver = driver.shutdown();

        let open_windows = table.index().pending();
        if let Some(store) = &store {
            let bytes = table
                .snapshot_state()
                .with_context(|| format!("failed to snapshot table {}", config.table_name))?;
            store
                .save(&config.table_name, &bytes)
                .with_context(|| format!("failed to save state of table {}", config.table_name))?;
        }

        let report = AppReport {
            consumed,
            agent: stats.snapshot(),
            driver,
            open_windows,
        };
        info!(
            app_id = %config.app_id,
            consumed = report.consumed,
            accepted = report.agent.accepted,
            late = report.agent.late + report.agent.unknown,
            emitted = report.agent.emitted,
            windows_closed = report.driver.closed,
            open_windows,
            "windowed app stopped"
        );
        Ok(report)
    }
}
