use super::*;

/// Outcome of one expiration sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Watermark the sweep ran against; `None` if no record was seen yet.
    pub watermark: Option<Watermark>,
    /// Windows whose callback completed successfully.
    pub closed: usize,
    /// Windows whose callback failed. They were evicted all the same.
    pub failures: Vec<WindowError>,
}

impl SweepReport {
    /// Windows evicted by this sweep, successful or not.
    pub fn evicted(&self) -> usize {
        self.closed + self.failures.len()
    }
}

/// Totals over the lifetime of a spawned driver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    pub sweeps: u64,
    pub closed: u64,
    pub failed: u64,
}

impl DriverStats {
    fn add(&mut self, report: &SweepReport) {
        self.sweeps += 1;
        self.closed += report.closed as u64;
        self.failed += report.failures.len() as u64;
    }
}

/// Closes expired windows of a [`TumblingWindowTable`].
///
/// Each sweep reads the watermark, seals the index up to it, and then for
/// every expirable window in `expires_at` order:
///
/// ```text
/// close(key)  -> takes the accumulator, at most once per key
/// callback    -> errors and panics become CallbackFailure
/// evict(key)  -> always, so a failing window is never retried
/// ```
///
/// Sweeps are serialised, so running [`sweep`](Self::sweep) by hand while the
/// spawned ticker is active never visits a window twice.
pub struct ExpirationDriver<V> {
    table: Arc<TumblingWindowTable<V>>,
    sweep_lock: Mutex<()>,
}

impl<V: Send + 'static> ExpirationDriver<V> {
    pub fn new(table: Arc<TumblingWindowTable<V>>) -> Self {
        Self {
            table,
            sweep_lock: Mutex::new(()),
        }
    }

    pub fn table(&self) -> &Arc<TumblingWindowTable<V>> {
        &self.table
    }

    /// Close and evict every window that expired at the current watermark.
    pub fn sweep(&self) -> SweepReport {
        let _guard = self.sweep_lock.lock();

        let watermark = self.table.watermark();
        if watermark == EVENT_TIME_MIN {
            return SweepReport::default();
        }

        let index = self.table.index();
        index.seal(watermark);

        let mut report = SweepReport {
            watermark: Some(Watermark::new(watermark)),
            ..SweepReport::default()
        };
        for info in index.expirable(watermark) {
            let Some(records) = index.close(&info.key) else {
                continue;
            };
            match self.fire(&info.key, &records) {
                Ok(()) => {
                    info!(
                        table = %self.table.name(),
                        window = %info.key,
                        records = records.len(),
                        expires_at = info.expires_at,
                        watermark,
                        "window closed"
                    );
                    report.closed += 1;
                }
                Err(err) => {
                    error!(table = %self.table.name(), window = %info.key, error = %err, "window close failed");
                    report.failures.push(err);
                }
            }
            index.evict(&info.key);
        }

        if report.evicted() > 0 {
            debug!(
                table = %self.table.name(),
                closed = report.closed,
                failed = report.failures.len(),
                pending = index.pending(),
                "sweep finished"
            );
        }
        report
    }

    fn fire(&self, key: &WindowKey, records: &[V]) -> WindowResult<()> {
        let handler = self.table.close_handler();
        let outcome = catch_unwind(AssertUnwindSafe(|| handler.on_window_close(key, records)));
        let reason = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => format!("{err:#}"),
            Err(panic) => panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .map(|msg| format!("panicked: {msg}"))
                .unwrap_or_else(|| "panicked".to_string()),
        };
        Err(WindowError::CallbackFailure {
            partition_key: key.partition_key.clone(),
            window_start: key.window_start,
            reason,
        })
    }

    /// Run sweeps every `cleanup_interval` on a dedicated thread.
    ///
    /// The returned handle stops the thread; see [`DriverHandle::shutdown`].
    pub fn spawn(self: Arc<Self>) -> std::io::Result<DriverHandle> {
        let interval = self.table.config().cleanup_interval;
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let thread_name = format!("{}-expiry", self.table.name());

        let join = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let ticker = tick(interval);
                let mut stats = DriverStats::default();
                info!(table = %self.table.name(), ?interval, "expiration driver started");
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let report = self.sweep();
                            stats.add(&report);
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                // Windows that expired since the last tick still get their callback.
                let report = self.sweep();
                stats.add(&report);
                info!(
                    table = %self.table.name(),
                    sweeps = stats.sweeps,
                    closed = stats.closed,
                    failed = stats.failed,
                    "expiration driver stopped"
                );
                stats
            })?;

        Ok(DriverHandle {
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        })
    }
}

/// Handle to a spawned [`ExpirationDriver`] thread.
///
/// Dropping the handle stops the driver the same way as
/// [`shutdown`](Self::shutdown).
pub struct DriverHandle {
    shutdown_tx: Option<Sender<()>>,
    join: Option<JoinHandle<DriverStats>>,
}

impl DriverHandle {
    /// Stop the driver.
    ///
    /// The sweep in flight (if any) runs to completion, then one final sweep
    /// closes whatever expired since the last tick. Windows are never evicted
    /// without their callback.
    pub fn shutdown(mut self) -> DriverStats {
        self.stop()
    }

    fn stop(&mut self) -> DriverStats {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.join.take() {
            Some(join) => join.join().unwrap_or_else(|_| {
                warn!("expiration driver thread panicked");
                DriverStats::default()
            }),
            None => DriverStats::default(),
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
