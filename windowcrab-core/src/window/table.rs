use super::*;

#[derive(Serialize, Deserialize)]
struct TableSnapshot<V> {
    name: String,
    window_size_ms: i64,
    lateness_ms: i64,
    watermark: EventTime,
    index: IndexSnapshot<V>,
}

/// Keyed tumbling-window table.
///
/// Owns the watermark, the window index and the sizing policy, and carries
/// the close callback registered at construction. Shared through an `Arc`
/// between the ingest path ([`record`](Self::record)) and the
/// [`ExpirationDriver`].
///
/// A window `[start, start + size)` expires at `start + size + lateness` and
/// is closed once the watermark reaches that point. Records for a window
/// that has already expired are rejected instead of reopening it.
pub struct TumblingWindowTable<V> {
    name: String,
    config: WindowConfig,
    assigner: TumblingEventTimeWindows,
    watermark: WatermarkTracker,
    index: WindowIndex<V>,
    on_close: Box<dyn WindowCloseHandler<V>>,
}

impl<V: 'static> TumblingWindowTable<V> {
    /// Create a table. Fails if `config` does not validate.
    pub fn new(
        name: impl Into<String>,
        config: WindowConfig,
        on_close: impl WindowCloseHandler<V> + 'static,
    ) -> WindowResult<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            assigner: TumblingEventTimeWindows::of(config.window_size),
            watermark: WatermarkTracker::new(config.lateness),
            index: WindowIndex::new(config.partitions),
            on_close: Box::new(on_close),
            config,
        })
    }

    /// Replace the zero-value accumulator factory for new windows.
    pub fn with_default(mut self, zero: impl Fn() -> Vec<V> + Send + Sync + 'static) -> Self {
        self.index = self.index.with_default(zero);
        self
    }

    /// Start of the window containing `event_time`.
    pub fn window_start(&self, event_time: EventTime) -> Option<EventTime> {
        self.assigner.window_start(event_time)
    }

    /// The window containing `event_time`.
    pub fn window_for(&self, event_time: EventTime) -> Option<TimeWindow> {
        self.assigner.assign_window(event_time)
    }

    /// Expiry time of the window starting at `window_start`.
    pub fn expires_at(&self, window_start: EventTime) -> EventTime {
        window_start
            .saturating_add(self.assigner.size_ms())
            .saturating_add(self.watermark.lateness_ms())
    }

    /// Add `value` to the window of `partition_key` containing `event_time`.
    ///
    /// Advances the watermark with `event_time` first. Returns the window key.
    ///
    /// # Errors
    /// - [`WindowError::LateRecord`] if the window expired before the current
    ///   watermark; nothing is stored.
    /// - [`WindowError::UnknownWindow`] if the window was closed by a sweep in
    ///   the meantime.
    /// - [`WindowError::EventTimeOutOfRange`] if the window around
    ///   `event_time` is not representable; the watermark is left alone.
    pub fn record(
        &self,
        partition_key: &str,
        event_time: EventTime,
        value: V,
    ) -> WindowResult<WindowKey> {
        let Some(window) = self.window_for(event_time) else {
            return Err(WindowError::EventTimeOutOfRange {
                partition_key: partition_key.to_string(),
                event_time,
            });
        };
        debug_assert!(window.contains(event_time));
        let window_start = window.start;
        let expires_at = self.expires_at(window_start);

        self.watermark.advance(event_time);
        let watermark = self.watermark.current();
        if expires_at < watermark {
            return Err(WindowError::LateRecord {
                partition_key: partition_key.to_string(),
                window_start,
                expires_at,
                watermark,
            });
        }

        let key = WindowKey::new(partition_key, window_start);
        let len = self.index.insert(&key, expires_at, value)?;
        debug!(table = %self.name, window = %key, len, watermark, "record added");
        Ok(key)
    }

    /// [`record`](Self::record) for an already keyed record.
    pub fn record_keyed(&self, record: KeyedRecord<V>) -> WindowResult<WindowKey> {
        self.record(&record.partition_key, record.event_time, record.payload)
    }

    /// Current watermark timestamp (`EVENT_TIME_MIN` before the first record).
    pub fn watermark(&self) -> EventTime {
        self.watermark.current()
    }

    pub fn current_watermark(&self) -> Option<Watermark> {
        self.watermark.current_watermark()
    }

    pub fn index(&self) -> &WindowIndex<V> {
        &self.index
    }

    pub fn close_handler(&self) -> &dyn WindowCloseHandler<V> {
        self.on_close.as_ref()
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<V: Clone + Serialize + DeserializeOwned + 'static> TumblingWindowTable<V> {
    /// Serialize open windows and the watermark.
    pub fn snapshot_state(&self) -> WindowResult<Vec<u8>> {
        let snapshot = TableSnapshot {
            name: self.name.clone(),
            window_size_ms: self.assigner.size_ms(),
            lateness_ms: self.watermark.lateness_ms(),
            watermark: self.watermark.current(),
            index: self.index.snapshot(),
        };
        bincode::serialize(&snapshot).map_err(|e| WindowError::State(e.to_string()))
    }

    /// Restore state produced by [`snapshot_state`](Self::snapshot_state).
    ///
    /// The snapshot must come from a table with the same window size. The
    /// watermark only moves forward, so restoring never rewinds event time.
    pub fn restore_state(&self, data: &[u8]) -> WindowResult<()> {
        let snapshot: TableSnapshot<V> =
            bincode::deserialize(data).map_err(|e| WindowError::State(e.to_string()))?;
        if snapshot.window_size_ms != self.assigner.size_ms() {
            return Err(WindowError::State(format!(
                "snapshot of table {} uses {}ms windows, table {} uses {}ms",
                snapshot.name,
                snapshot.window_size_ms,
                self.name,
                self.assigner.size_ms()
            )));
        }
        if snapshot.lateness_ms != self.watermark.lateness_ms() {
            warn!(
                table = %self.name,
                snapshot_lateness_ms = snapshot.lateness_ms,
                lateness_ms = self.watermark.lateness_ms(),
                "restoring snapshot taken with a different lateness; expiries are kept as stored"
            );
        }

        let windows = snapshot.index.windows.len();
        self.index.restore(snapshot.index);
        self.watermark.observe_watermark(snapshot.watermark);
        info!(table = %self.name, windows, watermark = snapshot.watermark, "table state restored");
        Ok(())
    }
}
