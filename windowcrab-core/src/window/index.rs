use super::*;

type ZeroFn<V> = Arc<dyn Fn() -> Vec<V> + Send + Sync>;

struct WindowState<V> {
    accumulator: Vec<V>,
    expires_at: EventTime,
    /// Registration sequence in the expiry queue.
    seq: u64,
    closed: bool,
}

impl<V> WindowState<V> {
    fn info(&self, key: &WindowKey) -> WindowInfo {
        WindowInfo {
            key: key.clone(),
            expires_at: self.expires_at,
            len: self.accumulator.len(),
        }
    }
}

/// Serializable contents of a [`WindowIndex`]: open windows in creation order
/// plus the closed horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot<V> {
    pub windows: Vec<(WindowKey, EventTime, Vec<V>)>,
    pub horizon: EventTime,
}

/// Map from [`WindowKey`] to window state, shared by ingest and expiration.
///
/// # Locking
///
/// Windows live in `partitions` shards, each behind its own mutex and picked
/// by hashing the partition key, so one kitchen's ingest never waits on
/// another's unless they share a shard. Expiry order is kept in a single
/// [`ExpiryQueue`] guarded by a second mutex. Lock order is always
/// shard -> queue.
///
/// Creating a window registers it in the queue under that lock, and a sweep
/// seals the queue's horizon under the same lock, so creation and sealing are
/// linearised: a window is either visible to the sweep or refused.
///
/// # Lifecycle
///
/// `get_or_create` -> `append`* -> `close` (takes the accumulator, once) ->
/// `evict`. Appends after `close` fail with [`WindowError::UnknownWindow`].
pub struct WindowIndex<V> {
    shards: Vec<Mutex<HashMap<WindowKey, WindowState<V>>>>,
    expiry: Mutex<ExpiryQueue<WindowKey>>,
    partitioner: HashPartitioner,
    zero: ZeroFn<V>,
}

fn unknown_window(key: &WindowKey) -> WindowError {
    WindowError::UnknownWindow {
        partition_key: key.partition_key.clone(),
        window_start: key.window_start,
    }
}

impl<V: 'static> WindowIndex<V> {
    /// Create an empty index with `partitions` shards (at least one).
    pub fn new(partitions: usize) -> Self {
        Self {
            shards: (0..partitions.max(1))
                .map(|_| Mutex::new(HashMap::new()))
                .collect(),
            expiry: Mutex::new(ExpiryQueue::new()),
            partitioner: HashPartitioner,
            zero: Arc::new(Vec::new),
        }
    }

    /// Replace the zero-value factory used for new windows' accumulators.
    pub fn with_default(mut self, zero: impl Fn() -> Vec<V> + Send + Sync + 'static) -> Self {
        self.zero = Arc::new(zero);
        self
    }

    fn shard(&self, key: &WindowKey) -> &Mutex<HashMap<WindowKey, WindowState<V>>> {
        let idx = self
            .partitioner
            .partition(key.partition_key.as_str(), self.shards.len());
        &self.shards[idx]
    }

    fn get_or_create_locked<'a>(
        &self,
        windows: &'a mut HashMap<WindowKey, WindowState<V>>,
        key: &WindowKey,
        expires_at: EventTime,
    ) -> WindowResult<&'a mut WindowState<V>> {
        match windows.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let state = entry.into_mut();
                if state.closed {
                    return Err(unknown_window(key));
                }
                Ok(state)
            }
            Entry::Vacant(entry) => {
                let seq = self
                    .expiry
                    .lock()
                    .register(key.clone(), expires_at)
                    .ok_or_else(|| unknown_window(key))?;
                Ok(entry.insert(WindowState {
                    accumulator: (self.zero)(),
                    expires_at,
                    seq,
                    closed: false,
                }))
            }
        }
    }

    /// Return the window for `key`, creating it with an empty accumulator if absent.
    ///
    /// Fails with [`WindowError::UnknownWindow`] if the window was closed, or if
    /// `expires_at` is at or behind the closed horizon.
    pub fn get_or_create(&self, key: &WindowKey, expires_at: EventTime) -> WindowResult<WindowInfo> {
        let mut windows = self.shard(key).lock();
        let state = self.get_or_create_locked(&mut windows, key, expires_at)?;
        Ok(state.info(key))
    }

    /// Append `value` to an existing open window. Returns the new record count.
    pub fn append(&self, key: &WindowKey, value: V) -> WindowResult<usize> {
        let mut windows = self.shard(key).lock();
        match windows.get_mut(key) {
            Some(state) if !state.closed => {
                state.accumulator.push(value);
                Ok(state.accumulator.len())
            }
            _ => Err(unknown_window(key)),
        }
    }

    /// `get_or_create` followed by `append`, under one shard lock.
    pub fn insert(&self, key: &WindowKey, expires_at: EventTime, value: V) -> WindowResult<usize> {
        let mut windows = self.shard(key).lock();
        let state = self.get_or_create_locked(&mut windows, key, expires_at)?;
        state.accumulator.push(value);
        Ok(state.accumulator.len())
    }

    /// Raise the closed horizon so no window expiring at or before `watermark`
    /// can be created from now on.
    pub fn seal(&self, watermark: EventTime) {
        self.expiry.lock().seal(watermark);
    }

    /// Open windows with `expires_at <= before_watermark`, in ascending
    /// `expires_at` order, ties broken by creation order.
    pub fn expirable(&self, before_watermark: EventTime) -> Vec<WindowInfo> {
        let due = self.expiry.lock().due(before_watermark);
        due.into_iter()
            .filter_map(|(_, _, key)| {
                let windows = self.shard(&key).lock();
                let info = windows
                    .get(&key)
                    .filter(|state| !state.closed)
                    .map(|state| state.info(&key));
                info
            })
            .collect()
    }

    /// Mark the window closed and take its accumulator.
    ///
    /// Returns `None` if the window is absent or already closed, so at most one
    /// caller ever receives a given window's records.
    pub fn close(&self, key: &WindowKey) -> Option<Vec<V>> {
        let mut windows = self.shard(key).lock();
        let state = windows.get_mut(key).filter(|state| !state.closed)?;
        state.closed = true;
        self.expiry.lock().remove(state.expires_at, state.seq);
        Some(std::mem::take(&mut state.accumulator))
    }

    /// Remove the window. Returns `false` if it was already gone.
    pub fn evict(&self, key: &WindowKey) -> bool {
        let removed = self.shard(key).lock().remove(key);
        if let Some(state) = &removed {
            if !state.closed {
                self.expiry.lock().remove(state.expires_at, state.seq);
            }
        }
        removed.is_some()
    }

    /// Whether the index currently holds `key` (open or closed-but-not-evicted).
    pub fn contains(&self, key: &WindowKey) -> bool {
        self.shard(key).lock().contains_key(key)
    }

    /// Number of windows held, open or closed-but-not-evicted.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of windows still waiting to expire.
    pub fn pending(&self) -> usize {
        self.expiry.lock().len()
    }

    /// Earliest expiry among open windows.
    pub fn next_expiry(&self) -> Option<EventTime> {
        self.expiry.lock().next_expiry()
    }

    pub fn horizon(&self) -> EventTime {
        self.expiry.lock().horizon()
    }

    pub fn partitions(&self) -> usize {
        self.shards.len()
    }
}

impl<V: Clone + 'static> WindowIndex<V> {
    /// Copy of the window for `key`, if present.
    pub fn get(&self, key: &WindowKey) -> Option<WindowSnapshot<V>> {
        let windows = self.shard(key).lock();
        windows.get(key).map(|state| WindowSnapshot {
            key: key.clone(),
            expires_at: state.expires_at,
            records: state.accumulator.clone(),
            closed: state.closed,
        })
    }

    /// Copy out all open windows.
    ///
    /// Shards are visited one at a time, so take snapshots while ingest and
    /// expiration are stopped if the copy must be consistent across keys.
    pub fn snapshot(&self) -> IndexSnapshot<V> {
        let mut open: Vec<(u64, WindowKey, EventTime, Vec<V>)> = Vec::new();
        for shard in &self.shards {
            let windows = shard.lock();
            open.extend(
                windows
                    .iter()
                    .filter(|(_, state)| !state.closed)
                    .map(|(key, state)| {
                        (
                            state.seq,
                            key.clone(),
                            state.expires_at,
                            state.accumulator.clone(),
                        )
                    }),
            );
        }
        open.sort_by_key(|(seq, ..)| *seq);
        IndexSnapshot {
            windows: open
                .into_iter()
                .map(|(_, key, expires_at, records)| (key, expires_at, records))
                .collect(),
            horizon: self.horizon(),
        }
    }

    /// Replace the index contents with `snapshot`.
    pub fn restore(&self, snapshot: IndexSnapshot<V>) {
        for shard in &self.shards {
            shard.lock().clear();
        }
        self.expiry.lock().clear();

        for (key, expires_at, records) in snapshot.windows {
            let mut windows = self.shard(&key).lock();
            let Some(seq) = self.expiry.lock().register(key.clone(), expires_at) else {
                continue;
            };
            windows.insert(
                key,
                WindowState {
                    accumulator: records,
                    expires_at,
                    seq,
                    closed: false,
                },
            );
        }
        self.seal(snapshot.horizon);
    }
}
