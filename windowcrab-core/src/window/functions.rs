use super::*;

/// Close callback of a window table.
///
/// Invoked by the [`ExpirationDriver`] exactly once per window, with the
/// window key and its accumulated records as of the close. Implementations
/// should not block: hand results off to a queue and return.
///
/// An error (or a panic) is reported by the driver as
/// [`WindowError::CallbackFailure`]; the window is evicted either way.
pub trait WindowCloseHandler<V>: Send + Sync {
    fn on_window_close(&self, key: &WindowKey, records: &[V]) -> anyhow::Result<()>;
}

impl<V, F> WindowCloseHandler<V> for F
where
    F: Fn(&WindowKey, &[V]) -> anyhow::Result<()> + Send + Sync,
{
    fn on_window_close(&self, key: &WindowKey, records: &[V]) -> anyhow::Result<()> {
        self(key, records)
    }
}
