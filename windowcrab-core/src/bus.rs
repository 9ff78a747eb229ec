//! In-process message bus.
//!
//! Named topics backed by bounded crossbeam channels. This stands in for the
//! broker: producers publish typed records onto a topic, one consumer drains
//! it. Bounded capacity gives natural backpressure on [`TopicSender::send`],
//! while [`TopicSender::try_send`] is the non-blocking "send soon" path used
//! from window close callbacks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;

use crate::error::{WindowError, WindowResult};

/// Default topic buffer size (bounded for backpressure).
pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

/// Fire-and-forget destination for values produced by the engine.
pub trait Sink<T>: Send + Sync {
    /// Queue `value` for delivery without waiting for it to be consumed.
    ///
    /// Fails with [`WindowError::SinkEnqueue`] if the value could not be queued.
    fn send_soon(&self, value: T) -> WindowResult<()>;
}

impl<T, S: Sink<T> + ?Sized> Sink<T> for Box<S> {
    fn send_soon(&self, value: T) -> WindowResult<()> {
        (**self).send_soon(value)
    }
}

impl<T, S: Sink<T> + ?Sized> Sink<T> for Arc<S> {
    fn send_soon(&self, value: T) -> WindowResult<()> {
        (**self).send_soon(value)
    }
}

/// Publishing side of a topic.
pub struct TopicSender<T> {
    topic: Arc<str>,
    sender: Sender<T>,
}

impl<T> Clone for TopicSender<T> {
    fn clone(&self) -> Self {
        Self {
            topic: Arc::clone(&self.topic),
            sender: self.sender.clone(),
        }
    }
}

impl<T> TopicSender<T> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn enqueue_error(&self, reason: &str) -> WindowError {
        WindowError::SinkEnqueue {
            topic: self.topic.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Publish a value.
    ///
    /// Blocks if the topic is full (backpressure).
    pub fn send(&self, value: T) -> WindowResult<()> {
        self.sender
            .send(value)
            .map_err(|_| self.enqueue_error("topic closed: receiver dropped"))
    }

    /// Publish without blocking.
    ///
    /// Returns an error if the topic is full or closed.
    pub fn try_send(&self, value: T) -> WindowResult<()> {
        self.sender.try_send(value).map_err(|e| match e {
            TrySendError::Full(_) => self.enqueue_error("topic full"),
            TrySendError::Disconnected(_) => self.enqueue_error("topic closed: receiver dropped"),
        })
    }

    /// Number of values waiting to be consumed.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

impl<T: Send> Sink<T> for TopicSender<T> {
    fn send_soon(&self, value: T) -> WindowResult<()> {
        self.try_send(value)
    }
}

/// Consuming side of a topic.
pub struct TopicReceiver<T> {
    topic: Arc<str>,
    receiver: Receiver<T>,
}

impl<T> TopicReceiver<T> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receive the next value.
    ///
    /// Blocks until a value is available; fails once every sender is dropped
    /// and the topic is drained.
    pub fn recv(&self) -> Result<T> {
        self.receiver
            .recv()
            .map_err(|_| anyhow!("topic {} closed: sender dropped", self.topic))
    }

    /// Try to receive without blocking.
    ///
    /// Returns `None` if no value is available.
    pub fn try_recv(&self) -> Result<Option<T>> {
        match self.receiver.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(anyhow!("topic {} closed: sender dropped", self.topic))
            }
        }
    }

    /// Receive, waiting at most `timeout`. Returns `None` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => Ok(Some(value)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("topic {} closed: sender dropped", self.topic))
            }
        }
    }

    /// The underlying channel, for use in `crossbeam_channel::select!`.
    pub fn as_receiver(&self) -> &Receiver<T> {
        &self.receiver
    }

    /// Number of values waiting to be consumed.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Create a bounded topic.
///
/// # Backpressure
/// When the topic is full, `send()` blocks until space is available and
/// `try_send()` fails immediately.
pub fn topic<T>(name: &str, capacity: usize) -> (TopicSender<T>, TopicReceiver<T>) {
    let (sender, receiver) = bounded(capacity);
    let topic: Arc<str> = Arc::from(name);
    (
        TopicSender {
            topic: Arc::clone(&topic),
            sender,
        },
        TopicReceiver { topic, receiver },
    )
}

/// Create a topic with default capacity.
pub fn topic_default<T>(name: &str) -> (TopicSender<T>, TopicReceiver<T>) {
    topic(name, DEFAULT_TOPIC_CAPACITY)
}

/// Sink that keeps everything it is given. Used by tests and examples.
pub struct CollectingSink<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for CollectingSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for CollectingSink<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> CollectingSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything collected so far.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T: Clone> CollectingSink<T> {
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

impl<T: Send> Sink<T> for CollectingSink<T> {
    fn send_soon(&self, value: T) -> WindowResult<()> {
        self.items.lock().push(value);
        Ok(())
    }
}
