use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::queue::BlockingQueue;

/// Poll granularity for deadline-bounded operations: each blocking attempt
/// is bounded by this before the deadline and closed state are rechecked.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Horizon applied per operation when no explicit deadline is configured,
/// so an unconfigured channel never blocks unboundedly.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

fn next_channel_name() -> String {
    format!("chan-{}", NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
}

struct Config {
    send_deadline: Option<Instant>,
    receive_deadline: Option<Instant>,
    check_interval: Duration,
}

struct ChannelInner<T> {
    name: String,
    /// Queue sends enter. Same queue as `egress` except for piped channels.
    ingress: BlockingQueue<T>,
    /// Queue receives leave.
    egress: BlockingQueue<T>,
    config: RwLock<Config>,
}

/// A named channel handle: a blocking queue pair plus per-channel deadline
/// and poll configuration consumed by the operator layer.
///
/// Handles are cheap clones sharing one backing state, so a channel can be
/// handed to any number of producer and consumer threads. The config lock
/// is never taken while a queue lock is held.
pub struct Channel<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Send + 'static> Channel<T> {
    /// A channel named `chan-<n>` from a process-wide counter. Capacity 0
    /// builds a rendezvous channel.
    pub fn new(capacity: usize) -> Self {
        Self::with_name(capacity, next_channel_name())
    }

    pub fn with_name(capacity: usize, name: impl Into<String>) -> Self {
        let queue = BlockingQueue::new(capacity);
        Self::from_queues(name.into(), queue.clone(), queue)
    }

    /// Builds a channel over an explicit queue pair; `pipe` composes two
    /// existing channels this way.
    pub(crate) fn from_queues(
        name: String,
        ingress: BlockingQueue<T>,
        egress: BlockingQueue<T>,
    ) -> Self {
        Channel {
            inner: Arc::new(ChannelInner {
                name,
                ingress,
                egress,
                config: RwLock::new(Config {
                    send_deadline: None,
                    receive_deadline: None,
                    check_interval: DEFAULT_CHECK_INTERVAL,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Capacity of the send side. The endpoints of a piped channel can
    /// differ; senders care about the ingress queue.
    pub fn capacity(&self) -> usize {
        self.inner.ingress.capacity()
    }

    /// Items currently receivable on the receive side.
    pub fn len(&self) -> usize {
        self.inner.egress.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once either endpoint is closed. A piped channel reports closed
    /// as soon as either side shuts, even while forwarded items are still
    /// draining toward receivers.
    pub fn is_closed(&self) -> bool {
        self.inner.ingress.is_closed() || self.inner.egress.is_closed()
    }

    /// Closes both endpoints. Idempotent.
    pub fn close(&self) {
        log::trace!("closing channel {}", self.inner.name);
        self.inner.ingress.close();
        self.inner.egress.close();
    }

    /// Absolute deadline for sends; `None` gives each send
    /// `now + DEFAULT_TIMEOUT`.
    pub fn set_send_deadline(&self, deadline: Option<Instant>) {
        self.inner.config.write().send_deadline = deadline;
    }

    /// Absolute deadline for receives; `None` gives each receive
    /// `now + DEFAULT_TIMEOUT`.
    pub fn set_receive_deadline(&self, deadline: Option<Instant>) {
        self.inner.config.write().receive_deadline = deadline;
    }

    /// Poll granularity for deadline-bounded operations. A zero interval
    /// degenerates to a busy poll; keep it positive.
    pub fn set_check_interval(&self, interval: Duration) {
        self.inner.config.write().check_interval = interval;
    }

    pub(crate) fn send_deadline(&self) -> Instant {
        let configured = self.inner.config.read().send_deadline;
        configured.unwrap_or_else(|| Instant::now() + DEFAULT_TIMEOUT)
    }

    pub(crate) fn receive_deadline(&self) -> Instant {
        let configured = self.inner.config.read().receive_deadline;
        configured.unwrap_or_else(|| Instant::now() + DEFAULT_TIMEOUT)
    }

    pub(crate) fn check_interval(&self) -> Duration {
        self.inner.config.read().check_interval
    }

    pub(crate) fn ingress(&self) -> &BlockingQueue<T> {
        &self.inner.ingress
    }

    pub(crate) fn egress(&self) -> &BlockingQueue<T> {
        &self.inner.egress
    }
}

impl<T: Send + 'static> fmt::Display for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Channel {{ name: {}, capacity: {}, len: {}, closed: {} }}",
            self.name(),
            self.capacity(),
            self.len(),
            self.is_closed()
        )
    }
}

impl<T: Send + 'static> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_names_are_unique() {
        let a = Channel::<u8>::new(1);
        let b = Channel::<u8>::new(1);
        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with("chan-"));
    }

    #[test]
    fn named_channel_keeps_its_name() {
        let ch = Channel::<u8>::with_name(2, "orders");
        assert_eq!(ch.name(), "orders");
        assert_eq!(ch.capacity(), 2);
    }

    #[test]
    fn clone_shares_state() {
        let ch = Channel::new(1);
        let other = ch.clone();
        other.ingress().push(5, None).unwrap();
        assert_eq!(ch.egress().pop(None), Some(5));
        other.close();
        assert!(ch.is_closed());
    }

    #[test]
    fn display_mentions_name_and_capacity() {
        let ch = Channel::<u8>::with_name(3, "freighter");
        let s = ch.to_string();
        assert!(s.contains("freighter"));
        assert!(s.contains("capacity: 3"));
    }
}
