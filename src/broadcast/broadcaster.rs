//! Single-producer, multi-consumer chunk fan-out
//!
//! Every listener owns a bounded queue. The producer offers each chunk to
//! every queue with a non-blocking send; a full queue loses that chunk and
//! nothing else is affected, so a stalled listener can never hold up the
//! source or the other listeners.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::constants::DEFAULT_QUEUE_CAPACITY;

/// Opaque identity of one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receiving side of a subscription
///
/// Returned by [`Broadcaster::subscribe`]. The broadcaster keeps the sending
/// side; once it is removed the queue is closed and `recv` yields whatever is
/// still queued, then `None`.
pub struct Subscriber {
    id: SubscriberId,
    rx: mpsc::Receiver<Bytes>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next chunk; `None` once the queue is closed and drained
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Take a queued chunk without waiting
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn poll_recv(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

/// Listener queues plus the teardown flag, guarded together
struct LiveSet {
    /// The sender is dropped on removal, closing the queue
    clients: HashMap<SubscriberId, mpsc::Sender<Bytes>>,
    /// Set by `close_all`; later subscribers start out closed
    closed: bool,
}

struct Shared {
    live: RwLock<LiveSet>,
    /// Advisory listener count, maintained outside the set lock
    client_count: AtomicUsize,
    next_id: AtomicU64,
    queue_capacity: usize,
}

/// Fan-out hub shared by the source reader and every HTTP listener
///
/// Cloning is cheap and every clone refers to the same live set.
#[derive(Clone)]
pub struct Broadcaster {
    shared: Arc<Shared>,
}

impl Broadcaster {
    /// Create a broadcaster whose listeners each queue up to `queue_capacity` chunks
    pub fn new(queue_capacity: usize) -> Self {
        assert!(queue_capacity > 0, "queue capacity must be non-zero");
        Self {
            shared: Arc::new(Shared {
                live: RwLock::new(LiveSet {
                    clients: HashMap::new(),
                    closed: false,
                }),
                client_count: AtomicUsize::new(0),
                next_id: AtomicU64::new(0),
                queue_capacity,
            }),
        }
    }

    /// Register a new listener
    ///
    /// The listener only sees chunks delivered after this call. After
    /// [`close_all`](Self::close_all) the returned subscriber is already at
    /// end-of-stream.
    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(self.shared.queue_capacity);
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));

        let mut live = self.shared.live.write();
        if live.closed {
            drop(live);
            drop(tx);
            tracing::debug!(subscriber = %id, "Broadcaster closed, listener ends immediately");
            return Subscriber { id, rx };
        }
        self.shared.client_count.fetch_add(1, Ordering::Relaxed);
        live.clients.insert(id, tx);
        drop(live);

        tracing::debug!(subscriber = %id, "Listener subscribed");
        Subscriber { id, rx }
    }

    /// Remove a listener and close its queue
    ///
    /// Chunks already queued can still be read; after them the subscriber
    /// reports end-of-stream. Returns `false` if `id` was not live, in which
    /// case nothing changes.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.shared.live.write().clients.remove(&id);

        match removed {
            Some(tx) => {
                drop(tx);
                self.shared.client_count.fetch_sub(1, Ordering::Relaxed);
                tracing::debug!(subscriber = %id, "Listener unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Offer a chunk to every live listener without waiting
    ///
    /// Listeners whose queue is full miss this chunk. Returns how many
    /// listeners accepted it.
    pub fn deliver(&self, chunk: Bytes) -> usize {
        let live = self.shared.live.read();

        live.clients
            .values()
            .filter(|tx| tx.try_send(chunk.clone()).is_ok())
            .count()
    }

    /// Close every queue, ending all open streams
    ///
    /// The broadcaster stays torn down: anyone subscribing afterwards gets
    /// end-of-stream on the first read.
    pub fn close_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut live = self.shared.live.write();
            live.closed = true;
            live.clients.drain().collect()
        };
        let closed = drained.len();
        drop(drained);

        if closed > 0 {
            self.shared.client_count.fetch_sub(closed, Ordering::Relaxed);
            tracing::info!(listeners = closed, "Closed all listener streams");
        }
        closed
    }

    /// Number of connected listeners
    ///
    /// Advisory only: the counter is updated outside the set lock, so it can
    /// briefly disagree with the set while listeners come and go.
    pub fn subscriber_count(&self) -> usize {
        self.shared.client_count.load(Ordering::Relaxed)
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.queue_capacity
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscriber_count())
            .field("queue_capacity", &self.shared.queue_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        let hub = Broadcaster::default();
        let mut sub = hub.subscribe();

        for s in ["one", "two", "three"] {
            assert_eq!(hub.deliver(chunk(s)), 1);
        }

        assert_eq!(sub.recv().await.unwrap(), "one");
        assert_eq!(sub.recv().await.unwrap(), "two");
        assert_eq!(sub.recv().await.unwrap(), "three");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops_for_that_listener_only() {
        let hub = Broadcaster::new(2);
        let mut slow = hub.subscribe();

        hub.deliver(chunk("a"));
        hub.deliver(chunk("b"));

        let mut fast = hub.subscribe();
        assert_eq!(hub.deliver(chunk("c")), 1);

        assert_eq!(fast.recv().await.unwrap(), "c");
        assert_eq!(slow.recv().await.unwrap(), "a");
        assert_eq!(slow.recv().await.unwrap(), "b");
        assert!(slow.try_recv().is_none());

        // Room again after draining
        hub.deliver(chunk("d"));
        assert_eq!(slow.recv().await.unwrap(), "d");
        assert_eq!(fast.recv().await.unwrap(), "d");
    }

    #[tokio::test]
    async fn test_unsubscribe_without_delivery_ends_stream() {
        let hub = Broadcaster::default();
        let mut sub = hub.subscribe();

        assert!(hub.unsubscribe(sub.id()));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_keeps_queued_chunks() {
        let hub = Broadcaster::default();
        let mut sub = hub.subscribe();
        hub.deliver(chunk("x"));
        hub.unsubscribe(sub.id());

        assert_eq!(sub.recv().await.unwrap(), "x");
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.deliver(chunk("y")), 0);
    }

    #[tokio::test]
    async fn test_no_retroactive_delivery() {
        let hub = Broadcaster::default();
        let mut early = hub.subscribe();
        hub.deliver(chunk("first"));

        let mut late = hub.subscribe();
        hub.deliver(chunk("second"));

        assert_eq!(early.recv().await.unwrap(), "first");
        assert_eq!(early.recv().await.unwrap(), "second");
        assert_eq!(late.recv().await.unwrap(), "second");
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn test_counter_and_double_unsubscribe() {
        let hub = Broadcaster::default();
        let a = hub.subscribe();
        let b = hub.subscribe();
        assert_ne!(a.id(), b.id());
        assert_eq!(hub.subscriber_count(), 2);

        assert!(hub.unsubscribe(a.id()));
        assert!(!hub.unsubscribe(a.id()));
        assert_eq!(hub.subscriber_count(), 1);

        assert_eq!(hub.close_all(), 1);
        assert_eq!(hub.subscriber_count(), 0);
        assert!(!hub.unsubscribe(b.id()));
    }

    #[test]
    fn test_deliver_with_no_listeners() {
        let hub = Broadcaster::default();
        assert_eq!(hub.deliver(chunk("nobody")), 0);
    }

    #[tokio::test]
    async fn test_subscribe_after_close_all_ends_immediately() {
        let hub = Broadcaster::default();
        let mut before = hub.subscribe();
        hub.close_all();

        let mut after = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.deliver(chunk("too late")), 0);

        let end = tokio::time::timeout(std::time::Duration::from_secs(1), after.recv())
            .await
            .expect("subscriber created after teardown must not wait");
        assert!(end.is_none());
        assert!(before.recv().await.is_none());
        assert!(!hub.unsubscribe(after.id()));
    }

    #[test]
    fn test_clones_share_the_live_set() {
        let hub = Broadcaster::default();
        let other = hub.clone();
        let mut sub = other.subscribe();

        assert_eq!(hub.deliver(chunk("shared")), 1);
        assert_eq!(sub.try_recv().unwrap(), "shared");
    }

    mod ordering {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn chunks_read_back_in_order(
                chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..100)
            ) {
                let hub = Broadcaster::new(100);
                let mut sub = hub.subscribe();

                for c in &chunks {
                    prop_assert_eq!(hub.deliver(Bytes::from(c.clone())), 1);
                }
                hub.unsubscribe(sub.id());

                let mut got = Vec::new();
                while let Some(c) = sub.try_recv() {
                    got.push(c.to_vec());
                }
                prop_assert_eq!(got, chunks);
            }
        }
    }
}
