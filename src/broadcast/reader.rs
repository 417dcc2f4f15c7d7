//! Per-listener read side of the broadcaster

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::broadcast::broadcaster::{Broadcaster, Subscriber, SubscriberId};

/// Sequential reader over one subscription
///
/// Subscribes on construction and unsubscribes on drop, so the subscription
/// lives exactly as long as whoever is draining it. When an HTTP client goes
/// away the response body is dropped, and with it the subscription.
pub struct ChunkReader {
    broadcaster: Broadcaster,
    subscriber: Subscriber,
}

impl ChunkReader {
    pub fn new(broadcaster: &Broadcaster) -> Self {
        let subscriber = broadcaster.subscribe();
        Self {
            broadcaster: broadcaster.clone(),
            subscriber,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Next chunk, or `None` at end-of-stream
    ///
    /// Suspends while the queue is empty but still open.
    pub async fn read(&mut self) -> Option<Bytes> {
        self.subscriber.recv().await
    }
}

impl Stream for ChunkReader {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().subscriber.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

impl Drop for ChunkReader {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.subscriber.id());
        tracing::info!(
            subscriber = %self.subscriber.id(),
            listeners = self.broadcaster.subscriber_count(),
            "Listener disconnected"
        );
    }
}

impl std::fmt::Debug for ChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReader").field("id", &self.id()).finish()
    }
}
