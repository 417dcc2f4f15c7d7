//! Heavy subscribe/unsubscribe churn while the producer delivers continuously

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipecast::constants::DEFAULT_CHUNK_SIZE;
use pipecast::{Broadcaster, ChunkReader};

const CONSUMERS: usize = 100;
const ITERATIONS: usize = 1000;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn churn_during_delivery() {
    let hub = Broadcaster::default();
    let stop = Arc::new(AtomicBool::new(false));
    let delivered = Arc::new(AtomicU64::new(0));

    let producer = {
        let hub = hub.clone();
        let stop = stop.clone();
        let delivered = delivered.clone();
        tokio::spawn(async move {
            let chunk = Bytes::from(vec![0x55u8; DEFAULT_CHUNK_SIZE]);
            while !stop.load(Ordering::Relaxed) {
                hub.deliver(chunk.clone());
                delivered.fetch_add(1, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
        })
    };

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|n| {
            let hub = hub.clone();
            tokio::spawn(async move {
                for i in 0..ITERATIONS {
                    if n % 2 == 0 {
                        let reader = ChunkReader::new(&hub);
                        if i % 100 == 0 {
                            tokio::task::yield_now().await;
                        }
                        drop(reader);
                    } else {
                        let mut sub = hub.subscribe();
                        tokio::task::yield_now().await;
                        assert!(hub.unsubscribe(sub.id()));

                        while let Some(chunk) = sub.try_recv() {
                            assert_eq!(chunk.len(), DEFAULT_CHUNK_SIZE);
                        }
                        // Closed and drained: later deliveries can't reach it
                        tokio::task::yield_now().await;
                        assert!(sub.try_recv().is_none());
                    }
                }
            })
        })
        .collect();

    let all = async {
        for consumer in consumers {
            consumer.await.expect("consumer panicked");
        }
    };
    tokio::time::timeout(Duration::from_secs(120), all)
        .await
        .expect("consumers deadlocked");

    stop.store(true, Ordering::Relaxed);
    producer.await.expect("producer panicked");

    assert!(delivered.load(Ordering::Relaxed) > 0);
    assert_eq!(hub.subscriber_count(), 0);
}

#[test]
fn parallel_producers_with_os_threads() {
    let hub = Broadcaster::new(8);
    let mut keep = hub.subscribe();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let hub = hub.clone();
            std::thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    let sub = hub.subscribe();
                    hub.deliver(Bytes::from_static(b"x"));
                    hub.unsubscribe(sub.id());
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(hub.subscriber_count(), 1);
    let mut kept = 0;
    while keep.try_recv().is_some() {
        kept += 1;
    }
    assert_eq!(kept, 8);
}
