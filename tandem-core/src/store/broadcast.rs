//! Fan-out publisher.
//!
//! Each subscriber owns an unbounded channel, so a slow subscriber never
//! causes another to miss a value and no value is ever dropped for lag.

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub(crate) struct Broadcast<T> {
    senders: Mutex<Vec<mpsc::UnboundedSender<T>>>,
    closed: AtomicBool,
}

impl<T> Broadcast<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribe to every value sent from now on.
    pub(crate) fn subscribe(&self) -> BoxStream<'static, T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.attach(tx);
        into_stream(rx)
    }

    /// Subscribe, receiving `first` ahead of every later value.
    ///
    /// Callers that need replay-1 hold the lock guarding their current value
    /// across this call so no send can slip in between.
    pub(crate) fn subscribe_with(&self, first: T) -> BoxStream<'static, T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(first);
        self.attach(tx);
        into_stream(rx)
    }

    fn attach(&self, tx: mpsc::UnboundedSender<T>) {
        let mut senders = self.senders.lock();
        // Once closed, the sender is dropped here and the stream ends.
        if !self.closed.load(Ordering::Acquire) {
            senders.push(tx);
        }
    }

    /// Deliver `value` to every live subscriber, pruning dropped ones.
    pub(crate) fn send(&self, value: T) {
        self.senders
            .lock()
            .retain(|tx| tx.send(value.clone()).is_ok());
    }

    /// End every subscriber's stream. Later subscriptions end immediately.
    pub(crate) fn close(&self) {
        let mut senders = self.senders.lock();
        self.closed.store(true, Ordering::Release);
        senders.clear();
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }
}

fn into_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move {
        let value = rx.recv().await?;
        Some((value, rx))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_every_value() {
        let hub = Broadcast::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.send(1);
        hub.send(2);
        hub.close();

        assert_eq!(a.by_ref().collect::<Vec<_>>().await, vec![1, 2]);
        assert_eq!(b.by_ref().collect::<Vec<_>>().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn subscribe_with_replays_first() {
        let hub = Broadcast::new();
        hub.send(0);
        let late = hub.subscribe_with(7);
        hub.send(8);
        hub.close();

        assert_eq!(late.collect::<Vec<_>>().await, vec![7, 8]);
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let hub = Broadcast::new();
        let kept = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.subscriber_count(), 2);

        hub.send("x");
        assert_eq!(hub.subscriber_count(), 1);
        drop(kept);
    }

    #[tokio::test]
    async fn closed_hub_ends_late_streams() {
        let hub: Broadcast<u8> = Broadcast::new();
        hub.close();

        assert_eq!(hub.subscribe_with(3).collect::<Vec<_>>().await, vec![3]);
        assert!(hub.subscribe().collect::<Vec<_>>().await.is_empty());
    }
}
