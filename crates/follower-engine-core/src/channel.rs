// Bounded multi-producer single-consumer channel that hands batches to one
// consumer task, with per-item completion

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};

use crate::error::{FollowerError, FollowerResult};

/// A queued unit of work carrying its own one-shot completion.
///
/// Whoever consumes the item owns resolving it: every item must end in
/// `complete` or `fail`, otherwise the producer observes a closed channel.
pub struct AsyncItem<In, Out> {
    input: In,
    completion: oneshot::Sender<FollowerResult<Out>>,
}

impl<In, Out> AsyncItem<In, Out> {
    pub fn new(input: In) -> (Self, oneshot::Receiver<FollowerResult<Out>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                input,
                completion: tx,
            },
            rx,
        )
    }

    pub fn input(&self) -> &In {
        &self.input
    }

    pub fn complete(self, value: Out) {
        let _ = self.completion.send(Ok(value));
    }

    pub fn fail(self, error: FollowerError) {
        let _ = self.completion.send(Err(error));
    }
}

type BatchConsumer<In, Out> =
    Arc<dyn Fn(Vec<AsyncItem<In, Out>>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Bounded MPSC queue feeding a single batch consumer.
///
/// Producers suspend while the queue is full; `write` returns once the item
/// is enqueued, not once it is consumed. The consumer loop drains whatever
/// is immediately available up to `max_batch_size` and invokes the bound
/// consumer with the batch.
pub struct BatchChannel<In, Out> {
    sender: mpsc::Sender<AsyncItem<In, Out>>,
    receiver: Mutex<Option<mpsc::Receiver<AsyncItem<In, Out>>>>,
    consumer: Mutex<Option<BatchConsumer<In, Out>>>,
    max_batch_size: usize,
    active: AtomicBool,
}

impl<In, Out> BatchChannel<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    pub fn new(capacity: usize, max_batch_size: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            consumer: Mutex::new(None),
            max_batch_size: max_batch_size.max(1),
            active: AtomicBool::new(false),
        }
    }

    /// Enqueue an item, suspending while the queue is full.
    pub async fn write(&self, item: AsyncItem<In, Out>) -> FollowerResult<()> {
        self.sender
            .send(item)
            .await
            .map_err(|_| FollowerError::ChannelError {
                message: "channel consumer is gone".to_string(),
            })
    }

    /// Register the batch consumer. Must happen before activation.
    pub fn bind_consumer<F, Fut>(&self, consumer: F)
    where
        F: Fn(Vec<AsyncItem<In, Out>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: BatchConsumer<In, Out> = Arc::new(move |batch| {
            let fut: BoxFuture<'static, ()> = Box::pin(consumer(batch));
            fut
        });
        let mut slot = self
            .consumer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(boxed);
    }

    /// Start the single consumer task. Exactly one consumer runs per
    /// channel; a second activation is an error.
    pub fn activate_consumer(&self) -> FollowerResult<()> {
        let consumer = {
            let slot = self
                .consumer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.clone().ok_or_else(|| FollowerError::ChannelError {
                message: "no consumer bound".to_string(),
            })?
        };

        if self.active.swap(true, Ordering::SeqCst) {
            return Err(FollowerError::ChannelError {
                message: "consumer already active".to_string(),
            });
        }

        let mut receiver = {
            let mut slot = self
                .receiver
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.take().ok_or_else(|| FollowerError::ChannelError {
                message: "channel receiver already taken".to_string(),
            })?
        };

        let max_batch_size = self.max_batch_size;
        tokio::spawn(async move {
            while let Some(first) = receiver.recv().await {
                let mut batch = Vec::with_capacity(max_batch_size.min(64));
                batch.push(first);
                while batch.len() < max_batch_size {
                    match receiver.try_recv() {
                        Ok(item) => batch.push(item),
                        Err(_) => break,
                    }
                }
                consumer(batch).await;
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn doubling_channel() -> Arc<BatchChannel<u32, u32>> {
        let channel = Arc::new(BatchChannel::new(16, 8));
        channel.bind_consumer(|batch| async move {
            for item in batch {
                let doubled = *item.input() * 2;
                item.complete(doubled);
            }
        });
        channel
    }

    #[tokio::test]
    async fn items_complete_independently() {
        let channel = doubling_channel();
        channel.activate_consumer().unwrap();

        let (item_a, rx_a) = AsyncItem::new(3);
        let (item_b, rx_b) = AsyncItem::new(5);
        channel.write(item_a).await.unwrap();
        channel.write(item_b).await.unwrap();

        assert_eq!(rx_a.await.unwrap().unwrap(), 6);
        assert_eq!(rx_b.await.unwrap().unwrap(), 10);
    }

    #[tokio::test]
    async fn consumer_sees_coalesced_batches() {
        let batches = Arc::new(AtomicUsize::new(0));
        let channel: Arc<BatchChannel<u32, u32>> = Arc::new(BatchChannel::new(16, 8));
        let seen = Arc::clone(&batches);
        channel.bind_consumer(move |batch| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                for item in batch {
                    item.complete(0);
                }
            }
        });

        // Enqueue before activation so the first drain sees all items.
        let mut receivers = Vec::new();
        for n in 0..5 {
            let (item, rx) = AsyncItem::new(n);
            channel.write(item).await.unwrap();
            receivers.push(rx);
        }
        channel.activate_consumer().unwrap();

        for rx in receivers {
            rx.await.unwrap().unwrap();
        }
        assert_eq!(batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_activation_is_rejected() {
        let channel = doubling_channel();
        channel.activate_consumer().unwrap();
        assert!(channel.activate_consumer().is_err());
    }

    #[tokio::test]
    async fn activation_without_consumer_is_rejected() {
        let channel: BatchChannel<u32, u32> = BatchChannel::new(4, 4);
        assert!(channel.activate_consumer().is_err());
    }
}
