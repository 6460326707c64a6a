//! Fixed-capacity FIFO between admission and the worker.

use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use super::TaskError;

/// A bounded FIFO of task IDs.
///
/// The queue carries handles (IDs) rather than tasks; the worker resolves
/// them against the [`Registry`](super::Registry). Both channel halves live
/// inside this type, so the channel cannot close while the queue exists.
#[derive(Debug)]
pub struct BoundedQueue {
    sender: mpsc::Sender<String>,
    receiver: Mutex<mpsc::Receiver<String>>,
    capacity: usize,
}

impl BoundedQueue {
    /// Creates a queue holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. [`Settings`](crate::config::Settings)
    /// validation rejects that value before a queue is ever built.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            capacity,
        }
    }

    /// Waits up to `timeout` for a free slot.
    ///
    /// Fails with [`TaskError::QueueFull`] when the deadline passes; the
    /// queue is left unchanged in that case.
    pub async fn send_timeout(&self, id: String, timeout: Duration) -> Result<(), TaskError> {
        self.sender
            .send_timeout(id, timeout)
            .await
            .map_err(|_| TaskError::QueueFull)
    }

    /// Enqueues `id` only if a slot is free right now.
    pub fn try_send(&self, id: String) -> Result<(), TaskError> {
        self.sender.try_send(id).map_err(|_| TaskError::QueueFull)
    }

    /// Waits for the next ID.
    ///
    /// Cancel-safe: dropping the returned future never loses an entry, so
    /// it can be raced against a shutdown signal in `tokio::select!`.
    pub async fn receive(&self) -> Option<String> {
        self.receiver.lock().await.recv().await
    }

    /// Returns the number of queued entries.
    pub fn len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::Instant;

    #[tokio::test]
    async fn fifo_order() {
        let queue = BoundedQueue::new(4);
        for id in ["a", "b", "c"] {
            queue.try_send(id.to_owned()).unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.receive().await.as_deref(), Some("a"));
        assert_eq!(queue.receive().await.as_deref(), Some("b"));
        assert_eq!(queue.receive().await.as_deref(), Some("c"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn try_send_rejects_when_full() {
        let queue = BoundedQueue::new(1);
        queue.try_send("a".into()).unwrap();
        assert_eq!(queue.try_send("b".into()), Err(TaskError::QueueFull));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn send_timeout_waits_then_fails() {
        let queue = BoundedQueue::new(1);
        queue.try_send("a".into()).unwrap();

        let start = Instant::now();
        let result = queue
            .send_timeout("b".into(), Duration::from_millis(100))
            .await;
        assert_eq!(result, Err(TaskError::QueueFull));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(queue.receive().await.as_deref(), Some("a"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn send_timeout_succeeds_once_space_frees() {
        let queue = std::sync::Arc::new(BoundedQueue::new(1));
        queue.try_send("a".into()).unwrap();

        let consumer = std::sync::Arc::clone(&queue);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            consumer.receive().await
        });

        queue
            .send_timeout("b".into(), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(queue.receive().await.as_deref(), Some("b"));
    }
}
