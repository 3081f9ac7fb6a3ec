//! Address-keyed FIFO queues.
//!
//! [`AddressQueue`] holds committed envelopes for one address in commit
//! order. [`QueueRegistry`] owns one queue per address for the lifetime of
//! the server that created it; queues are created lazily on first use by
//! either a sender or a receiver, which is what makes the delivered order
//! independent of who attaches first.
//!
//! Receivers waiting on an empty queue are suspended on a [`Notify`]; they
//! never poll. Waiting is cancel-safe: an envelope is only removed from the
//! queue inside a synchronous critical section, so dropping a pending
//! [`AddressQueue::dequeue`] future cannot lose an envelope.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::{log_trace, Address, CommittedEnvelope};

/// Acquire mutex guard, ignoring poisoning
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// FIFO of committed envelopes for a single address.
#[derive(Default)]
pub struct AddressQueue {
    // ---
    entries: Mutex<VecDeque<CommittedEnvelope>>,
    available: Notify,
}

impl AddressQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a committed envelope to the tail.
    pub fn enqueue(&self, env: CommittedEnvelope) {
        // ---
        lock_ignore_poison(&self.entries).push_back(env);
        self.available.notify_one();
    }

    /// Put an envelope back at the head.
    ///
    /// Used when an envelope was dequeued for a receiver that went away
    /// before accepting it; the envelope keeps its place in line.
    pub fn requeue_front(&self, env: CommittedEnvelope) {
        // ---
        lock_ignore_poison(&self.entries).push_front(env);
        self.available.notify_one();
    }

    /// Remove the head envelope if there is one.
    pub fn try_dequeue(&self) -> Option<CommittedEnvelope> {
        lock_ignore_poison(&self.entries).pop_front()
    }

    /// Remove the head envelope, waiting until one is available.
    pub async fn dequeue(&self) -> CommittedEnvelope {
        // ---
        loop {
            if let Some(env) = self.try_dequeue() {
                return env;
            }
            self.available.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owned registry of address queues.
///
/// Key: address, Value: the shared queue for that address.
#[derive(Default)]
pub struct QueueRegistry {
    // ---
    queues: Mutex<HashMap<Address, Arc<AddressQueue>>>,
}

impl QueueRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the queue for `address`, creating it if needed.
    pub fn queue(&self, address: &Address) -> Arc<AddressQueue> {
        // ---
        let mut queues = lock_ignore_poison(&self.queues);
        queues
            .entry(address.clone())
            .or_insert_with(|| {
                log_trace!("creating queue for {address}");
                Arc::new(AddressQueue::new())
            })
            .clone()
    }

    /// Append a committed envelope to the queue of its own address.
    pub fn enqueue(&self, env: CommittedEnvelope) {
        let queue = self.queue(env.address());
        queue.enqueue(env);
    }

    /// Number of envelopes currently queued for `address`.
    pub fn depth(&self, address: &Address) -> usize {
        // ---
        let queues = lock_ignore_poison(&self.queues);
        queues.get(address).map_or(0, |q| q.len())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::Envelope;
    use std::time::Duration;
    use tokio::time::timeout;

    fn committed(address: &str, sequence: u64) -> CommittedEnvelope {
        Envelope::numbered(Address::from(address), sequence)
            .commit()
            .unwrap()
    }

    #[test]
    fn fifo_order_is_preserved() {
        // ---
        let queue = AddressQueue::new();
        for i in 1..=5 {
            queue.enqueue(committed("xtest", i));
        }

        let order: Vec<u64> = std::iter::from_fn(|| queue.try_dequeue())
            .map(|e| e.sequence())
            .collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert!(queue.is_empty());
    }

    #[test]
    fn requeue_front_keeps_place_in_line() {
        // ---
        let queue = AddressQueue::new();
        queue.enqueue(committed("xtest", 1));
        queue.enqueue(committed("xtest", 2));

        let head = queue.try_dequeue().unwrap();
        queue.requeue_front(head);

        assert_eq!(queue.try_dequeue().unwrap().sequence(), 1);
        assert_eq!(queue.try_dequeue().unwrap().sequence(), 2);
    }

    #[tokio::test]
    async fn dequeue_waits_for_enqueue() {
        // ---
        let registry = Arc::new(QueueRegistry::new());
        let address = Address::from("xtest");

        // The registry lock is not held while waiting.
        let queue = registry.queue(&address);
        let waiter = tokio::spawn(async move { queue.dequeue().await });

        tokio::task::yield_now().await;
        registry.enqueue(committed("xtest", 1));

        let env = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("dequeue did not wake")
            .unwrap();
        assert_eq!(env.sequence(), 1);
    }

    #[tokio::test]
    async fn cancelled_dequeue_loses_nothing() {
        // ---
        let registry = QueueRegistry::new();
        let address = Address::from("xtest");

        let queue = registry.queue(&address);
        let cancelled = timeout(Duration::from_millis(20), queue.dequeue()).await;
        assert!(cancelled.is_err());

        registry.enqueue(committed("xtest", 1));
        assert_eq!(registry.depth(&address), 1);

        let env = timeout(Duration::from_secs(1), queue.dequeue())
            .await
            .unwrap();
        assert_eq!(env.sequence(), 1);
        assert_eq!(registry.depth(&address), 0);
    }

    #[test]
    fn addresses_are_isolated() {
        // ---
        let registry = QueueRegistry::new();
        registry.enqueue(committed("a", 1));
        registry.enqueue(committed("b", 1));
        registry.enqueue(committed("b", 2));

        assert_eq!(registry.depth(&Address::from("a")), 1);
        assert_eq!(registry.depth(&Address::from("b")), 2);
        assert_eq!(registry.depth(&Address::from("c")), 0);
        assert_eq!(registry.queue(&Address::from("a")).try_dequeue().unwrap().sequence(), 1);
        assert_eq!(registry.depth(&Address::from("b")), 2);
    }
}
