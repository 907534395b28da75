//! Thread-safe work queue connecting the pipeline stages.
//!
//! A [`WorkQueue`] is a mutex-and-condvar FIFO with a one-way close signal.
//! Closing does not discard buffered items: consumers keep receiving them in
//! order, and only see end-of-stream (`None`) once the buffer is drained.
//! The input queue additionally carries an enforced capacity so a fast
//! producer blocks inside `push` instead of outrunning the workers.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Multi-producer multi-consumer FIFO with blocking `pop` and an idempotent
/// close signal that ends the stream only after the buffer drains.
pub struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

impl<T> WorkQueue<T> {
    /// Queue without a capacity bound; `push` never blocks.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    /// Queue holding at most `capacity` items; `push` blocks while full.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "bounded queue needs a non-zero capacity");
        Self::with_capacity(Some(capacity))
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().expect("work queue mutex poisoned")
    }

    /// Appends an item and wakes one blocked consumer.
    ///
    /// On a bounded queue this blocks while the buffer is at capacity and the
    /// queue is still open. Returns `false` (and drops the item) only if the
    /// queue was closed, which a producer treats as its signal to stop.
    pub fn push(&self, item: T) -> bool {
        let mut inner = self.lock();
        if let Some(cap) = self.capacity {
            while inner.items.len() >= cap && !inner.closed {
                inner = self
                    .not_full
                    .wait(inner)
                    .expect("work queue mutex poisoned");
            }
        }
        if inner.closed {
            return false;
        }
        inner.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Removes and returns the oldest item, blocking while the queue is open
    /// and empty. Returns `None` exactly when the queue is closed *and*
    /// drained; buffered items are always delivered first, in push order.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.lock();
        while inner.items.is_empty() && !inner.closed {
            inner = self
                .not_empty
                .wait(inner)
                .expect("work queue mutex poisoned");
        }
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Marks the queue closed and wakes every waiter. Idempotent; the closed
    /// flag only ever goes false -> true.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Point-in-time number of buffered items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Point-in-time emptiness snapshot.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn delivers_in_fifo_order() {
        let queue = WorkQueue::unbounded();
        for i in 0..10 {
            assert!(queue.push(i));
        }
        for i in 0..10 {
            assert_eq!(queue.pop(), Some(i));
        }
    }

    #[test]
    fn drains_buffered_items_before_reporting_end_of_stream() {
        let queue = WorkQueue::unbounded();
        queue.push("a");
        queue.push("b");
        queue.close();

        assert_eq!(queue.pop(), Some("a"));
        assert_eq!(queue.pop(), Some("b"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn pop_on_closed_empty_queue_returns_none_without_blocking() {
        let queue: WorkQueue<u32> = WorkQueue::unbounded();
        queue.close();
        assert_eq!(queue.pop(), None);
        // Close is idempotent.
        queue.close();
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn push_after_close_is_rejected() {
        let queue = WorkQueue::unbounded();
        queue.close();
        assert!(!queue.push(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_blocks_until_item_arrives() {
        let queue = Arc::new(WorkQueue::unbounded());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                queue.push(42);
            })
        };

        let start = Instant::now();
        assert_eq!(queue.pop(), Some(42));
        assert!(start.elapsed() >= Duration::from_millis(40));
        producer.join().unwrap();
    }

    #[test]
    fn bounded_push_blocks_until_consumer_drains() {
        let queue = Arc::new(WorkQueue::bounded(2));
        assert!(queue.push(1));
        assert!(queue.push(2));

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                queue.pop()
            })
        };

        // Queue is at capacity, so this push stalls until the consumer pops.
        let start = Instant::now();
        assert!(queue.push(3));
        assert!(start.elapsed() >= Duration::from_millis(40));

        assert_eq!(consumer.join().unwrap(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
    }

    #[test]
    fn close_unblocks_bounded_producer() {
        let queue = Arc::new(WorkQueue::bounded(1));
        assert!(queue.push(1));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();
        // The blocked push observes the close and gives up.
        assert!(!producer.join().unwrap());
        // The item buffered before close is still delivered.
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn concurrent_consumers_receive_every_item_exactly_once() {
        let queue = Arc::new(WorkQueue::unbounded());
        let results = Arc::new(Mutex::new(Vec::new()));

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let results = Arc::clone(&results);
                thread::spawn(move || {
                    while let Some(item) = queue.pop() {
                        results.lock().unwrap().push(item);
                    }
                })
            })
            .collect();

        for i in 0..1000u32 {
            queue.push(i);
        }
        queue.close();
        for c in consumers {
            c.join().unwrap();
        }

        let mut seen = results.lock().unwrap().clone();
        seen.sort_unstable();
        let expected: Vec<u32> = (0..1000).collect();
        // Every item delivered exactly once across the consumer pool.
        assert_eq!(seen, expected);
    }
}
