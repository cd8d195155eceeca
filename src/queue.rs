use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::signal::AvailabilitySignal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TryEnqueue {
    Enqueued,
    /// Every slot holds an unread item. Backpressure, not an error.
    Full,
}

/// Fixed-capacity ring of bin indices.
///
/// Producers and consumers each serialize on their own cursor lock and never
/// on each other's. The only cross-side channels are two counting signals:
/// `available` (items written, not yet claimed by a consumer) and `free`
/// (slots a producer may write). A consumer releases a slot to `free` only
/// after reading it, so a producer cannot overwrite an unread item.
pub struct BoundedIndexQueue {
    slots: Box<[AtomicUsize]>,
    producer_cursor: Mutex<usize>,
    consumer_cursor: Mutex<usize>,
    available: AvailabilitySignal,
    free: AvailabilitySignal,
}

impl BoundedIndexQueue {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| AtomicUsize::new(0)).collect(),
            producer_cursor: Mutex::new(0),
            consumer_cursor: Mutex::new(0),
            available: AvailabilitySignal::new(),
            free: AvailabilitySignal::with_count(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn try_enqueue(&self, bin: usize) -> TryEnqueue {
        let mut cursor = self.producer_cursor.lock();
        if !self.free.try_wait() {
            return TryEnqueue::Full;
        }
        self.write(&mut cursor, bin);
        TryEnqueue::Enqueued
    }

    /// Blocks while the queue is full. Returns `false` if the queue was
    /// aborted before a slot became free.
    pub fn enqueue(&self, bin: usize) -> bool {
        // Reserve first; the reservation guarantees the slot under the cursor
        // is free by the time we hold the lock.
        if !self.free.wait() {
            return false;
        }
        let mut cursor = self.producer_cursor.lock();
        self.write(&mut cursor, bin);
        true
    }

    fn write(&self, cursor: &mut usize, bin: usize) {
        self.slots[*cursor].store(bin, Ordering::Release);
        *cursor = (*cursor + 1) % self.slots.len();
        self.available.post();
    }

    pub fn try_dequeue(&self) -> Option<usize> {
        let mut cursor = self.consumer_cursor.lock();
        if !self.available.try_wait() {
            return None;
        }
        Some(self.read(&mut cursor))
    }

    /// Blocks while the queue is empty. Returns `None` once the queue has
    /// been closed and every item has been taken.
    pub fn dequeue(&self) -> Option<usize> {
        if !self.available.wait() {
            return None;
        }
        let mut cursor = self.consumer_cursor.lock();
        Some(self.read(&mut cursor))
    }

    fn read(&self, cursor: &mut usize) -> usize {
        let bin = self.slots[*cursor].load(Ordering::Acquire);
        *cursor = (*cursor + 1) % self.slots.len();
        self.free.post();
        bin
    }

    /// Nothing more will be enqueued. Blocked consumers drain what is left
    /// and then see `None`.
    pub fn close(&self) {
        self.available.close();
    }

    /// Stops both sides: blocked producers give up, blocked consumers drain
    /// and return.
    pub fn abort(&self) {
        self.free.close();
        self.available.close();
    }

    /// Unread items at this instant. Diagnostic only.
    pub fn len(&self) -> usize {
        self.available.try_get_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn full_queue_reports_backpressure() {
        let queue = BoundedIndexQueue::new(2);
        assert_eq!(queue.try_enqueue(1), TryEnqueue::Enqueued);
        assert_eq!(queue.try_enqueue(2), TryEnqueue::Enqueued);
        assert_eq!(queue.try_enqueue(3), TryEnqueue::Full);
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.try_dequeue(), Some(1));
        assert_eq!(queue.try_enqueue(3), TryEnqueue::Enqueued);
        assert_eq!(queue.try_dequeue(), Some(2));
        assert_eq!(queue.try_dequeue(), Some(3));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn closed_queue_drains_then_ends() {
        let queue = BoundedIndexQueue::new(4);
        assert!(queue.enqueue(7));
        queue.close();
        assert_eq!(queue.dequeue(), Some(7));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn abort_wakes_blocked_producer() {
        let queue = Arc::new(BoundedIndexQueue::new(1));
        assert!(queue.enqueue(0));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue(1))
        };
        thread::sleep(std::time::Duration::from_millis(20));
        queue.abort();
        assert!(!producer.join().unwrap());
    }

    /// Replays a sequence of operations against a `VecDeque` model.
    #[quickcheck]
    fn prop_never_exceeds_capacity_or_fabricates(cap: u8, ops: Vec<bool>) -> bool {
        let capacity = usize::from(cap % 8) + 1;
        let queue = BoundedIndexQueue::new(capacity);
        let mut model = VecDeque::new();
        let mut next = 0;

        for push in ops {
            if push {
                let expected = if model.len() < capacity {
                    model.push_back(next);
                    TryEnqueue::Enqueued
                } else {
                    TryEnqueue::Full
                };
                if queue.try_enqueue(next) != expected {
                    return false;
                }
                next += 1;
            } else if queue.try_dequeue() != model.pop_front() {
                return false;
            }
            if queue.len() > capacity || queue.len() != model.len() {
                return false;
            }
        }
        true
    }

    #[test]
    fn every_item_is_dequeued_exactly_once() {
        const PER_PRODUCER: usize = 20_000;
        let queue = Arc::new(BoundedIndexQueue::new(16));
        let seen: Arc<Vec<AtomicU64>> = Arc::new((0..4).map(|_| AtomicU64::new(0)).collect());

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for _ in 0..PER_PRODUCER {
                        assert!(queue.enqueue(p));
                    }
                })
            })
            .collect();
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    while let Some(p) = queue.dequeue() {
                        seen[p].fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        queue.close();
        for c in consumers {
            c.join().unwrap();
        }
        for counter in seen.iter() {
            assert_eq!(counter.load(Ordering::Relaxed), PER_PRODUCER as u64);
        }
        assert_eq!(queue.len(), 0);
    }
}
