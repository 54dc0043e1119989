//! Bounded single-producer, multi-subscriber broadcast channel.
//!
//! Every subscriber gets its own queue. Publishing blocks while any queue
//! is full, so a slow subscriber throttles the producer instead of losing
//! items. Closing the bus wakes everyone: subscribers drain what is left
//! and then see the end of the stream.

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Reasons a receive can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecvError {
    #[error("timed out waiting for the next item")]
    Timeout,
    #[error("bus closed")]
    Closed,
}

struct BusState<T> {
    queues: HashMap<u64, VecDeque<T>>,
    next_id: u64,
    published: u64,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<BusState<T>>,
    readable: Condvar,
    writable: Condvar,
    capacity: usize,
}

/// Producer side of the bus. Clones share the same bus.
pub struct Bus<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Bus<T> {
    /// Creates a bus whose per-subscriber queues hold at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BusState {
                    queues: HashMap::new(),
                    next_id: 0,
                    published: 0,
                    closed: false,
                }),
                readable: Condvar::new(),
                writable: Condvar::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Attaches a subscriber. It sees every item published from now on.
    pub fn subscribe(&self) -> Subscription<T> {
        let mut state = self.shared.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.queues.insert(id, VecDeque::new());
        Subscription {
            id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Publishes one item to every attached subscriber.
    ///
    /// Blocks while any subscriber's queue is full. Returns `false` if the
    /// bus is closed.
    pub fn publish(&self, item: T) -> bool {
        let mut state = self.shared.state.lock();
        let capacity = self.shared.capacity;
        while !state.closed && state.queues.values().any(|q| q.len() >= capacity) {
            self.shared.writable.wait(&mut state);
        }
        if state.closed {
            return false;
        }
        for queue in state.queues.values_mut() {
            queue.push_back(item.clone());
        }
        state.published += 1;
        self.shared.readable.notify_all();
        true
    }

    /// Publishes items in order. Stops early and returns `false` on close.
    pub fn publish_all<I: IntoIterator<Item = T>>(&self, items: I) -> bool {
        items.into_iter().all(|item| self.publish(item))
    }

    /// Closes the bus. Idempotent.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        self.shared.readable.notify_all();
        self.shared.writable.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().queues.len()
    }

    /// Items published since creation.
    pub fn published(&self) -> u64 {
        self.shared.state.lock().published
    }

    /// Per-subscriber queue bound.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Consumer side of the bus. Detaches on drop.
pub struct Subscription<T> {
    id: u64,
    shared: Arc<Shared<T>>,
}

impl<T> Subscription<T> {
    /// Blocks until the next item. `None` once the bus is closed and drained.
    pub fn recv(&mut self) -> Option<T> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(item) = state.queues.get_mut(&self.id).and_then(VecDeque::pop_front) {
                self.shared.writable.notify_all();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.shared.readable.wait(&mut state);
        }
    }

    /// Like [`recv`](Self::recv) with a deadline.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Result<T, RecvError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(item) = state.queues.get_mut(&self.id).and_then(VecDeque::pop_front) {
                self.shared.writable.notify_all();
                return Ok(item);
            }
            if state.closed {
                return Err(RecvError::Closed);
            }
            if self
                .shared
                .readable
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Err(RecvError::Timeout);
            }
        }
    }

    /// Returns a queued item without blocking.
    pub fn try_recv(&mut self) -> Option<T> {
        let mut state = self.shared.state.lock();
        let item = state.queues.get_mut(&self.id).and_then(VecDeque::pop_front);
        if item.is_some() {
            self.shared.writable.notify_all();
        }
        item
    }

    /// Items waiting in this subscriber's queue.
    pub fn pending(&self) -> usize {
        self.shared
            .state
            .lock()
            .queues
            .get(&self.id)
            .map_or(0, VecDeque::len)
    }
}

impl<T> Iterator for Subscription<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.recv()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.queues.remove(&self.id);
        self.shared.writable.notify_all();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_two_subscribers_see_identical_sequence() {
        let bus = Bus::new(16);
        let a = bus.subscribe();
        let b = bus.subscribe();

        let producer = {
            let bus = bus.clone();
            thread::spawn(move || {
                for i in 0..1000u32 {
                    assert!(bus.publish(i.count_ones() % 2 == 1));
                }
                bus.close();
            })
        };

        let reader_a = thread::spawn(move || a.collect::<Vec<bool>>());
        let reader_b = thread::spawn(move || b.collect::<Vec<bool>>());

        producer.join().unwrap();
        let seq_a = reader_a.join().unwrap();
        let seq_b = reader_b.join().unwrap();

        assert_eq!(seq_a.len(), 1000);
        assert_eq!(seq_a, seq_b);
        assert_eq!(bus.published(), 1000);
    }

    #[test]
    fn test_slow_subscriber_applies_backpressure() {
        let bus = Bus::new(4);
        let mut slow = bus.subscribe();

        let producer = {
            let bus = bus.clone();
            thread::spawn(move || {
                for i in 0..20u8 {
                    bus.publish(i);
                }
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(slow.pending() <= 4);

        let received: Vec<u8> = (0..20).map(|_| slow.recv().unwrap()).collect();
        producer.join().unwrap();
        assert_eq!(received, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_late_subscriber_misses_earlier_items() {
        let bus = Bus::new(8);
        let mut early = bus.subscribe();
        bus.publish(1);
        let mut late = bus.subscribe();
        bus.publish(2);

        assert_eq!(early.try_recv(), Some(1));
        assert_eq!(early.try_recv(), Some(2));
        assert_eq!(late.try_recv(), Some(2));
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn test_close_drains_then_ends() {
        let bus = Bus::new(8);
        let mut sub = bus.subscribe();
        bus.publish('x');
        bus.close();

        assert!(!bus.publish('y'));
        assert_eq!(sub.recv(), Some('x'));
        assert_eq!(sub.recv(), None);
        assert_eq!(sub.recv_timeout(Duration::from_millis(1)), Err(RecvError::Closed));
    }

    #[test]
    fn test_close_unblocks_producer() {
        let bus = Bus::new(1);
        let _stalled = bus.subscribe();
        bus.publish(0u8);

        let producer = {
            let bus = bus.clone();
            thread::spawn(move || bus.publish(1u8))
        };
        thread::sleep(Duration::from_millis(20));
        bus.close();
        assert!(!producer.join().unwrap());
    }

    #[test]
    fn test_dropped_subscription_detaches() {
        let bus = Bus::new(1);
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);

        // With nobody attached, publishing never blocks.
        for i in 0..10 {
            assert!(bus.publish(i));
        }
    }

    #[test]
    fn test_recv_timeout() {
        let bus: Bus<u8> = Bus::new(1);
        let mut sub = bus.subscribe();
        assert_eq!(
            sub.recv_timeout(Duration::from_millis(5)),
            Err(RecvError::Timeout)
        );
    }
}
