use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Bounded blocking FIFO shared by one producer and one consumer.
///
/// `push` blocks while the queue is full, `pop` blocks while it is empty.
/// Closing wakes every waiter: pushes then fail, pops drain what is left and
/// then report the end.
#[derive(Debug)]
pub struct FrameQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> FrameQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Append an item, waiting for space.
    ///
    /// Returns `false` without enqueuing if the queue is or becomes closed.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.lock();
        while !state.closed && state.items.len() >= self.capacity {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            return false;
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        true
    }

    /// Remove the oldest item, waiting for one to arrive.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close the queue and wake all waiters. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn fifo_order() {
        let queue = FrameQueue::new(4);
        for i in 0..4 {
            assert!(queue.push(i));
        }
        assert_eq!(queue.len(), 4);
        queue.close();

        let drained: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let queue = FrameQueue::<u8>::new(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn push_blocks_while_full() {
        let queue = Arc::new(FrameQueue::new(2));
        let pushed = Arc::new(AtomicUsize::new(0));

        let producer = {
            let queue = Arc::clone(&queue);
            let pushed = Arc::clone(&pushed);
            thread::spawn(move || {
                for i in 0..5 {
                    assert!(queue.push(i));
                    pushed.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert_eq!(pushed.load(Ordering::SeqCst), 2);
        assert_eq!(queue.len(), 2);

        // One pop admits exactly one pending push.
        let mut seen = vec![queue.pop().unwrap()];
        wait_for(|| pushed.load(Ordering::SeqCst) == 3);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(pushed.load(Ordering::SeqCst), 3);
        assert_eq!(queue.len(), 2);

        for _ in 0..4 {
            seen.push(queue.pop().unwrap());
            assert!(queue.len() <= 2);
        }
        producer.join().unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    fn wait_for(cond: impl Fn() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(std::time::Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn close_wakes_blocked_pusher() {
        let queue = Arc::new(FrameQueue::new(1));
        assert!(queue.push(1));

        let pusher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };
        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert!(!pusher.join().unwrap());
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn close_wakes_blocked_popper() {
        let queue = Arc::new(FrameQueue::<u32>::new(1));
        let popper = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert_eq!(popper.join().unwrap(), None);
        assert!(queue.is_closed());
    }

    #[test]
    fn push_after_close_fails() {
        let queue = FrameQueue::new(3);
        queue.close();
        queue.close();
        assert!(!queue.push(7));
        assert!(queue.is_empty());
    }
}
