//! Blocking concurrency primitives the standard library doesn't provide.
//!
//! Both types are a direct translation of the original server's
//! `queue_mutex`/`queue_not_empty` condvar pattern: a counting semaphore for
//! admission control, and a bounded FIFO queue built on the same mutex/condvar
//! pair instead of an intrusive linked list.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// A counting semaphore. Used for `empty_slots`/`filled_slots` admission
/// control in the client acceptor (see `kv::netkv`).
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Semaphore { count: Mutex::new(initial), cond: Condvar::new() }
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.cond.wait(count).unwrap();
        }
        *count -= 1;
    }

    /// Return a permit, waking one waiter.
    pub fn release(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.cond.notify_one();
    }
}

/// A bounded, blocking FIFO queue. `push` blocks while the queue is full;
/// `pop` blocks while it is empty.
pub struct BoundedQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedQueue {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        let mut q = self.inner.lock().unwrap();
        while q.len() >= self.capacity {
            q = self.not_full.wait(q).unwrap();
        }
        q.push_back(item);
        self.not_empty.notify_one();
    }

    /// Non-blocking push used by the acceptor, which has already reserved a
    /// slot via `Semaphore` and therefore knows the queue has room.
    pub fn try_push(&self, item: T) -> bool {
        let mut q = self.inner.lock().unwrap();
        if q.len() >= self.capacity {
            return false;
        }
        q.push_back(item);
        self.not_empty.notify_one();
        true
    }

    pub fn pop(&self) -> T {
        let mut q = self.inner.lock().unwrap();
        while q.is_empty() {
            q = self.not_empty.wait(q).unwrap();
        }
        let item = q.pop_front().unwrap();
        self.not_full.notify_one();
        item
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn semaphore_blocks_until_release() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = sem.clone();
        let handle = thread::spawn(move || {
            sem2.acquire();
        });
        thread::sleep(std::time::Duration::from_millis(20));
        sem.release();
        handle.join().unwrap();
    }

    #[test]
    fn bounded_queue_fifo_order() {
        let q = BoundedQueue::new(4);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.pop(), 1);
        assert_eq!(q.pop(), 2);
        assert_eq!(q.pop(), 3);
        assert!(q.is_empty());
    }

    #[test]
    fn bounded_queue_try_push_respects_capacity() {
        let q = BoundedQueue::new(1);
        assert!(q.try_push(1));
        assert!(!q.try_push(2));
        assert_eq!(q.pop(), 1);
        assert!(q.try_push(2));
    }
}
