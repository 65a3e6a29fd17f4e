// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    value: Option<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn boxed(value: Option<T>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// Unbounded lock-free multi-producer/single-consumer linked queue.
///
/// Producers swap themselves onto the tail with a single atomic exchange
/// and then link the previous tail forward; the consumer chases `next`
/// pointers from a stub head. Between the exchange and the link a
/// just-enqueued node is momentarily unreachable, so the consumer spins
/// briefly when it can prove the queue is non-empty but the link has not
/// landed yet.
///
/// Contract: any number of threads may offer; at most one thread polls at
/// any moment.
pub struct MpscLinked<T> {
    /// Producer side: the most recently enqueued node.
    tail: AtomicPtr<Node<T>>,
    /// Consumer side: the stub node in front of the oldest live node.
    head: UnsafeCell<*mut Node<T>>,
}

unsafe impl<T: Send> Send for MpscLinked<T> {}
unsafe impl<T: Send> Sync for MpscLinked<T> {}

impl<T> MpscLinked<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let stub = Node::boxed(None);
        Self {
            tail: AtomicPtr::new(stub),
            head: UnsafeCell::new(stub),
        }
    }

    /// Enqueue `value`. Never fails; the queue is unbounded.
    pub fn offer(&self, value: T) {
        let node = Node::boxed(Some(value));
        let previous = self.tail.swap(node, Ordering::AcqRel);
        unsafe {
            (*previous).next.store(node, Ordering::Release);
        }
    }

    /// Dequeue the oldest item, if any. Single-consumer only.
    pub fn poll(&self) -> Option<T> {
        unsafe {
            let head = *self.head.get();
            let mut next = (*head).next.load(Ordering::Acquire);

            if next.is_null() {
                if ptr::eq(head, self.tail.load(Ordering::Acquire)) {
                    return None;
                }
                // a producer finished its swap but not its link: the item
                // exists, wait for the pointer to land
                loop {
                    next = (*head).next.load(Ordering::Acquire);
                    if !next.is_null() {
                        break;
                    }
                    std::hint::spin_loop();
                }
            }

            let value = (*next).value.take();
            *self.head.get() = next;
            drop(Box::from_raw(head));
            value
        }
    }

    /// Whether the queue is observably empty. Single-consumer only.
    pub fn is_empty(&self) -> bool {
        unsafe {
            let head = *self.head.get();
            (*head).next.load(Ordering::Acquire).is_null()
                && ptr::eq(head, self.tail.load(Ordering::Acquire))
        }
    }

    /// Drop everything currently enqueued. Single-consumer only.
    pub fn clear(&self) {
        while self.poll().is_some() {}
    }
}

impl<T> Default for MpscLinked<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpscLinked<T> {
    fn drop(&mut self) {
        self.clear();
        unsafe {
            drop(Box::from_raw(*self.head.get()));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn offer_poll_fifo_single_thread() {
        let queue = MpscLinked::new();
        queue.offer(1);
        queue.offer(2);
        queue.offer(3);
        assert_eq!(queue.poll(), Some(1));
        assert_eq!(queue.poll(), Some(2));
        assert_eq!(queue.poll(), Some(3));
        assert_eq!(queue.poll(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn drop_releases_pending_items() {
        let queue = MpscLinked::new();
        let item = Arc::new(0u8);
        queue.offer(Arc::clone(&item));
        queue.offer(Arc::clone(&item));
        drop(queue);
        assert_eq!(Arc::strong_count(&item), 1);
    }

    #[test]
    fn many_producers_one_consumer() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 5_000;

        let queue = Arc::new(MpscLinked::new());
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.offer(p * PER_PRODUCER + i);
                    }
                })
            })
            .collect();

        let mut seen = vec![0usize; PRODUCERS];
        let mut count = 0;
        while count < PRODUCERS * PER_PRODUCER {
            if let Some(v) = queue.poll() {
                let producer = v / PER_PRODUCER;
                let sequence = v % PER_PRODUCER;
                // per-producer order is preserved
                assert_eq!(seen[producer], sequence);
                seen[producer] += 1;
                count += 1;
            } else {
                std::thread::yield_now();
            }
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(queue.is_empty());
    }
}
