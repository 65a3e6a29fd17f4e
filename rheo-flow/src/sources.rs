// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Source constructors.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rheo_core::{
    demand, signal_complete, signal_error, Flow, FlowError, FlowItem, FlowRef, NoopSubscription,
    Subscriber, SubscriberRef, Subscription,
};

/// A backpressured source over a cloneable iterable: each subscription
/// walks its own fresh iterator, honoring demand and cancellation between
/// pulls.
pub struct FromIterable<I> {
    source: I,
}

impl<T, I> Flow<T> for FromIterable<I>
where
    T: FlowItem,
    I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
    I::IntoIter: Send,
{
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let subscription = Arc::new(IterSubscription {
            iter: Mutex::new(self.source.clone().into_iter().peekable()),
            requested: AtomicU64::new(0),
            wip: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            done: AtomicBool::new(false),
            downstream: subscriber.clone(),
        });
        subscriber.on_subscribe(subscription.clone());
        // completes straight away when the iterable is empty
        subscription.drain();
    }
}

struct IterSubscription<T, I: Iterator<Item = T>> {
    iter: Mutex<std::iter::Peekable<I>>,
    requested: AtomicU64,
    wip: AtomicUsize,
    cancelled: AtomicBool,
    done: AtomicBool,
    downstream: SubscriberRef<T>,
}

impl<T: FlowItem, I: Iterator<Item = T> + Send> IterSubscription<T, I> {
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            let r = self.requested.load(Ordering::Acquire);
            let mut emitted = 0u64;
            while emitted != r {
                if self.cancelled.load(Ordering::Acquire) {
                    return;
                }
                let item = self.iter.lock().next();
                match item {
                    Some(item) => {
                        self.downstream.on_next(item);
                        emitted += 1;
                    }
                    None => {
                        if !self.done.swap(true, Ordering::AcqRel) {
                            self.downstream.on_complete();
                        }
                        return;
                    }
                }
            }
            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            if self.iter.lock().peek().is_none() {
                if !self.done.swap(true, Ordering::AcqRel) {
                    self.downstream.on_complete();
                }
                return;
            }
            if emitted > 0 && r != demand::UNBOUNDED {
                demand::produced(&self.requested, emitted);
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return;
            }
        }
    }
}

impl<T: FlowItem, I: Iterator<Item = T> + Send> Subscription for IterSubscription<T, I> {
    fn request(&self, n: u64) {
        if !demand::validate(n) {
            return;
        }
        demand::add(&self.requested, n);
        self.drain();
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// A flow over any cloneable iterable.
pub fn from_iter<T, I>(source: I) -> FlowRef<T>
where
    T: FlowItem,
    I: IntoIterator<Item = T> + Clone + Send + Sync + 'static,
    I::IntoIter: Send,
{
    Arc::new(FromIterable { source })
}

/// A single-item flow.
pub fn just<T: FlowItem>(item: T) -> FlowRef<T> {
    from_iter(vec![item])
}

/// The ascending integers `start..start + count`.
pub fn range(start: u64, count: u64) -> FlowRef<u64> {
    from_iter(start..start + count)
}

/// A flow that completes immediately.
pub fn empty<T: FlowItem>() -> FlowRef<T> {
    struct Empty;
    impl<T: FlowItem> Flow<T> for Empty {
        fn subscribe(&self, subscriber: SubscriberRef<T>) {
            signal_complete(&subscriber);
        }
    }
    Arc::new(Empty)
}

/// A flow that never signals anything beyond its subscription.
pub fn never<T: FlowItem>() -> FlowRef<T> {
    struct Never;
    impl<T: FlowItem> Flow<T> for Never {
        fn subscribe(&self, subscriber: SubscriberRef<T>) {
            subscriber.on_subscribe(Arc::new(NoopSubscription));
        }
    }
    Arc::new(Never)
}

/// A flow that fails immediately with a clone of `error`.
pub fn error_flow<T: FlowItem>(error: FlowError) -> FlowRef<T> {
    struct ErrorFlow {
        error: FlowError,
    }
    impl<T: FlowItem> Flow<T> for ErrorFlow {
        fn subscribe(&self, subscriber: SubscriberRef<T>) {
            signal_error(&subscriber, self.error.clone());
        }
    }
    Arc::new(ErrorFlow { error })
}
