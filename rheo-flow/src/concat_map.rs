// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use rheo_core::{
    hooks, Flow, FlowError, FlowItem, FlowRef, MapFn, SerializedSubscriber, SpscRing, Subscriber,
    SubscriberRef, Subscription, SubscriptionArbiter, SubscriptionCell, SubscriptionRef,
};

/// Upstream request cadence when none is given explicitly.
pub const DEFAULT_PREFETCH: usize = 2;

/// Maps each upstream item to an inner flow and drains the inners
/// strictly one after another.
///
/// Upstream items buffer in a prefetch-sized ring. A missed counter
/// collapses re-entrant subscribe-next calls, so a long run of inners
/// that complete synchronously unwinds as a loop instead of recursing.
/// Downstream demand is carried across inners by a subscription arbiter.
pub struct ConcatMapFlow<T, R> {
    source: FlowRef<T>,
    mapper: MapFn<T, FlowRef<R>>,
    prefetch: usize,
}

impl<T: FlowItem, R: FlowItem> ConcatMapFlow<T, R> {
    pub fn new(source: FlowRef<T>, mapper: MapFn<T, FlowRef<R>>, prefetch: usize) -> Self {
        Self {
            source,
            mapper,
            prefetch,
        }
    }
}

impl<T: FlowItem, R: FlowItem> Flow<R> for ConcatMapFlow<T, R> {
    fn subscribe(&self, subscriber: SubscriberRef<R>) {
        let serialized: SubscriberRef<R> = Arc::new(SerializedSubscriber::new(subscriber));
        let coordinator = Arc::new_cyclic(|this: &Weak<ConcatMapCoordinator<T, R>>| {
            ConcatMapCoordinator {
                downstream: serialized,
                mapper: Arc::clone(&self.mapper),
                prefetch: self.prefetch as u64,
                queue: SpscRing::new(self.prefetch),
                upstream: Arc::new(SubscriptionCell::new()),
                arbiter: Arc::new(SubscriptionArbiter::new()),
                wip: AtomicUsize::new(0),
                active: AtomicBool::new(false),
                done: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                this: this.clone(),
            }
        });
        self.source.subscribe(coordinator);
    }
}

struct ConcatMapCoordinator<T, R> {
    downstream: SubscriberRef<R>,
    mapper: MapFn<T, FlowRef<R>>,
    prefetch: u64,
    queue: SpscRing<T>,
    upstream: Arc<SubscriptionCell>,
    arbiter: Arc<SubscriptionArbiter>,
    wip: AtomicUsize,
    /// Whether an inner is currently being drained.
    active: AtomicBool,
    done: AtomicBool,
    cancelled: AtomicBool,
    this: Weak<Self>,
}

impl<T: FlowItem, R: FlowItem> ConcatMapCoordinator<T, R> {
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                self.queue.clear();
                return;
            }
            if !self.active.load(Ordering::Acquire) {
                let done = self.done.load(Ordering::Acquire);
                match self.queue.poll() {
                    Some(item) => match (self.mapper)(item) {
                        Ok(inner_flow) => {
                            self.active.store(true, Ordering::Release);
                            inner_flow.subscribe(Arc::new(ConcatMapInner {
                                parent: self.this.clone(),
                            }));
                        }
                        Err(error) => {
                            self.upstream.cancel();
                            self.fail(error);
                            return;
                        }
                    },
                    None => {
                        if done {
                            self.upstream.cancel();
                            self.arbiter.cancel();
                            self.downstream.on_complete();
                            return;
                        }
                    }
                }
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return;
            }
        }
    }

    fn fail(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.cancelled.store(true, Ordering::Release);
        self.upstream.cancel();
        self.arbiter.cancel();
        self.downstream.on_error(error);
    }

    fn inner_complete(&self) {
        self.active.store(false, Ordering::Release);
        if !self.done.load(Ordering::Acquire) {
            self.upstream.request(1);
        }
        self.drain();
    }

    fn inner_error(&self, error: FlowError) {
        self.upstream.cancel();
        self.fail(error);
    }
}

impl<T: FlowItem, R: FlowItem> Subscriber<T> for ConcatMapCoordinator<T, R> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            if let Some(this) = self.this.upgrade() {
                self.downstream.on_subscribe(Arc::new(ConcatMapSubscription {
                    coordinator: this,
                }));
            }
            self.upstream.request(self.prefetch);
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        if self.queue.offer(item) {
            if let Some(this) = self.this.upgrade() {
                this.drain();
            }
        } else {
            self.upstream.cancel();
            self.fail(FlowError::queue_full("concat prefetch buffer"));
        }
    }

    fn on_error(&self, error: FlowError) {
        self.fail(error);
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            if let Some(this) = self.this.upgrade() {
                this.drain();
            }
        }
    }
}

struct ConcatMapSubscription<T, R> {
    coordinator: Arc<ConcatMapCoordinator<T, R>>,
}

impl<T: FlowItem, R: FlowItem> Subscription for ConcatMapSubscription<T, R> {
    fn request(&self, n: u64) {
        self.coordinator.arbiter.request(n);
    }

    fn cancel(&self) {
        let coordinator = &self.coordinator;
        if !coordinator.cancelled.swap(true, Ordering::AcqRel) {
            coordinator.upstream.cancel();
            coordinator.arbiter.cancel();
        }
    }
}

struct ConcatMapInner<T, R> {
    parent: Weak<ConcatMapCoordinator<T, R>>,
}

impl<T: FlowItem, R: FlowItem> Subscriber<R> for ConcatMapInner<T, R> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if let Some(parent) = self.parent.upgrade() {
            parent.arbiter.set_subscription(subscription);
        } else {
            subscription.cancel();
        }
    }

    fn on_next(&self, item: R) {
        if let Some(parent) = self.parent.upgrade() {
            parent.downstream.on_next(item);
            parent.arbiter.produced(1);
        }
    }

    fn on_error(&self, error: FlowError) {
        match self.parent.upgrade() {
            Some(parent) => parent.inner_error(error),
            None => hooks::on_error(error),
        }
    }

    fn on_complete(&self) {
        if let Some(parent) = self.parent.upgrade() {
            parent.inner_complete();
        }
    }
}
