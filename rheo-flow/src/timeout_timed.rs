// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use rheo_core::{
    hooks, Cancel, Flow, FlowError, FlowItem, FlowRef, FullArbiter, FullArbiterSubscriber,
    SerialCancel, SerializedSubscriber, Subscriber, SubscriberRef, Subscription,
    SubscriptionCell, SubscriptionRef,
};
use rheo_scheduler::{SchedulerRef, Worker, WorkerRef};

/// Fails (or switches to a fallback) when the gap between consecutive
/// items exceeds the timeout.
///
/// Each item arms a fresh one-shot timer stamped with the item's index;
/// the timer only fires through if its index still matches when it wakes,
/// which resolves the race between an item and its own deadline. With a
/// fallback configured, the switch routes through a full arbiter so
/// demand and ordering carry over.
pub struct TimeoutTimedFlow<T> {
    source: FlowRef<T>,
    timeout: Duration,
    scheduler: SchedulerRef,
    fallback: Option<FlowRef<T>>,
}

impl<T: FlowItem> TimeoutTimedFlow<T> {
    pub fn new(
        source: FlowRef<T>,
        timeout: Duration,
        scheduler: SchedulerRef,
        fallback: Option<FlowRef<T>>,
    ) -> Self {
        Self {
            source,
            timeout,
            scheduler,
            fallback,
        }
    }
}

impl<T: FlowItem> Flow<T> for TimeoutTimedFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let worker = self.scheduler.create_worker();
        match &self.fallback {
            None => {
                // timeouts race regular signals, hence the serialized downstream
                let serialized: SubscriberRef<T> =
                    Arc::new(SerializedSubscriber::new(subscriber));
                let timed = Arc::new_cyclic(|this: &Weak<TimeoutTimedSubscriber<T>>| {
                    TimeoutTimedSubscriber {
                        downstream: serialized,
                        timeout: self.timeout,
                        worker,
                        upstream: Arc::new(SubscriptionCell::new()),
                        timer: SerialCancel::new(),
                        index: AtomicU64::new(0),
                        done: AtomicBool::new(false),
                        this: this.clone(),
                    }
                });
                self.source.subscribe(timed);
            }
            Some(fallback) => {
                let timed = Arc::new_cyclic(|this: &Weak<TimeoutFallbackSubscriber<T>>| {
                    TimeoutFallbackSubscriber {
                        arbiter: Arc::new(FullArbiter::new(subscriber.clone())),
                        downstream: subscriber,
                        fallback: fallback.clone(),
                        timeout: self.timeout,
                        worker,
                        upstream: Arc::new(SubscriptionCell::new()),
                        timer: SerialCancel::new(),
                        index: AtomicU64::new(0),
                        done: AtomicBool::new(false),
                        this: this.clone(),
                    }
                });
                self.source.subscribe(timed);
            }
        }
    }
}

struct TimeoutTimedSubscriber<T> {
    downstream: SubscriberRef<T>,
    timeout: Duration,
    worker: WorkerRef,
    upstream: Arc<SubscriptionCell>,
    timer: SerialCancel,
    index: AtomicU64,
    done: AtomicBool,
    this: Weak<Self>,
}

impl<T: FlowItem> TimeoutTimedSubscriber<T> {
    fn schedule_timeout(&self, index: u64) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let handle = self.worker.schedule(
            Arc::new(move || this.fire(index)),
            self.timeout,
        );
        self.timer.set(handle);
    }

    fn fire(&self, index: u64) {
        if index != self.index.load(Ordering::Acquire) {
            return;
        }
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.upstream.cancel();
        self.teardown();
        self.downstream.on_error(FlowError::Timeout);
    }

    fn teardown(&self) {
        self.timer.dispose();
        self.worker.dispose();
    }
}

impl<T: FlowItem> Subscriber<T> for TimeoutTimedSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            if let Some(this) = self.this.upgrade() {
                self.downstream.on_subscribe(this);
            }
            self.schedule_timeout(0);
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let index = self.index.fetch_add(1, Ordering::AcqRel) + 1;
        self.downstream.on_next(item);
        self.schedule_timeout(index);
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.teardown();
        self.upstream.cancel();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.teardown();
        self.upstream.cancel();
        self.downstream.on_complete();
    }
}

impl<T: FlowItem> Subscription for TimeoutTimedSubscriber<T> {
    fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.teardown();
        self.upstream.cancel();
    }
}

struct TimeoutFallbackSubscriber<T> {
    arbiter: Arc<FullArbiter<T>>,
    downstream: SubscriberRef<T>,
    fallback: FlowRef<T>,
    timeout: Duration,
    worker: WorkerRef,
    upstream: Arc<SubscriptionCell>,
    timer: SerialCancel,
    index: AtomicU64,
    done: AtomicBool,
    this: Weak<Self>,
}

impl<T: FlowItem> TimeoutFallbackSubscriber<T> {
    fn schedule_timeout(&self, index: u64) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let handle = self.worker.schedule(
            Arc::new(move || this.fire(index)),
            self.timeout,
        );
        self.timer.set(handle);
    }

    /// Switch to the fallback if no newer item beat the deadline.
    fn fire(&self, index: u64) {
        if index != self.index.load(Ordering::Acquire) {
            return;
        }
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.upstream.cancel();
        self.timer.dispose();
        self.worker.dispose();
        self.fallback
            .subscribe(Arc::new(FullArbiterSubscriber::new(Arc::clone(
                &self.arbiter,
            ))));
    }

    fn teardown(&self) {
        self.timer.dispose();
        self.worker.dispose();
    }
}

impl<T: FlowItem> Subscriber<T> for TimeoutFallbackSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if !self.upstream.set_once(subscription.clone()) {
            return;
        }
        if self.arbiter.set_subscription(subscription) {
            if let Some(this) = self.this.upgrade() {
                self.downstream
                    .on_subscribe(Arc::new(TimeoutFallbackSubscription { parent: this }));
            }
            self.schedule_timeout(0);
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let index = self.index.fetch_add(1, Ordering::AcqRel) + 1;
        let tag = match self.upstream_tag() {
            Some(tag) => tag,
            None => return,
        };
        if self.arbiter.on_next(item, &tag) {
            self.schedule_timeout(index);
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.teardown();
        let tag = self.upstream_tag();
        self.upstream.cancel();
        match tag {
            Some(tag) => self.arbiter.on_error(error, &tag),
            None => hooks::on_error(error),
        }
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.teardown();
        let tag = self.upstream_tag();
        self.upstream.cancel();
        if let Some(tag) = tag {
            self.arbiter.on_complete(&tag);
        }
    }
}

impl<T: FlowItem> TimeoutFallbackSubscriber<T> {
    fn upstream_tag(&self) -> Option<SubscriptionRef> {
        self.upstream.current()
    }
}

struct TimeoutFallbackSubscription<T> {
    parent: Arc<TimeoutFallbackSubscriber<T>>,
}

impl<T: FlowItem> Subscription for TimeoutFallbackSubscription<T> {
    fn request(&self, n: u64) {
        self.parent.arbiter.request(n);
    }

    fn cancel(&self) {
        self.parent.arbiter.cancel();
        self.parent.teardown();
    }
}
