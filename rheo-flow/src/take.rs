// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use rheo_core::{
    hooks, signal_complete, Flow, FlowError, FlowItem, FlowRef, Subscriber, SubscriberRef,
    Subscription, SubscriptionCell, SubscriptionRef,
};

/// Passes at most `count` items downstream, then cancels the upstream and
/// completes. Items the upstream pushes past the limit are dropped.
pub struct TakeFlow<T> {
    source: FlowRef<T>,
    count: u64,
}

impl<T: FlowItem> TakeFlow<T> {
    pub fn new(source: FlowRef<T>, count: u64) -> Self {
        Self { source, count }
    }
}

impl<T: FlowItem> Flow<T> for TakeFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        if self.count == 0 {
            signal_complete(&subscriber);
            return;
        }
        self.source.subscribe(Arc::new(TakeSubscriber {
            downstream: subscriber,
            limit: self.count,
            seen: AtomicU64::new(0),
            upstream: Arc::new(SubscriptionCell::new()),
            done: AtomicBool::new(false),
        }));
    }
}

struct TakeSubscriber<T> {
    downstream: SubscriberRef<T>,
    limit: u64,
    seen: AtomicU64,
    upstream: Arc<SubscriptionCell>,
    done: AtomicBool,
}

impl<T: FlowItem> Subscriber<T> for TakeSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.downstream.on_subscribe(self.upstream.clone());
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let count = self.seen.fetch_add(1, Ordering::AcqRel) + 1;
        if count < self.limit {
            self.downstream.on_next(item);
        } else if count == self.limit {
            self.done.store(true, Ordering::Release);
            self.upstream.cancel();
            self.downstream.on_next(item);
            self.downstream.on_complete();
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.upstream.cancel();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.upstream.cancel();
            self.downstream.on_complete();
        }
    }
}
