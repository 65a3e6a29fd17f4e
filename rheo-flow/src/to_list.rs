// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rheo_core::{
    demand, hooks, Flow, FlowError, FlowItem, FlowRef, Subscriber, SubscriberRef, Subscription,
    SubscriptionCell, SubscriptionRef,
};

use crate::deferred::DeferredScalar;

/// Collects every upstream item into one `Vec` emitted at completion.
pub struct ToListFlow<T> {
    source: FlowRef<T>,
}

impl<T: FlowItem> ToListFlow<T> {
    pub fn new(source: FlowRef<T>) -> Self {
        Self { source }
    }
}

impl<T: FlowItem> Flow<Vec<T>> for ToListFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<Vec<T>>) {
        let upstream = Arc::new(SubscriptionCell::new());
        self.source.subscribe(Arc::new(ToListSubscriber {
            deferred: Arc::new(DeferredScalar::new(subscriber.clone(), upstream.clone())),
            downstream: subscriber,
            upstream,
            collected: Mutex::new(Some(Vec::new())),
            done: AtomicBool::new(false),
        }));
    }
}

struct ToListSubscriber<T> {
    deferred: Arc<DeferredScalar<Vec<T>>>,
    downstream: SubscriberRef<Vec<T>>,
    upstream: Arc<SubscriptionCell>,
    collected: Mutex<Option<Vec<T>>>,
    done: AtomicBool,
}

impl<T: FlowItem> Subscriber<T> for ToListSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.downstream.on_subscribe(self.deferred.clone());
            self.upstream.request(demand::UNBOUNDED);
        }
    }

    fn on_next(&self, item: T) {
        if let Some(collected) = self.collected.lock().as_mut() {
            collected.push(item);
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.upstream.cancel();
        *self.collected.lock() = None;
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.upstream.cancel();
        if let Some(collected) = self.collected.lock().take() {
            self.deferred.complete_with(collected);
        }
    }
}
