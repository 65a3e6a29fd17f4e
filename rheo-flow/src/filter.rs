// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rheo_core::{
    hooks, Flow, FlowError, FlowItem, FlowRef, PredicateFn, Subscriber, SubscriberRef,
    Subscription, SubscriptionCell, SubscriptionRef,
};

/// Keeps only the items the predicate accepts. A rejected item costs one
/// upstream credit, which is replenished so downstream demand stays
/// satisfiable.
pub struct FilterFlow<T> {
    source: FlowRef<T>,
    predicate: PredicateFn<T>,
}

impl<T: FlowItem> FilterFlow<T> {
    pub fn new(source: FlowRef<T>, predicate: PredicateFn<T>) -> Self {
        Self { source, predicate }
    }
}

impl<T: FlowItem> Flow<T> for FilterFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        self.source.subscribe(Arc::new(FilterSubscriber {
            downstream: subscriber,
            predicate: Arc::clone(&self.predicate),
            upstream: Arc::new(SubscriptionCell::new()),
            done: AtomicBool::new(false),
        }));
    }
}

struct FilterSubscriber<T> {
    downstream: SubscriberRef<T>,
    predicate: PredicateFn<T>,
    upstream: Arc<SubscriptionCell>,
    done: AtomicBool,
}

impl<T: FlowItem> Subscriber<T> for FilterSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.downstream.on_subscribe(self.upstream.clone());
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        match (self.predicate)(&item) {
            Ok(true) => self.downstream.on_next(item),
            Ok(false) => self.upstream.request(1),
            Err(error) => {
                self.done.store(true, Ordering::Release);
                self.upstream.cancel();
                self.downstream.on_error(error);
            }
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
