// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rheo_core::{
    hooks, Flow, FlowError, FlowItem, FlowRef, PredicateFn, Subscriber, SubscriberRef,
    Subscription, SubscriptionCell, SubscriptionRef,
};

/// Mirrors the source and completes right after the first item for which
/// the predicate holds. The triggering item is still delivered.
pub struct TakeUntilPredicateFlow<T> {
    source: FlowRef<T>,
    predicate: PredicateFn<T>,
}

impl<T: FlowItem> TakeUntilPredicateFlow<T> {
    pub fn new(source: FlowRef<T>, predicate: PredicateFn<T>) -> Self {
        Self { source, predicate }
    }
}

impl<T: FlowItem> Flow<T> for TakeUntilPredicateFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        self.source.subscribe(Arc::new(TakeUntilPredicateSubscriber {
            downstream: subscriber,
            predicate: Arc::clone(&self.predicate),
            upstream: Arc::new(SubscriptionCell::new()),
            done: AtomicBool::new(false),
        }));
    }
}

struct TakeUntilPredicateSubscriber<T> {
    downstream: SubscriberRef<T>,
    predicate: PredicateFn<T>,
    upstream: Arc<SubscriptionCell>,
    done: AtomicBool,
}

impl<T: FlowItem> Subscriber<T> for TakeUntilPredicateSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.downstream.on_subscribe(self.upstream.clone());
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        self.downstream.on_next(item.clone());
        match (self.predicate)(&item) {
            Ok(false) => {}
            Ok(true) => {
                self.done.store(true, Ordering::Release);
                self.upstream.cancel();
                self.downstream.on_complete();
            }
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
