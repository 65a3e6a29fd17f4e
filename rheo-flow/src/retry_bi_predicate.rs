// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use rheo_core::{
    BiPredicateFn, Flow, FlowError, FlowItem, FlowRef, Subscriber, SubscriberRef,
    Subscription, SubscriptionArbiter, SubscriptionRef,
};

/// Resubscribes to the source on error while the predicate over
/// `(retry count, error)` holds. A failing predicate composes its own
/// error with the stream's.
pub struct RetryBiPredicateFlow<T> {
    source: FlowRef<T>,
    predicate: BiPredicateFn<u64, FlowError>,
}

impl<T: FlowItem> RetryBiPredicateFlow<T> {
    pub fn new(source: FlowRef<T>, predicate: BiPredicateFn<u64, FlowError>) -> Self {
        Self { source, predicate }
    }
}

impl<T: FlowItem> Flow<T> for RetryBiPredicateFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let arbiter = Arc::new(SubscriptionArbiter::new());
        subscriber.on_subscribe(arbiter.clone());
        let coordinator = Arc::new_cyclic(|this| RetrySubscriber {
            downstream: subscriber,
            source: self.source.clone(),
            predicate: Arc::clone(&self.predicate),
            arbiter,
            retries: AtomicU64::new(0),
            wip: AtomicUsize::new(0),
            this: this.clone(),
        });
        coordinator.subscribe_next();
    }
}

struct RetrySubscriber<T> {
    downstream: SubscriberRef<T>,
    source: FlowRef<T>,
    predicate: BiPredicateFn<u64, FlowError>,
    arbiter: Arc<SubscriptionArbiter>,
    retries: AtomicU64,
    wip: AtomicUsize,
    this: Weak<Self>,
}

impl<T: FlowItem> RetrySubscriber<T> {
    fn subscribe_next(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            if self.arbiter.is_cancelled() {
                return;
            }
            let Some(this) = self.this.upgrade() else {
                return;
            };
            self.source.subscribe(this as SubscriberRef<T>);
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return;
            }
        }
    }
}

impl<T: FlowItem> Subscriber<T> for RetrySubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        self.arbiter.set_subscription(subscription);
    }

    fn on_next(&self, item: T) {
        self.downstream.on_next(item);
        self.arbiter.produced(1);
    }

    fn on_error(&self, error: FlowError) {
        let retries = self.retries.fetch_add(1, Ordering::AcqRel) + 1;
        match (self.predicate)(&retries, &error) {
            Err(predicate_error) => {
                self.arbiter.cancel();
                self.downstream
                    .on_error(predicate_error.compose_with(error));
            }
            Ok(false) => {
                self.arbiter.cancel();
                self.downstream.on_error(error);
            }
            Ok(true) => self.subscribe_next(),
        }
    }

    fn on_complete(&self) {
        self.arbiter.cancel();
        self.downstream.on_complete();
    }
}
