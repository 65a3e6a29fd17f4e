// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use rheo_core::{
    BooleanSupplierFn, Flow, FlowError, FlowItem, FlowRef, Subscriber, SubscriberRef,
    Subscription, SubscriptionArbiter, SubscriptionRef,
};

/// Resubscribes to the source each time it completes, until the stop
/// supplier returns true. Synchronously completing sources are collapsed
/// through a missed-counter trampoline so resubscription never recurses.
pub struct RepeatUntilFlow<T> {
    source: FlowRef<T>,
    until: BooleanSupplierFn,
}

impl<T: FlowItem> RepeatUntilFlow<T> {
    pub fn new(source: FlowRef<T>, until: BooleanSupplierFn) -> Self {
        Self { source, until }
    }
}

impl<T: FlowItem> Flow<T> for RepeatUntilFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let arbiter = Arc::new(SubscriptionArbiter::new());
        subscriber.on_subscribe(arbiter.clone());
        let coordinator = Arc::new_cyclic(|this| RepeatUntilSubscriber {
            downstream: subscriber,
            source: self.source.clone(),
            until: Arc::clone(&self.until),
            arbiter,
            wip: AtomicUsize::new(0),
            this: this.clone(),
        });
        coordinator.subscribe_next();
    }
}

struct RepeatUntilSubscriber<T> {
    downstream: SubscriberRef<T>,
    source: FlowRef<T>,
    until: BooleanSupplierFn,
    arbiter: Arc<SubscriptionArbiter>,
    wip: AtomicUsize,
    this: Weak<Self>,
}

impl<T: FlowItem> RepeatUntilSubscriber<T> {
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

impl<T: FlowItem> Subscriber<T> for RepeatUntilSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        self.arbiter.set_subscription(subscription);
    }

    fn on_next(&self, item: T) {
        self.downstream.on_next(item);
        self.arbiter.produced(1);
    }

    fn on_error(&self, error: FlowError) {
        self.arbiter.cancel();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        match (self.until)() {
            Err(error) => {
                self.arbiter.cancel();
                self.downstream.on_error(error);
            }
            Ok(true) => {
                self.arbiter.cancel();
                self.downstream.on_complete();
            }
            Ok(false) => self.subscribe_next(),
        }
    }
}
