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

/// Expects the source to emit exactly one item. A second item fails the
/// stream; completion without any item falls back to the default or fails
/// with a no-such-element error.
pub struct SingleFlow<T> {
    source: FlowRef<T>,
    default: Option<T>,
}

impl<T: FlowItem> SingleFlow<T> {
    pub fn new(source: FlowRef<T>, default: Option<T>) -> Self {
        Self { source, default }
    }
}

impl<T: FlowItem> Flow<T> for SingleFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let upstream = Arc::new(SubscriptionCell::new());
        self.source.subscribe(Arc::new(SingleSubscriber {
            deferred: Arc::new(DeferredScalar::new(subscriber.clone(), upstream.clone())),
            downstream: subscriber,
            default: self.default.clone(),
            upstream,
            value: Mutex::new(None),
            done: AtomicBool::new(false),
        }));
    }
}

struct SingleSubscriber<T> {
    deferred: Arc<DeferredScalar<T>>,
    downstream: SubscriberRef<T>,
    default: Option<T>,
    upstream: Arc<SubscriptionCell>,
    value: Mutex<Option<T>>,
    done: AtomicBool,
}

impl<T: FlowItem> Subscriber<T> for SingleSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.downstream.on_subscribe(self.deferred.clone());
            // the whole source must be seen to rule out a second item
            self.upstream.request(demand::UNBOUNDED);
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let mut value = self.value.lock();
        if value.is_some() {
            drop(value);
            self.done.store(true, Ordering::Release);
            self.upstream.cancel();
            self.downstream.on_error(FlowError::MoreThanOneElement);
            return;
        }
        *value = Some(item);
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
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.upstream.cancel();
        let value = self.value.lock().take().or_else(|| self.default.clone());
        match value {
            Some(value) => self.deferred.complete_with(value),
            None => self.downstream.on_error(FlowError::NoSuchElement),
        }
    }
}
