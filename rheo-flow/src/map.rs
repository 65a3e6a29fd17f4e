// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rheo_core::{
    hooks, Flow, FlowError, FlowItem, FlowRef, MapFn, Subscriber, SubscriberRef, Subscription,
    SubscriptionCell, SubscriptionRef,
};

/// Transforms each upstream item through a fallible mapper. Demand passes
/// through one-to-one.
pub struct MapFlow<T, R> {
    source: FlowRef<T>,
    mapper: MapFn<T, R>,
}

impl<T: FlowItem, R: FlowItem> MapFlow<T, R> {
    pub fn new(source: FlowRef<T>, mapper: MapFn<T, R>) -> Self {
        Self { source, mapper }
    }
}

impl<T: FlowItem, R: FlowItem> Flow<R> for MapFlow<T, R> {
    fn subscribe(&self, subscriber: SubscriberRef<R>) {
        self.source.subscribe(Arc::new(MapSubscriber {
            downstream: subscriber,
            mapper: Arc::clone(&self.mapper),
            upstream: Arc::new(SubscriptionCell::new()),
            done: AtomicBool::new(false),
        }));
    }
}

struct MapSubscriber<T, R> {
    downstream: SubscriberRef<R>,
    mapper: MapFn<T, R>,
    upstream: Arc<SubscriptionCell>,
    done: AtomicBool,
}

impl<T: FlowItem, R: FlowItem> Subscriber<T> for MapSubscriber<T, R> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.downstream.on_subscribe(self.upstream.clone());
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        match (self.mapper)(item) {
            Ok(mapped) => self.downstream.on_next(mapped),
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
