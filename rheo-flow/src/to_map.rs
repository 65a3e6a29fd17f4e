// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rheo_core::{
    demand, hooks, Flow, FlowError, FlowItem, FlowRef, Subscriber, SubscriberRef, Subscription,
    SubscriptionCell, SubscriptionRef,
};

use crate::deferred::DeferredScalar;

type KeySelector<T, K> = Arc<dyn Fn(&T) -> rheo_error::Result<K> + Send + Sync>;

/// Collects upstream items into a map keyed by the selector; a repeated
/// key overwrites the earlier entry.
pub struct ToMapFlow<T, K> {
    source: FlowRef<T>,
    key_selector: KeySelector<T, K>,
}

impl<T: FlowItem, K: FlowItem + Eq + Hash> ToMapFlow<T, K> {
    pub fn new(source: FlowRef<T>, key_selector: KeySelector<T, K>) -> Self {
        Self {
            source,
            key_selector,
        }
    }
}

impl<T: FlowItem, K: FlowItem + Eq + Hash> Flow<HashMap<K, T>> for ToMapFlow<T, K> {
    fn subscribe(&self, subscriber: SubscriberRef<HashMap<K, T>>) {
        let upstream = Arc::new(SubscriptionCell::new());
        self.source.subscribe(Arc::new(ToMapSubscriber {
            deferred: Arc::new(DeferredScalar::new(subscriber.clone(), upstream.clone())),
            downstream: subscriber,
            key_selector: Arc::clone(&self.key_selector),
            upstream,
            collected: Mutex::new(Some(HashMap::new())),
            done: AtomicBool::new(false),
        }));
    }
}

struct ToMapSubscriber<T, K> {
    deferred: Arc<DeferredScalar<HashMap<K, T>>>,
    downstream: SubscriberRef<HashMap<K, T>>,
    key_selector: KeySelector<T, K>,
    upstream: Arc<SubscriptionCell>,
    collected: Mutex<Option<HashMap<K, T>>>,
    done: AtomicBool,
}

impl<T: FlowItem, K: FlowItem + Eq + Hash> Subscriber<T> for ToMapSubscriber<T, K> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.downstream.on_subscribe(self.deferred.clone());
            self.upstream.request(demand::UNBOUNDED);
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let key = match (self.key_selector)(&item) {
            Ok(key) => key,
            Err(error) => {
                self.done.store(true, Ordering::Release);
                self.upstream.cancel();
                *self.collected.lock() = None;
                self.downstream.on_error(error);
                return;
            }
        };
        if let Some(collected) = self.collected.lock().as_mut() {
            collected.insert(key, item);
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
