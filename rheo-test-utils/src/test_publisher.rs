// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A hand-driven producer for exercising operator state machines.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rheo_core::{
    demand, Flow, FlowError, FlowItem, FlowRef, Subscriber, SubscriberRef, Subscription,
};

/// A producer whose emissions are driven explicitly from the test body.
///
/// Supports a single live subscriber at a time and tracks the demand and
/// cancellation signals it receives, so tests can assert on the
/// subscription side of the protocol as well.
pub struct TestPublisher<T> {
    state: Arc<PublisherState<T>>,
}

struct PublisherState<T> {
    downstream: Mutex<Option<SubscriberRef<T>>>,
    requested: AtomicU64,
    cancelled: AtomicBool,
    subscribe_count: AtomicU64,
}

impl<T: FlowItem> TestPublisher<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(PublisherState {
                downstream: Mutex::new(None),
                requested: AtomicU64::new(0),
                cancelled: AtomicBool::new(false),
                subscribe_count: AtomicU64::new(0),
            }),
        }
    }

    /// Push an item to the current subscriber, demand permitting or not —
    /// the test decides what to exercise.
    pub fn emit(&self, item: T) {
        let downstream = self.state.downstream.lock().clone();
        if let Some(downstream) = downstream {
            downstream.on_next(item);
        }
    }

    /// Complete the current subscriber.
    pub fn complete(&self) {
        let downstream = self.state.downstream.lock().take();
        if let Some(downstream) = downstream {
            downstream.on_complete();
        }
    }

    /// Fail the current subscriber.
    pub fn error(&self, error: FlowError) {
        let downstream = self.state.downstream.lock().take();
        if let Some(downstream) = downstream {
            downstream.on_error(error);
        }
    }

    /// Total demand requested so far.
    pub fn requested(&self) -> u64 {
        self.state.requested.load(Ordering::Acquire)
    }

    /// Whether the subscriber cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Whether anything has subscribed.
    pub fn has_subscriber(&self) -> bool {
        self.state.downstream.lock().is_some()
    }

    /// How many subscriptions this publisher has accepted.
    pub fn subscribe_count(&self) -> u64 {
        self.state.subscribe_count.load(Ordering::Acquire)
    }

    /// This publisher as a shared flow.
    pub fn flow(&self) -> FlowRef<T> {
        Arc::new(self.clone())
    }
}

impl<T: FlowItem> Default for TestPublisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FlowItem> Clone for TestPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: FlowItem> Flow<T> for TestPublisher<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        self.state.subscribe_count.fetch_add(1, Ordering::AcqRel);
        *self.state.downstream.lock() = Some(subscriber.clone());
        subscriber.on_subscribe(Arc::new(TestSubscription {
            state: Arc::clone(&self.state),
        }));
    }
}

struct TestSubscription<T> {
    state: Arc<PublisherState<T>>,
}

impl<T: FlowItem> Subscription for TestSubscription<T> {
    fn request(&self, n: u64) {
        demand::add(&self.state.requested, n);
    }

    fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
        *self.state.downstream.lock() = None;
    }
}
