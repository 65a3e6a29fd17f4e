// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rheo_core::{
    demand, signal_error, BiMapFn, Flow, FlowError, FlowItem, FlowRef, SerializedSubscriber,
    Subscriber, SubscriberRef, Subscription, SubscriptionCell, SubscriptionRef,
};

/// Combines each primary item with the most recent value of a secondary
/// stream.
///
/// The secondary is consumed unboundedly into a single latest cell.
/// Primary items arriving before the secondary has produced are dropped.
/// A secondary failure kills the whole pipeline; secondary completion is
/// ignored — the combined stream finishes at the primary's pace.
pub struct WithLatestFromFlow<T, U, R> {
    source: FlowRef<T>,
    other: FlowRef<U>,
    combiner: BiMapFn<T, U, R>,
}

impl<T: FlowItem, U: FlowItem, R: FlowItem> WithLatestFromFlow<T, U, R> {
    pub fn new(source: FlowRef<T>, other: FlowRef<U>, combiner: BiMapFn<T, U, R>) -> Self {
        Self {
            source,
            other,
            combiner,
        }
    }
}

impl<T: FlowItem, U: FlowItem, R: FlowItem> Flow<R> for WithLatestFromFlow<T, U, R> {
    fn subscribe(&self, subscriber: SubscriberRef<R>) {
        let serialized: SubscriberRef<R> = Arc::new(SerializedSubscriber::new(subscriber));
        let main = Arc::new_cyclic(|this: &Weak<WithLatestFromSubscriber<T, U, R>>| {
            WithLatestFromSubscriber {
                downstream: serialized,
                combiner: Arc::clone(&self.combiner),
                latest: Mutex::new(None),
                primary: Arc::new(SubscriptionCell::new()),
                secondary: Arc::new(SubscriptionCell::new()),
                this: this.clone(),
            }
        });
        self.other.subscribe(Arc::new(OtherSubscriber {
            parent: Arc::clone(&main),
        }));
        self.source.subscribe(main);
    }
}

struct WithLatestFromSubscriber<T, U, R> {
    downstream: SubscriberRef<R>,
    combiner: BiMapFn<T, U, R>,
    latest: Mutex<Option<U>>,
    primary: Arc<SubscriptionCell>,
    secondary: Arc<SubscriptionCell>,
    this: Weak<Self>,
}

impl<T: FlowItem, U: FlowItem, R: FlowItem> WithLatestFromSubscriber<T, U, R> {
    /// A secondary failure terminates the combined stream. When the
    /// primary has not even subscribed yet, the terminal must be
    /// fabricated here, subscription handle included.
    fn other_error(&self, error: FlowError) {
        if self.primary.cancel_if_empty() {
            signal_error(&self.downstream, error);
        } else {
            self.cancel();
            self.downstream.on_error(error);
        }
    }
}

impl<T: FlowItem, U: FlowItem, R: FlowItem> Subscriber<T> for WithLatestFromSubscriber<T, U, R> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.primary.set_once(subscription) {
            if let Some(this) = self.this.upgrade() {
                self.downstream.on_subscribe(this);
            }
        }
    }

    fn on_next(&self, item: T) {
        let latest = self.latest.lock().clone();
        let Some(latest) = latest else {
            // nothing to pair with yet: the item is dropped, not buffered
            return;
        };
        match (self.combiner)(item, latest) {
            Ok(combined) => self.downstream.on_next(combined),
            Err(error) => {
                self.cancel();
                self.downstream.on_error(error);
            }
        }
    }

    fn on_error(&self, error: FlowError) {
        self.primary.cancel();
        self.secondary.cancel();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        self.primary.cancel();
        self.secondary.cancel();
        self.downstream.on_complete();
    }
}

impl<T: FlowItem, U: FlowItem, R: FlowItem> Subscription for WithLatestFromSubscriber<T, U, R> {
    fn request(&self, n: u64) {
        self.primary.request(n);
    }

    fn cancel(&self) {
        self.primary.cancel();
        self.secondary.cancel();
    }
}

struct OtherSubscriber<T, U, R> {
    parent: Arc<WithLatestFromSubscriber<T, U, R>>,
}

impl<T: FlowItem, U: FlowItem, R: FlowItem> Subscriber<U> for OtherSubscriber<T, U, R> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.parent.secondary.set_once(subscription) {
            self.parent.secondary.request(demand::UNBOUNDED);
        }
    }

    fn on_next(&self, item: U) {
        *self.parent.latest.lock() = Some(item);
    }

    fn on_error(&self, error: FlowError) {
        self.parent.other_error(error);
    }

    fn on_complete(&self) {
        // the combined stream completes at the primary's pace
    }
}
