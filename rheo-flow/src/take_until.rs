// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use rheo_core::{
    demand, signal_complete, signal_error, Flow, FlowError, FlowItem, FlowRef,
    PairSubscription, SerializedSubscriber, Subscriber, SubscriberRef, Subscription,
    SubscriptionCell, SubscriptionRef,
};

/// Mirrors the primary source until the other source emits its first item
/// or terminates, at which point the result completes.
///
/// Both subscriptions live in a shared two-slot handle; whichever side
/// terminates first disposes the other. The other source may finish
/// before the primary has even subscribed — a seen-on-subscribe flag
/// decides whether the completion can be delivered normally or has to be
/// fabricated with a fresh handle.
pub struct TakeUntilFlow<T, U> {
    source: FlowRef<T>,
    other: FlowRef<U>,
}

impl<T: FlowItem, U: FlowItem> TakeUntilFlow<T, U> {
    pub fn new(source: FlowRef<T>, other: FlowRef<U>) -> Self {
        Self { source, other }
    }
}

impl<T: FlowItem, U: FlowItem> Flow<T> for TakeUntilFlow<T, U> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let serialized: SubscriberRef<T> = Arc::new(SerializedSubscriber::new(subscriber));
        let pair = Arc::new(PairSubscription::new());
        let main = Arc::new_cyclic(|this: &Weak<TakeUntilSubscriber<T>>| TakeUntilSubscriber {
            downstream: serialized.clone(),
            pair: Arc::clone(&pair),
            upstream: Arc::new(SubscriptionCell::new()),
            subscribed: AtomicBool::new(false),
            this: this.clone(),
        });
        self.other.subscribe(Arc::new(UntilSubscriber {
            parent: Arc::clone(&main),
            done: AtomicBool::new(false),
            _marker: std::marker::PhantomData,
        }));
        self.source.subscribe(main);
    }
}

struct TakeUntilSubscriber<T> {
    downstream: SubscriberRef<T>,
    pair: Arc<PairSubscription>,
    upstream: Arc<SubscriptionCell>,
    /// Whether the downstream has received its subscription handle.
    subscribed: AtomicBool,
    this: Weak<Self>,
}

impl<T: FlowItem> Subscriber<T> for TakeUntilSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if !self.upstream.set_once(subscription.clone()) {
            return;
        }
        if self.pair.set(0, subscription) && !self.subscribed.swap(true, Ordering::AcqRel) {
            if let Some(this) = self.this.upgrade() {
                self.downstream.on_subscribe(this);
            }
        }
    }

    fn on_next(&self, item: T) {
        self.downstream.on_next(item);
    }

    fn on_error(&self, error: FlowError) {
        self.upstream.cancel();
        self.pair.dispose();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        self.upstream.cancel();
        self.pair.dispose();
        self.downstream.on_complete();
    }
}

impl<T: FlowItem> Subscription for TakeUntilSubscriber<T> {
    fn request(&self, n: u64) {
        if demand::validate(n) {
            self.upstream.request(n);
        }
    }

    fn cancel(&self) {
        self.pair.dispose();
    }
}

struct UntilSubscriber<T, U> {
    parent: Arc<TakeUntilSubscriber<T>>,
    done: AtomicBool,
    _marker: std::marker::PhantomData<U>,
}

impl<T: FlowItem, U: FlowItem> UntilSubscriber<T, U> {
    /// The other source spoke: finish the result, fabricating the
    /// subscription handle when the primary never delivered one.
    fn finish(&self, error: Option<FlowError>) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.parent.pair.dispose();
        let fresh = !self.parent.subscribed.swap(true, Ordering::AcqRel);
        match (fresh, error) {
            (true, Some(error)) => signal_error(&self.parent.downstream, error),
            (true, None) => signal_complete(&self.parent.downstream),
            (false, Some(error)) => self.parent.downstream.on_error(error),
            (false, None) => self.parent.downstream.on_complete(),
        }
    }
}

impl<T: FlowItem, U: FlowItem> Subscriber<U> for UntilSubscriber<T, U> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.parent.pair.set(1, subscription.clone()) {
            subscription.request(demand::UNBOUNDED);
        }
    }

    fn on_next(&self, _item: U) {
        self.finish(None);
    }

    fn on_error(&self, error: FlowError) {
        self.finish(Some(error));
    }

    fn on_complete(&self) {
        self.finish(None);
    }
}
