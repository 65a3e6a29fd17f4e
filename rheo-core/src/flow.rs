// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The producer/consumer protocol traits.

use std::sync::Arc;

use rheo_error::FlowError;

/// The handle a producer gives its consumer for signalling demand and
/// disinterest.
///
/// `request` adds to the pending demand and saturates at `u64::MAX`, which
/// doubles as the unbounded sentinel that disables accounting. `cancel` is
/// idempotent; after it, the producer stops emitting on a best-effort basis
/// and any straggling item is dropped while straggling errors go to the
/// global error hook.
pub trait Subscription: Send + Sync {
    /// Add `n` items of demand. `n == 0` is a protocol violation and is
    /// reported to the error hook rather than honored.
    fn request(&self, n: u64);

    /// Signal disinterest. Idempotent.
    fn cancel(&self);
}

/// Shared handle to a [`Subscription`].
pub type SubscriptionRef = Arc<dyn Subscription>;

/// The four sinks of a stream consumer.
///
/// Invariants upheld by every conforming producer: `on_subscribe` arrives
/// first and exactly once; no two sink calls run concurrently; after
/// `on_error` or `on_complete` nothing further is delivered; the item count
/// never exceeds the requested demand on backpressured streams.
pub trait Subscriber<T>: Send + Sync {
    /// Receives the subscription handle before any other signal.
    fn on_subscribe(&self, subscription: SubscriptionRef);

    /// Receives one item.
    fn on_next(&self, item: T);

    /// Receives the failure terminal.
    fn on_error(&self, error: FlowError);

    /// Receives the completion terminal.
    fn on_complete(&self);
}

/// Shared handle to a [`Subscriber`].
pub type SubscriberRef<T> = Arc<dyn Subscriber<T>>;

/// Bounds required of every item flowing through a stream.
///
/// Items are cloned at fan-out points (subjects, latest-value cells), so
/// `Clone` is part of the contract.
///
/// This trait is automatically implemented for any type satisfying the
/// bounds.
pub trait FlowItem: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> FlowItem for T {}

/// A producer: a reusable recipe that can be subscribed any number of
/// times, each subscription spinning up fresh operator state.
pub trait Flow<T: FlowItem>: Send + Sync {
    /// Accept a consumer. The implementation must call
    /// `subscriber.on_subscribe` exactly once before any other signal.
    fn subscribe(&self, subscriber: SubscriberRef<T>);
}

/// Shared handle to a [`Flow`].
pub type FlowRef<T> = Arc<dyn Flow<T>>;

/// A subscription with no upstream behind it, used when a terminal must be
/// delivered straight from `subscribe`.
pub struct NoopSubscription;

impl Subscription for NoopSubscription {
    fn request(&self, _n: u64) {}

    fn cancel(&self) {}
}

/// Hand `subscriber` an inert subscription and complete it immediately.
pub fn signal_complete<T: FlowItem>(subscriber: &SubscriberRef<T>) {
    subscriber.on_subscribe(Arc::new(NoopSubscription));
    subscriber.on_complete();
}

/// Hand `subscriber` an inert subscription and fail it immediately.
pub fn signal_error<T: FlowItem>(subscriber: &SubscriberRef<T>, error: FlowError) {
    subscriber.on_subscribe(Arc::new(NoopSubscription));
    subscriber.on_error(error);
}
