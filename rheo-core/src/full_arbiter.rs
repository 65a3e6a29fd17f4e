// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The two-upstream multiplexer behind timeout-with-fallback.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rheo_error::FlowError;

use crate::demand;
use crate::flow::{FlowItem, Subscriber, SubscriberRef, Subscription, SubscriptionRef};
use crate::hooks;
use crate::queue::MpscLinked;

enum ArbiterEvent<T> {
    Item(T),
    Error(FlowError),
    Complete,
    Switch(SubscriptionRef),
}

/// Multiplexes two upstream sequences (primary, then fallback) into one
/// downstream while preserving demand accounting and ordering.
///
/// Every input — items, terminals, demand, subscription swaps — funnels
/// through a single missed-counter drain. Items and terminals are tagged
/// with their producing subscription; anything tagged with a subscription
/// that is no longer current is dropped (items) or routed to the error
/// hook (errors). Installing a new subscription cancels the previous one
/// and re-issues the outstanding demand.
pub struct FullArbiter<T> {
    downstream: SubscriberRef<T>,
    queue: MpscLinked<(Option<SubscriptionRef>, ArbiterEvent<T>)>,
    wip: AtomicUsize,
    missed_requested: AtomicU64,
    /// Outstanding demand; only the drain owner mutates it.
    requested: AtomicU64,
    /// The active upstream; only the drain owner mutates it.
    current: Mutex<Option<SubscriptionRef>>,
    shut: AtomicBool,
}

impl<T: FlowItem> FullArbiter<T> {
    /// Create an arbiter emitting into `downstream`.
    #[must_use]
    pub fn new(downstream: SubscriberRef<T>) -> Self {
        Self {
            downstream,
            queue: MpscLinked::new(),
            wip: AtomicUsize::new(0),
            missed_requested: AtomicU64::new(0),
            requested: AtomicU64::new(0),
            current: Mutex::new(None),
            shut: AtomicBool::new(false),
        }
    }

    /// Install (or switch to) a producing upstream. Returns `false` when
    /// the arbiter is already shut, in which case the subscription is
    /// cancelled.
    pub fn set_subscription(&self, subscription: SubscriptionRef) -> bool {
        if self.shut.load(Ordering::Acquire) {
            subscription.cancel();
            return false;
        }
        self.queue.offer((None, ArbiterEvent::Switch(subscription)));
        self.drain();
        true
    }

    /// Route an item from the upstream identified by `tag`. Returns
    /// `false` when the arbiter is already shut.
    pub fn on_next(&self, item: T, tag: &SubscriptionRef) -> bool {
        if self.shut.load(Ordering::Acquire) {
            return false;
        }
        self.queue
            .offer((Some(tag.clone()), ArbiterEvent::Item(item)));
        self.drain();
        true
    }

    /// Route a failure from the upstream identified by `tag`.
    pub fn on_error(&self, error: FlowError, tag: &SubscriptionRef) {
        if self.shut.load(Ordering::Acquire) {
            hooks::on_error(error);
            return;
        }
        self.queue
            .offer((Some(tag.clone()), ArbiterEvent::Error(error)));
        self.drain();
    }

    /// Route a completion from the upstream identified by `tag`.
    pub fn on_complete(&self, tag: &SubscriptionRef) {
        if self.shut.load(Ordering::Acquire) {
            return;
        }
        self.queue.offer((Some(tag.clone()), ArbiterEvent::Complete));
        self.drain();
    }

    fn is_current(&self, tag: &Option<SubscriptionRef>) -> bool {
        match (tag, &*self.current.lock()) {
            (Some(tag), Some(current)) => Arc::ptr_eq(tag, current),
            _ => false,
        }
    }

    /// Shut the gate and cancel the active upstream. Only called by the
    /// drain owner.
    fn shutdown(&self) {
        self.shut.store(true, Ordering::Release);
        let current = self.current.lock().take();
        if let Some(current) = current {
            current.cancel();
        }
        self.queue.clear();
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            if self.shut.load(Ordering::Acquire) {
                let current = self.current.lock().take();
                if let Some(current) = current {
                    current.cancel();
                }
                self.queue.clear();
                return;
            }

            let new_demand = self.missed_requested.swap(0, Ordering::AcqRel);
            if new_demand != 0 {
                demand::add(&self.requested, new_demand);
                let current = self.current.lock().clone();
                if let Some(current) = current {
                    current.request(new_demand);
                }
            }

            while let Some((tag, event)) = self.queue.poll() {
                if self.shut.load(Ordering::Acquire) {
                    break;
                }
                match event {
                    ArbiterEvent::Switch(next) => {
                        let previous = self.current.lock().replace(next.clone());
                        if let Some(previous) = previous {
                            previous.cancel();
                        }
                        let outstanding = self.requested.load(Ordering::Acquire);
                        if outstanding > 0 {
                            next.request(outstanding);
                        }
                    }
                    ArbiterEvent::Item(item) => {
                        if !self.is_current(&tag) {
                            continue;
                        }
                        if self.requested.load(Ordering::Acquire) == 0 {
                            self.shutdown();
                            self.downstream.on_error(FlowError::missing_demand(
                                "arbitrated upstream emitted without request",
                            ));
                            return;
                        }
                        self.downstream.on_next(item);
                        demand::produced(&self.requested, 1);
                    }
                    ArbiterEvent::Error(error) => {
                        if self.is_current(&tag) {
                            self.shutdown();
                            self.downstream.on_error(error);
                            return;
                        }
                        hooks::on_error(error);
                    }
                    ArbiterEvent::Complete => {
                        if self.is_current(&tag) {
                            self.shutdown();
                            self.downstream.on_complete();
                            return;
                        }
                    }
                }
            }

            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return;
            }
        }
    }
}

impl<T: FlowItem> Subscription for FullArbiter<T> {
    fn request(&self, n: u64) {
        if !demand::validate(n) {
            return;
        }
        demand::add(&self.missed_requested, n);
        self.drain();
    }

    fn cancel(&self) {
        if self.shut.swap(true, Ordering::AcqRel) {
            return;
        }
        self.drain();
    }
}

/// Subscriber that feeds a fallback upstream into a [`FullArbiter`].
pub struct FullArbiterSubscriber<T> {
    arbiter: Arc<FullArbiter<T>>,
    subscription: Mutex<Option<SubscriptionRef>>,
}

impl<T: FlowItem> FullArbiterSubscriber<T> {
    /// Wrap `arbiter`.
    #[must_use]
    pub fn new(arbiter: Arc<FullArbiter<T>>) -> Self {
        Self {
            arbiter,
            subscription: Mutex::new(None),
        }
    }
}

impl<T: FlowItem> Subscriber<T> for FullArbiterSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        *self.subscription.lock() = Some(subscription.clone());
        self.arbiter.set_subscription(subscription);
    }

    fn on_next(&self, item: T) {
        let tag = self.subscription.lock().clone();
        if let Some(tag) = tag {
            self.arbiter.on_next(item, &tag);
        }
    }

    fn on_error(&self, error: FlowError) {
        let tag = self.subscription.lock().clone();
        match tag {
            Some(tag) => self.arbiter.on_error(error, &tag),
            None => hooks::on_error(error),
        }
    }

    fn on_complete(&self) {
        let tag = self.subscription.lock().clone();
        if let Some(tag) = tag {
            self.arbiter.on_complete(&tag);
        }
    }
}
