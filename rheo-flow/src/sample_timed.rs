// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rheo_core::{
    demand, Cancel, Flow, FlowError, FlowItem, FlowRef, SerialCancel, SerializedSubscriber,
    Subscriber, SubscriberRef, Subscription, SubscriptionCell, SubscriptionRef,
};
use rheo_scheduler::SchedulerRef;

/// Emits the most recent upstream item each time the periodic gate fires,
/// dropping items that were replaced between ticks.
///
/// The upstream is consumed unboundedly; a tick that finds a value but no
/// downstream demand fails the stream with a lack-of-requests error.
/// Cancellation disposes both the timer and the upstream.
pub struct SampleTimedFlow<T> {
    source: FlowRef<T>,
    period: Duration,
    scheduler: SchedulerRef,
}

impl<T: FlowItem> SampleTimedFlow<T> {
    pub fn new(source: FlowRef<T>, period: Duration, scheduler: SchedulerRef) -> Self {
        Self {
            source,
            period,
            scheduler,
        }
    }
}

impl<T: FlowItem> Flow<T> for SampleTimedFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        // ticks race upstream terminals, hence the serialized downstream
        let serialized: SubscriberRef<T> = Arc::new(SerializedSubscriber::new(subscriber));
        let sampler = Arc::new_cyclic(|this: &Weak<SampleTimedSubscriber<T>>| {
            SampleTimedSubscriber {
                downstream: serialized,
                period: self.period,
                scheduler: Arc::clone(&self.scheduler),
                latest: Mutex::new(None),
                requested: AtomicU64::new(0),
                timer: SerialCancel::new(),
                upstream: Arc::new(SubscriptionCell::new()),
                this: this.clone(),
            }
        });
        self.source.subscribe(sampler);
    }
}

struct SampleTimedSubscriber<T> {
    downstream: SubscriberRef<T>,
    period: Duration,
    scheduler: SchedulerRef,
    latest: Mutex<Option<T>>,
    requested: AtomicU64,
    timer: SerialCancel,
    upstream: Arc<SubscriptionCell>,
    this: Weak<Self>,
}

impl<T: FlowItem> SampleTimedSubscriber<T> {
    fn tick(&self) {
        let value = self.latest.lock().take();
        let Some(value) = value else { return };
        let outstanding = self.requested.load(std::sync::atomic::Ordering::Acquire);
        if outstanding == 0 {
            self.cancel();
            self.downstream.on_error(FlowError::missing_demand(
                "sampler fired with no outstanding request",
            ));
            return;
        }
        self.downstream.on_next(value);
        if outstanding != demand::UNBOUNDED {
            demand::produced(&self.requested, 1);
        }
    }
}

impl<T: FlowItem> Subscriber<T> for SampleTimedSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if !self.upstream.set_once(subscription) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        self.downstream.on_subscribe(this.clone());
        let handle = self.scheduler.schedule_periodically_direct(
            Arc::new(move || this.tick()),
            self.period,
            self.period,
        );
        if !self.timer.replace(handle) {
            return;
        }
        self.upstream.request(demand::UNBOUNDED);
    }

    fn on_next(&self, item: T) {
        *self.latest.lock() = Some(item);
    }

    fn on_error(&self, error: FlowError) {
        self.timer.dispose();
        self.upstream.cancel();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        self.timer.dispose();
        self.upstream.cancel();
        self.downstream.on_complete();
    }
}

impl<T: FlowItem> Subscription for SampleTimedSubscriber<T> {
    fn request(&self, n: u64) {
        if demand::validate(n) {
            demand::add(&self.requested, n);
        }
    }

    fn cancel(&self) {
        self.timer.dispose();
        self.upstream.cancel();
    }
}
