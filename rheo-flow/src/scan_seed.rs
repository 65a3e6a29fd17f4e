// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rheo_core::{
    demand, hooks, signal_error, BiMapFn, Flow, FlowError, FlowItem, FlowRef, SpscRing,
    Subscriber, SubscriberRef, Subscription, SubscriptionCell, SubscriptionRef, SupplierFn,
};

/// Emits the seed first, then one accumulation per upstream item.
///
/// The seed is enqueued before the upstream produces anything, so it
/// consumes the first downstream credit while each downstream request is
/// forwarded upstream unchanged — the accumulation for the n-th upstream
/// item waits in the two-slot ring for the (n+1)-th credit.
pub struct ScanSeedFlow<T, R> {
    source: FlowRef<T>,
    seed: SupplierFn<R>,
    accumulator: BiMapFn<R, T, R>,
}

impl<T: FlowItem, R: FlowItem> ScanSeedFlow<T, R> {
    pub fn new(source: FlowRef<T>, seed: SupplierFn<R>, accumulator: BiMapFn<R, T, R>) -> Self {
        Self {
            source,
            seed,
            accumulator,
        }
    }
}

impl<T: FlowItem, R: FlowItem> Flow<R> for ScanSeedFlow<T, R> {
    fn subscribe(&self, subscriber: SubscriberRef<R>) {
        let seed = match (self.seed)() {
            Ok(seed) => seed,
            Err(error) => {
                signal_error(&subscriber, error);
                return;
            }
        };
        let queue = SpscRing::new(2);
        queue.offer(seed.clone());
        let scan = Arc::new_cyclic(|this: &Weak<ScanSeedSubscriber<T, R>>| ScanSeedSubscriber {
            downstream: subscriber,
            accumulator: Arc::clone(&self.accumulator),
            upstream: Arc::new(SubscriptionCell::new()),
            queue,
            value: Mutex::new(seed),
            requested: AtomicU64::new(0),
            wip: AtomicUsize::new(0),
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            error: Mutex::new(None),
            this: this.clone(),
        });
        self.source.subscribe(scan);
    }
}

struct ScanSeedSubscriber<T, R> {
    downstream: SubscriberRef<R>,
    accumulator: BiMapFn<R, T, R>,
    upstream: Arc<SubscriptionCell>,
    queue: SpscRing<R>,
    value: Mutex<R>,
    requested: AtomicU64,
    wip: AtomicUsize,
    done: AtomicBool,
    cancelled: AtomicBool,
    error: Mutex<Option<FlowError>>,
    this: Weak<Self>,
}

impl<T: FlowItem, R: FlowItem> ScanSeedSubscriber<T, R> {
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            let r = self.requested.load(Ordering::Acquire);
            let mut emitted = 0u64;
            loop {
                if self.cancelled.load(Ordering::Acquire) {
                    self.queue.clear();
                    return;
                }
                let done = self.done.load(Ordering::Acquire);
                if done {
                    let error = self.error.lock().take();
                    if let Some(error) = error {
                        self.queue.clear();
                        self.downstream.on_error(error);
                        return;
                    }
                }
                if emitted == r {
                    break;
                }
                match self.queue.poll() {
                    Some(value) => {
                        self.downstream.on_next(value);
                        emitted += 1;
                    }
                    None => {
                        if done {
                            self.downstream.on_complete();
                            return;
                        }
                        break;
                    }
                }
            }
            if self.done.load(Ordering::Acquire)
                && self.error.lock().is_none()
                && self.queue.is_empty()
            {
                self.downstream.on_complete();
                return;
            }
            if emitted > 0 && r != demand::UNBOUNDED {
                demand::produced(&self.requested, emitted);
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return;
            }
        }
    }

    fn fail(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.upstream.cancel();
        *self.error.lock() = Some(error);
        self.drain();
    }
}

impl<T: FlowItem, R: FlowItem> Subscriber<T> for ScanSeedSubscriber<T, R> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            if let Some(this) = self.this.upgrade() {
                self.downstream.on_subscribe(this);
            }
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let accumulated = {
            let previous = self.value.lock().clone();
            (self.accumulator)(previous, item)
        };
        match accumulated {
            Err(error) => {
                self.upstream.cancel();
                self.fail(error);
            }
            Ok(next) => {
                *self.value.lock() = next.clone();
                if self.queue.offer(next) {
                    self.drain();
                } else {
                    self.upstream.cancel();
                    self.fail(FlowError::queue_full("scan buffer"));
                }
            }
        }
    }

    fn on_error(&self, error: FlowError) {
        self.fail(error);
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.upstream.cancel();
        self.drain();
    }
}

impl<T: FlowItem, R: FlowItem> Subscription for ScanSeedSubscriber<T, R> {
    fn request(&self, n: u64) {
        if !demand::validate(n) {
            return;
        }
        demand::add(&self.requested, n);
        self.upstream.request(n);
        self.drain();
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.upstream.cancel();
        }
    }
}
