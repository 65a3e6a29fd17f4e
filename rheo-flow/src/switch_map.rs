// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rheo_core::{
    demand, hooks, Flow, FlowError, FlowItem, FlowRef, MapFn, SpscRing, Subscriber,
    SubscriberRef, Subscription, SubscriptionCell, SubscriptionRef,
};

/// Maps each upstream item to an inner flow and mirrors only the newest
/// one.
///
/// Every installed inner carries a monotonically increasing generation;
/// signals from an inner whose generation is no longer current are
/// dropped (items) or routed to the error hook (errors). Installing a new
/// inner cancels the previous one. Upstream is consumed unboundedly once
/// the downstream shows first demand; downstream demand gates the drain
/// of the active inner's buffer.
pub struct SwitchMapFlow<T, R> {
    source: FlowRef<T>,
    mapper: MapFn<T, FlowRef<R>>,
    buffer_size: usize,
}

impl<T: FlowItem, R: FlowItem> SwitchMapFlow<T, R> {
    pub fn new(source: FlowRef<T>, mapper: MapFn<T, FlowRef<R>>, buffer_size: usize) -> Self {
        Self {
            source,
            mapper,
            buffer_size,
        }
    }
}

impl<T: FlowItem, R: FlowItem> Flow<R> for SwitchMapFlow<T, R> {
    fn subscribe(&self, subscriber: SubscriberRef<R>) {
        let coordinator = Arc::new_cyclic(|this: &Weak<SwitchMapCoordinator<T, R>>| {
            SwitchMapCoordinator {
                downstream: subscriber,
                mapper: Arc::clone(&self.mapper),
                buffer_size: self.buffer_size,
                upstream: Arc::new(SubscriptionCell::new()),
                active: Mutex::new(ActiveSlot::Idle),
                generation: AtomicU64::new(0),
                requested: AtomicU64::new(0),
                wip: AtomicUsize::new(0),
                done: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                error: Mutex::new(None),
                this: this.clone(),
            }
        });
        self.source.subscribe(coordinator);
    }
}

enum ActiveSlot<T, R> {
    Idle,
    Inner(Arc<SwitchMapInner<T, R>>),
    Cancelled,
}

struct SwitchMapCoordinator<T, R> {
    downstream: SubscriberRef<R>,
    mapper: MapFn<T, FlowRef<R>>,
    buffer_size: usize,
    upstream: Arc<SubscriptionCell>,
    active: Mutex<ActiveSlot<T, R>>,
    generation: AtomicU64,
    requested: AtomicU64,
    wip: AtomicUsize,
    done: AtomicBool,
    cancelled: AtomicBool,
    error: Mutex<Option<FlowError>>,
    this: Weak<Self>,
}

impl<T: FlowItem, R: FlowItem> SwitchMapCoordinator<T, R> {
    fn current_inner(&self) -> Option<Arc<SwitchMapInner<T, R>>> {
        match &*self.active.lock() {
            ActiveSlot::Inner(inner) => Some(Arc::clone(inner)),
            _ => None,
        }
    }

    fn is_current(&self, inner: &Arc<SwitchMapInner<T, R>>) -> bool {
        matches!(&*self.active.lock(), ActiveSlot::Inner(current) if Arc::ptr_eq(current, inner))
    }

    /// Clear the slot if `inner` is still installed there.
    fn retire(&self, inner: &Arc<SwitchMapInner<T, R>>) {
        let mut slot = self.active.lock();
        if matches!(&*slot, ActiveSlot::Inner(current) if Arc::ptr_eq(current, inner)) {
            *slot = ActiveSlot::Idle;
        }
    }

    fn dispose_inner(&self) {
        let previous = {
            let mut slot = self.active.lock();
            std::mem::replace(&mut *slot, ActiveSlot::Cancelled)
        };
        if let ActiveSlot::Inner(inner) = previous {
            inner.cancel();
        }
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        'outer: loop {
            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            if self.done.load(Ordering::Acquire) {
                let error = self.error.lock().clone();
                if let Some(error) = error {
                    self.dispose_inner();
                    self.upstream.cancel();
                    self.downstream.on_error(error);
                    return;
                }
                if matches!(&*self.active.lock(), ActiveSlot::Idle) {
                    self.upstream.cancel();
                    self.downstream.on_complete();
                    return;
                }
            }

            if let Some(inner) = self.current_inner() {
                if inner.done.load(Ordering::Acquire) {
                    let error = inner.error.lock().take();
                    if let Some(error) = error {
                        self.upstream.cancel();
                        self.dispose_inner();
                        self.downstream.on_error(error);
                        return;
                    }
                    if inner.queue.is_empty() {
                        self.retire(&inner);
                        continue 'outer;
                    }
                }

                let r = self.requested.load(Ordering::Acquire);
                let mut emitted = 0u64;
                let mut retry = false;
                while emitted != r {
                    if self.cancelled.load(Ordering::Acquire) {
                        return;
                    }
                    let inner_done = inner.done.load(Ordering::Acquire);
                    let item = inner.queue.poll();
                    let empty = item.is_none();

                    if !self.is_current(&inner) {
                        retry = true;
                        break;
                    }
                    if inner_done {
                        let error = inner.error.lock().take();
                        if let Some(error) = error {
                            self.upstream.cancel();
                            self.dispose_inner();
                            self.downstream.on_error(error);
                            return;
                        }
                        if empty {
                            self.retire(&inner);
                            retry = true;
                            break;
                        }
                    }
                    let Some(item) = item else {
                        break;
                    };
                    self.downstream.on_next(item);
                    emitted += 1;
                }

                if emitted > 0 && !self.cancelled.load(Ordering::Acquire) {
                    if r != demand::UNBOUNDED {
                        demand::produced(&self.requested, emitted);
                    }
                    inner.request(emitted);
                }
                if retry {
                    continue 'outer;
                }
            }

            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return;
            }
        }
    }
}

impl<T: FlowItem, R: FlowItem> Subscriber<T> for SwitchMapCoordinator<T, R> {
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
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        if let Some(previous) = self.current_inner() {
            previous.cancel();
        }

        let inner_flow = match (self.mapper)(item) {
            Ok(inner_flow) => inner_flow,
            Err(error) => {
                self.upstream.cancel();
                self.on_error(error);
                return;
            }
        };

        let inner = Arc::new(SwitchMapInner {
            parent: self.this.clone(),
            generation,
            queue: SpscRing::new(self.buffer_size),
            prefetch: self.buffer_size as u64,
            upstream: Arc::new(SubscriptionCell::new()),
            done: AtomicBool::new(false),
            error: Mutex::new(None),
        });

        {
            let mut slot = self.active.lock();
            if matches!(&*slot, ActiveSlot::Cancelled) {
                return;
            }
            *slot = ActiveSlot::Inner(Arc::clone(&inner));
        }
        inner_flow.subscribe(inner);
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        *self.error.lock() = Some(error);
        self.drain();
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.drain();
        }
    }
}

impl<T: FlowItem, R: FlowItem> Subscription for SwitchMapCoordinator<T, R> {
    fn request(&self, n: u64) {
        if !demand::validate(n) {
            return;
        }
        demand::add(&self.requested, n);
        if self.generation.load(Ordering::Acquire) == 0 {
            // nothing mapped yet: open the upstream floodgate
            self.upstream.request(demand::UNBOUNDED);
        } else {
            self.drain();
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.upstream.cancel();
        self.dispose_inner();
    }
}

struct SwitchMapInner<T, R> {
    parent: Weak<SwitchMapCoordinator<T, R>>,
    generation: u64,
    queue: SpscRing<R>,
    prefetch: u64,
    upstream: Arc<SubscriptionCell>,
    done: AtomicBool,
    error: Mutex<Option<FlowError>>,
}

impl<T: FlowItem, R: FlowItem> SwitchMapInner<T, R> {
    fn is_current_generation(&self) -> bool {
        self.parent
            .upgrade()
            .is_some_and(|parent| parent.generation.load(Ordering::Acquire) == self.generation)
    }

    fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.upstream.cancel();
    }
}

impl<T: FlowItem, R: FlowItem> Subscriber<R> for SwitchMapInner<T, R> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.is_current_generation() {
            if self.upstream.set_once(subscription) {
                self.upstream.request(self.prefetch);
            }
        } else {
            subscription.cancel();
        }
    }

    fn on_next(&self, item: R) {
        if !self.is_current_generation() {
            return;
        }
        let Some(parent) = self.parent.upgrade() else {
            return;
        };
        if self.queue.offer(item) {
            parent.drain();
        } else {
            self.upstream.cancel();
            *self.error.lock() = Some(FlowError::queue_full("switch inner buffer"));
            self.done.store(true, Ordering::Release);
            parent.drain();
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.is_current_generation() {
            if let Some(parent) = self.parent.upgrade() {
                *self.error.lock() = Some(error);
                self.done.store(true, Ordering::Release);
                parent.drain();
                return;
            }
        }
        hooks::on_error(error);
    }

    fn on_complete(&self) {
        if self.is_current_generation() {
            if let Some(parent) = self.parent.upgrade() {
                self.done.store(true, Ordering::Release);
                parent.drain();
            }
        }
    }
}
