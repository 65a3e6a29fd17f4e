// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rheo_core::{
    demand, hooks, Flow, FlowError, FlowItem, FlowRef, SerializedSubscriber, Subscriber,
    SubscriberRef, Subscription, SubscriptionCell, SubscriptionRef,
};

type SelectorFn<T, U> = Arc<dyn Fn(&T) -> rheo_error::Result<FlowRef<U>> + Send + Sync>;

/// Debounces with a per-item inner flow: item `k` is emitted when its
/// inner signals first (item or completion) and no item `k+1` has arrived
/// in the meantime.
///
/// Each upstream item disposes the previous debouncer and installs a new
/// one stamped with the item's index; the emission check compares that
/// stamp against the newest index. Upstream completion flushes whatever
/// the pending debouncer holds.
pub struct DebounceSelectorFlow<T, U> {
    source: FlowRef<T>,
    selector: SelectorFn<T, U>,
}

impl<T: FlowItem, U: FlowItem> DebounceSelectorFlow<T, U> {
    pub fn new(source: FlowRef<T>, selector: SelectorFn<T, U>) -> Self {
        Self { source, selector }
    }
}

impl<T: FlowItem, U: FlowItem> Flow<T> for DebounceSelectorFlow<T, U> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let serialized: SubscriberRef<T> = Arc::new(SerializedSubscriber::new(subscriber));
        let debounce = Arc::new_cyclic(|this: &Weak<DebounceSubscriber<T, U>>| {
            DebounceSubscriber {
                downstream: serialized,
                selector: Arc::clone(&self.selector),
                upstream: Arc::new(SubscriptionCell::new()),
                debouncer: Mutex::new(DebouncerSlot {
                    current: None,
                    disposed: false,
                }),
                index: AtomicU64::new(0),
                done: AtomicBool::new(false),
                this: this.clone(),
            }
        });
        self.source.subscribe(debounce);
    }
}

struct DebouncerSlot<T, U> {
    current: Option<Arc<DebounceInner<T, U>>>,
    disposed: bool,
}

struct DebounceSubscriber<T, U> {
    downstream: SubscriberRef<T>,
    selector: SelectorFn<T, U>,
    upstream: Arc<SubscriptionCell>,
    debouncer: Mutex<DebouncerSlot<T, U>>,
    index: AtomicU64,
    done: AtomicBool,
    this: Weak<Self>,
}

impl<T: FlowItem, U: FlowItem> DebounceSubscriber<T, U> {
    fn emit(&self, index: u64, value: T) {
        if index == self.index.load(Ordering::Acquire) {
            self.downstream.on_next(value);
        }
    }

    fn dispose_debouncer(&self) {
        let previous = {
            let mut slot = self.debouncer.lock();
            slot.disposed = true;
            slot.current.take()
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    fn fail(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.upstream.cancel();
        self.dispose_debouncer();
        self.downstream.on_error(error);
    }
}

impl<T: FlowItem, U: FlowItem> Subscriber<T> for DebounceSubscriber<T, U> {
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
        let index = self.index.fetch_add(1, Ordering::AcqRel) + 1;

        let previous = self.debouncer.lock().current.take();
        if let Some(previous) = previous {
            previous.dispose();
        }

        let inner_flow = match (self.selector)(&item) {
            Ok(inner_flow) => inner_flow,
            Err(error) => {
                self.fail(error);
                return;
            }
        };

        let inner = Arc::new(DebounceInner {
            parent: self.this.clone(),
            index,
            value: item,
            upstream: Arc::new(SubscriptionCell::new()),
            done: AtomicBool::new(false),
            once: AtomicBool::new(false),
        });

        {
            let mut slot = self.debouncer.lock();
            if slot.disposed {
                return;
            }
            slot.current = Some(Arc::clone(&inner));
        }
        inner_flow.subscribe(inner);
    }

    fn on_error(&self, error: FlowError) {
        self.fail(error);
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        // flush the value still waiting on its debouncer
        let pending = self.debouncer.lock().current.clone();
        if let Some(pending) = pending {
            pending.emit();
        }
        self.upstream.cancel();
        self.dispose_debouncer();
        self.downstream.on_complete();
    }
}

impl<T: FlowItem, U: FlowItem> Subscription for DebounceSubscriber<T, U> {
    fn request(&self, n: u64) {
        if demand::validate(n) {
            self.upstream.request(n);
        }
    }

    fn cancel(&self) {
        self.upstream.cancel();
        self.dispose_debouncer();
    }
}

struct DebounceInner<T, U> {
    parent: Weak<DebounceSubscriber<T, U>>,
    index: u64,
    value: T,
    upstream: Arc<SubscriptionCell>,
    done: AtomicBool,
    once: AtomicBool,
}

impl<T: FlowItem, U: FlowItem> DebounceInner<T, U> {
    fn emit(&self) {
        if !self.once.swap(true, Ordering::AcqRel) {
            if let Some(parent) = self.parent.upgrade() {
                parent.emit(self.index, self.value.clone());
            }
        }
    }

    fn dispose(&self) {
        self.upstream.cancel();
    }
}

impl<T: FlowItem, U: FlowItem> Subscriber<U> for DebounceInner<T, U> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.upstream.request(demand::UNBOUNDED);
        }
    }

    fn on_next(&self, _item: U) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.dispose();
        self.emit();
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        match self.parent.upgrade() {
            Some(parent) => parent.fail(error),
            None => hooks::on_error(error),
        }
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.emit();
        }
    }
}
