// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rheo_core::{
    demand, hooks, signal_error, Flow, FlowError, FlowItem, FlowRef, FullArbiter,
    FullArbiterSubscriber, SerializedSubscriber, Subscriber, SubscriberRef, Subscription,
    SubscriptionCell, SubscriptionRef,
};

type FirstSelector<V> = Arc<dyn Fn() -> rheo_error::Result<FlowRef<V>> + Send + Sync>;
type ItemSelector<T, V> = Arc<dyn Fn(&T) -> rheo_error::Result<FlowRef<V>> + Send + Sync>;

/// Time out against per-item indicator flows, failing on expiry.
pub fn timeout_selector<T, V, F, S>(
    source: FlowRef<T>,
    first: Option<F>,
    selector: S,
) -> FlowRef<T>
where
    T: FlowItem,
    V: FlowItem,
    F: Fn() -> rheo_error::Result<FlowRef<V>> + Send + Sync + 'static,
    S: Fn(&T) -> rheo_error::Result<FlowRef<V>> + Send + Sync + 'static,
{
    Arc::new(TimeoutSelectorFlow::new(
        source,
        first.map(|f| Arc::new(f) as FirstSelector<V>),
        Arc::new(selector),
        None,
    ))
}

/// Time out against per-item indicator flows, switching to `fallback` on
/// expiry.
pub fn timeout_selector_with_fallback<T, V, F, S>(
    source: FlowRef<T>,
    first: Option<F>,
    selector: S,
    fallback: FlowRef<T>,
) -> FlowRef<T>
where
    T: FlowItem,
    V: FlowItem,
    F: Fn() -> rheo_error::Result<FlowRef<V>> + Send + Sync + 'static,
    S: Fn(&T) -> rheo_error::Result<FlowRef<V>> + Send + Sync + 'static,
{
    Arc::new(TimeoutSelectorFlow::new(
        source,
        first.map(|f| Arc::new(f) as FirstSelector<V>),
        Arc::new(selector),
        Some(fallback),
    ))
}

/// Signal-driven timeout: an optional first-timeout flow guards the wait
/// for the first item, then each item's selector produces the flow whose
/// first signal would time the next item out.
///
/// A timeout indicator carries the index of the item it guards; firing is
/// honored only while that index is still current, so an indicator
/// overtaken by the next item self-disposes. Without a fallback the
/// stream fails with a timeout error; with one, the arbiter switches the
/// downstream over to it.
pub struct TimeoutSelectorFlow<T, V> {
    source: FlowRef<T>,
    first: Option<FirstSelector<V>>,
    selector: ItemSelector<T, V>,
    fallback: Option<FlowRef<T>>,
}

impl<T: FlowItem, V: FlowItem> TimeoutSelectorFlow<T, V> {
    pub fn new(
        source: FlowRef<T>,
        first: Option<FirstSelector<V>>,
        selector: ItemSelector<T, V>,
        fallback: Option<FlowRef<T>>,
    ) -> Self {
        Self {
            source,
            first,
            selector,
            fallback,
        }
    }
}

impl<T: FlowItem, V: FlowItem> Flow<T> for TimeoutSelectorFlow<T, V> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        match &self.fallback {
            None => {
                let serialized: SubscriberRef<T> =
                    Arc::new(SerializedSubscriber::new(subscriber));
                let timeout = Arc::new_cyclic(|this: &Weak<TimeoutSubscriber<T, V>>| {
                    TimeoutSubscriber {
                        downstream: serialized,
                        first: self.first.clone(),
                        selector: Arc::clone(&self.selector),
                        upstream: Arc::new(SubscriptionCell::new()),
                        indicator: Mutex::new(IndicatorSlot {
                            current: None,
                            disposed: false,
                        }),
                        index: AtomicU64::new(0),
                        done: AtomicBool::new(false),
                        this: this.clone(),
                    }
                });
                self.source.subscribe(timeout);
            }
            Some(fallback) => {
                let timeout = Arc::new_cyclic(|this: &Weak<TimeoutFallbackSubscriber<T, V>>| {
                    TimeoutFallbackSubscriber {
                        arbiter: Arc::new(FullArbiter::new(subscriber.clone())),
                        downstream: subscriber,
                        first: self.first.clone(),
                        selector: Arc::clone(&self.selector),
                        fallback: fallback.clone(),
                        upstream: Arc::new(SubscriptionCell::new()),
                        indicator: Mutex::new(IndicatorSlot {
                            current: None,
                            disposed: false,
                        }),
                        index: AtomicU64::new(0),
                        done: AtomicBool::new(false),
                        this: this.clone(),
                    }
                });
                self.source.subscribe(timeout);
            }
        }
    }
}

/// Shared behavior of both flavors, seen from an indicator.
trait OnTimeout: Send + Sync {
    /// An indicator for item `index` fired.
    fn timeout(&self, index: u64);

    /// An indicator failed.
    fn timeout_error(&self, error: FlowError);
}

struct IndicatorSlot {
    current: Option<Arc<TimeoutIndicator>>,
    disposed: bool,
}

impl IndicatorSlot {
    fn install(&mut self, indicator: &Arc<TimeoutIndicator>) -> bool {
        if self.disposed {
            return false;
        }
        if let Some(previous) = self.current.replace(Arc::clone(indicator)) {
            previous.dispose();
        }
        true
    }

    fn dispose(&mut self) -> Option<Arc<TimeoutIndicator>> {
        self.disposed = true;
        self.current.take()
    }
}

struct TimeoutIndicator {
    parent: Weak<dyn OnTimeout>,
    index: u64,
    upstream: Arc<SubscriptionCell>,
    done: AtomicBool,
}

impl TimeoutIndicator {
    fn dispose(&self) {
        self.upstream.cancel();
    }

    fn fire(&self) {
        if let Some(parent) = self.parent.upgrade() {
            parent.timeout(self.index);
        }
    }
}

impl<V: FlowItem> Subscriber<V> for TimeoutIndicator {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.upstream.request(demand::UNBOUNDED);
        }
    }

    fn on_next(&self, _item: V) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.dispose();
        self.fire();
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        match self.parent.upgrade() {
            Some(parent) => parent.timeout_error(error),
            None => hooks::on_error(error),
        }
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.fire();
        }
    }
}

struct TimeoutSubscriber<T, V> {
    downstream: SubscriberRef<T>,
    first: Option<FirstSelector<V>>,
    selector: ItemSelector<T, V>,
    upstream: Arc<SubscriptionCell>,
    indicator: Mutex<IndicatorSlot>,
    index: AtomicU64,
    done: AtomicBool,
    this: Weak<Self>,
}

impl<T: FlowItem, V: FlowItem> TimeoutSubscriber<T, V> {
    fn start_indicator(&self, index: u64, flow: FlowRef<V>) {
        let indicator = Arc::new(TimeoutIndicator {
            parent: {
                let this: Weak<dyn OnTimeout> = self.this.clone();
                this
            },
            index,
            upstream: Arc::new(SubscriptionCell::new()),
            done: AtomicBool::new(false),
        });
        if self.indicator.lock().install(&indicator) {
            flow.subscribe(indicator);
        }
    }

    fn dispose_all(&self) {
        self.upstream.cancel();
        let previous = self.indicator.lock().dispose();
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    fn fail(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.dispose_all();
        self.downstream.on_error(error);
    }
}

impl<T: FlowItem, V: FlowItem> OnTimeout for TimeoutSubscriber<T, V> {
    fn timeout(&self, index: u64) {
        if index == self.index.load(Ordering::Acquire) {
            self.fail(FlowError::Timeout);
        }
    }

    fn timeout_error(&self, error: FlowError) {
        self.fail(error);
    }
}

impl<T: FlowItem, V: FlowItem> Subscriber<T> for TimeoutSubscriber<T, V> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if !self.upstream.set_once(subscription) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        if let Some(first) = &self.first {
            match first() {
                Err(error) => {
                    self.upstream.cancel();
                    signal_error(&self.downstream, error);
                    return;
                }
                Ok(flow) => {
                    self.downstream.on_subscribe(this.clone());
                    this.start_indicator(0, flow);
                }
            }
        } else {
            self.downstream.on_subscribe(this);
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let index = self.index.fetch_add(1, Ordering::AcqRel) + 1;
        self.downstream.on_next(item.clone());
        let Some(this) = self.this.upgrade() else {
            return;
        };
        match (self.selector)(&item) {
            Err(error) => this.fail(error),
            Ok(flow) => this.start_indicator(index, flow),
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.dispose_all();
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.dispose_all();
        self.downstream.on_complete();
    }
}

impl<T: FlowItem, V: FlowItem> Subscription for TimeoutSubscriber<T, V> {
    fn request(&self, n: u64) {
        self.upstream.request(n);
    }

    fn cancel(&self) {
        self.dispose_all();
    }
}

struct TimeoutFallbackSubscriber<T, V> {
    arbiter: Arc<FullArbiter<T>>,
    downstream: SubscriberRef<T>,
    first: Option<FirstSelector<V>>,
    selector: ItemSelector<T, V>,
    fallback: FlowRef<T>,
    upstream: Arc<SubscriptionCell>,
    indicator: Mutex<IndicatorSlot>,
    index: AtomicU64,
    done: AtomicBool,
    this: Weak<Self>,
}

impl<T: FlowItem, V: FlowItem> TimeoutFallbackSubscriber<T, V> {
    fn start_indicator(&self, index: u64, flow: FlowRef<V>) {
        let indicator = Arc::new(TimeoutIndicator {
            parent: {
                let this: Weak<dyn OnTimeout> = self.this.clone();
                this
            },
            index,
            upstream: Arc::new(SubscriptionCell::new()),
            done: AtomicBool::new(false),
        });
        if self.indicator.lock().install(&indicator) {
            flow.subscribe(indicator);
        }
    }

    fn dispose_indicator(&self) {
        let previous = self.indicator.lock().dispose();
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    fn upstream_tag(&self) -> Option<SubscriptionRef> {
        self.upstream.current()
    }
}

impl<T: FlowItem, V: FlowItem> OnTimeout for TimeoutFallbackSubscriber<T, V> {
    fn timeout(&self, index: u64) {
        if index != self.index.load(Ordering::Acquire) {
            return;
        }
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.upstream.cancel();
        self.dispose_indicator();
        self.fallback
            .subscribe(Arc::new(FullArbiterSubscriber::new(Arc::clone(
                &self.arbiter,
            ))));
    }

    fn timeout_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.upstream.cancel();
        self.dispose_indicator();
        match self.upstream_tag() {
            Some(tag) => self.arbiter.on_error(error, &tag),
            None => self.downstream.on_error(error),
        }
    }
}

impl<T: FlowItem, V: FlowItem> Subscriber<T> for TimeoutFallbackSubscriber<T, V> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if !self.upstream.set_once(subscription.clone()) {
            return;
        }
        if !self.arbiter.set_subscription(subscription) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        if let Some(first) = &self.first {
            match first() {
                Err(error) => {
                    self.upstream.cancel();
                    signal_error(&self.downstream, error);
                    return;
                }
                Ok(flow) => {
                    self.downstream.on_subscribe(this.clone().arbiter_handle());
                    this.start_indicator(0, flow);
                }
            }
        } else {
            self.downstream.on_subscribe(this.arbiter_handle());
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        let index = self.index.fetch_add(1, Ordering::AcqRel) + 1;
        let Some(tag) = self.upstream_tag() else {
            return;
        };
        if !self.arbiter.on_next(item.clone(), &tag) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        match (self.selector)(&item) {
            Err(error) => {
                self.done.store(true, Ordering::Release);
                self.upstream.cancel();
                self.dispose_indicator();
                self.arbiter.on_error(error, &tag);
            }
            Ok(flow) => this.start_indicator(index, flow),
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.dispose_indicator();
        let tag = self.upstream_tag();
        self.upstream.cancel();
        match tag {
            Some(tag) => self.arbiter.on_error(error, &tag),
            None => hooks::on_error(error),
        }
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.dispose_indicator();
        let tag = self.upstream_tag();
        self.upstream.cancel();
        if let Some(tag) = tag {
            self.arbiter.on_complete(&tag);
        }
    }
}

impl<T: FlowItem, V: FlowItem> TimeoutFallbackSubscriber<T, V> {
    fn arbiter_handle(self: Arc<Self>) -> SubscriptionRef {
        Arc::new(TimeoutFallbackSubscription { parent: self })
    }
}

struct TimeoutFallbackSubscription<T, V> {
    parent: Arc<TimeoutFallbackSubscriber<T, V>>,
}

impl<T: FlowItem, V: FlowItem> Subscription for TimeoutFallbackSubscription<T, V> {
    fn request(&self, n: u64) {
        self.parent.arbiter.request(n);
    }

    fn cancel(&self) {
        self.parent.arbiter.cancel();
        self.parent.upstream.cancel();
        self.parent.dispose_indicator();
    }
}
