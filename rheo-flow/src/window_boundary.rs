// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rheo_core::{
    demand, hooks, Flow, FlowError, FlowItem, FlowRef, MpscLinked, SerializedSubscriber,
    Subscriber, SubscriberRef, Subscription, SubscriptionCell, SubscriptionRef, UnicastSubject,
};

/// Splits the stream into consecutive windows delimited by the boundary
/// source's emissions.
///
/// Each boundary tick completes the current window and opens a fresh one.
/// Items and ticks funnel through a multi-producer queue into one drain,
/// so window hand-over is serialized against item delivery. An open
/// window counts towards the live-window total; the boundary subscription
/// is dropped once that count reaches zero.
pub struct WindowBoundaryFlow<T, B> {
    source: FlowRef<T>,
    boundary: FlowRef<B>,
}

impl<T: FlowItem, B: FlowItem> WindowBoundaryFlow<T, B> {
    pub fn new(source: FlowRef<T>, boundary: FlowRef<B>) -> Self {
        Self { source, boundary }
    }
}

impl<T: FlowItem, B: FlowItem> Flow<FlowRef<T>> for WindowBoundaryFlow<T, B> {
    fn subscribe(&self, subscriber: SubscriberRef<FlowRef<T>>) {
        let serialized: SubscriberRef<FlowRef<T>> =
            Arc::new(SerializedSubscriber::new(subscriber));
        let main = Arc::new_cyclic(|this: &Weak<WindowBoundaryMain<T, B>>| WindowBoundaryMain {
            downstream: serialized,
            boundary_flow: self.boundary.clone(),
            queue: MpscLinked::new(),
            wip: AtomicUsize::new(0),
            window: Mutex::new(None),
            windows: AtomicU64::new(1),
            upstream: Arc::new(SubscriptionCell::new()),
            boundary: Arc::new(SubscriptionCell::new()),
            cancelled: AtomicBool::new(false),
            done: AtomicBool::new(false),
            error: Mutex::new(None),
            this: this.clone(),
        });
        self.source.subscribe(main);
    }
}

enum WindowSignal<T> {
    Item(T),
    Boundary,
}

struct WindowBoundaryMain<T, B> {
    downstream: SubscriberRef<FlowRef<T>>,
    boundary_flow: FlowRef<B>,
    queue: MpscLinked<WindowSignal<T>>,
    wip: AtomicUsize,
    window: Mutex<Option<UnicastSubject<T>>>,
    /// Live windows plus the outer stream itself.
    windows: AtomicU64,
    upstream: Arc<SubscriptionCell>,
    boundary: Arc<SubscriptionCell>,
    cancelled: AtomicBool,
    done: AtomicBool,
    error: Mutex<Option<FlowError>>,
    this: Weak<Self>,
}

impl<T: FlowItem, B: FlowItem> WindowBoundaryMain<T, B> {
    fn boundary_tick(&self) {
        self.queue.offer(WindowSignal::Boundary);
        self.drain();
    }

    fn teardown(&self) {
        self.boundary.cancel();
        self.upstream.cancel();
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            loop {
                let done = self.done.load(Ordering::Acquire);
                let signal = self.queue.poll();

                if done && signal.is_none() {
                    self.teardown();
                    let window = self.window.lock().take();
                    if let Some(window) = window {
                        match self.error.lock().take() {
                            Some(error) => window.on_error(error),
                            None => window.on_complete(),
                        }
                    }
                    return;
                }
                let Some(signal) = signal else {
                    break;
                };
                match signal {
                    WindowSignal::Item(item) => {
                        let window = self.window.lock().clone();
                        if let Some(window) = window {
                            window.on_next(item);
                        }
                    }
                    WindowSignal::Boundary => {
                        let closing = self.window.lock().take();
                        if let Some(closing) = closing {
                            closing.on_complete();
                        }
                        if self.windows.fetch_sub(1, Ordering::AcqRel) == 1 {
                            self.teardown();
                            return;
                        }
                        if self.cancelled.load(Ordering::Acquire) {
                            continue;
                        }
                        let fresh = UnicastSubject::new();
                        *self.window.lock() = Some(fresh.clone());
                        self.windows.fetch_add(1, Ordering::AcqRel);
                        self.downstream.on_next(Arc::new(fresh));
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

impl<T: FlowItem, B: FlowItem> Subscriber<T> for WindowBoundaryMain<T, B> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if !self.upstream.set_once(subscription) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        self.downstream
            .on_subscribe(Arc::new(WindowBoundarySubscription {
                parent: this.clone(),
            }));
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }

        let first = UnicastSubject::new();
        *self.window.lock() = Some(first.clone());
        self.downstream.on_next(Arc::new(first));

        self.windows.fetch_add(1, Ordering::AcqRel);
        self.boundary_flow.subscribe(Arc::new(BoundarySubscriber {
            parent: this,
            done: AtomicBool::new(false),
        }));

        self.upstream.request(demand::UNBOUNDED);
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        self.queue.offer(WindowSignal::Item(item));
        self.drain();
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        *self.error.lock() = Some(error.clone());
        self.drain();
        if self.windows.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.boundary.cancel();
        }
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.drain();
        if self.windows.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.boundary.cancel();
        }
        self.downstream.on_complete();
    }
}

struct WindowBoundarySubscription<T, B> {
    parent: Arc<WindowBoundaryMain<T, B>>,
}

impl<T: FlowItem, B: FlowItem> Subscription for WindowBoundarySubscription<T, B> {
    fn request(&self, n: u64) {
        // windows are handed out as the boundary dictates
        demand::validate(n);
    }

    fn cancel(&self) {
        self.parent.cancelled.store(true, Ordering::Release);
    }
}

struct BoundarySubscriber<T, B> {
    parent: Arc<WindowBoundaryMain<T, B>>,
    done: AtomicBool,
}

impl<T: FlowItem, B: FlowItem> Subscriber<B> for BoundarySubscriber<T, B> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.parent.boundary.set_once(subscription) {
            self.parent.boundary.request(demand::UNBOUNDED);
        }
    }

    fn on_next(&self, _item: B) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        self.parent.boundary_tick();
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.parent.on_error(error);
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            self.parent.on_complete();
        }
    }
}
