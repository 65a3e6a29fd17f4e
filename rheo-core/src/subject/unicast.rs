// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rheo_error::FlowError;

use crate::flow::{Flow, FlowItem, Subscriber, SubscriberRef, Subscription, SubscriptionRef};
use crate::hooks;
use crate::notification::Notification;
use crate::queue::MpscLinked;

/// A hot source that buffers until its single subscriber arrives, then
/// replays and stays live.
///
/// Window operators hand one of these out per window: the producer side
/// starts filling it before anyone is listening. A second subscriber is
/// rejected with an invalid-state error.
pub struct UnicastSubject<T> {
    state: Arc<UnicastState<T>>,
}

struct UnicastState<T> {
    queue: MpscLinked<T>,
    downstream: Mutex<Option<SubscriberRef<T>>>,
    terminal: Mutex<Option<Notification<T>>>,
    wip: AtomicUsize,
    taken: AtomicBool,
    cancelled: AtomicBool,
    shut: AtomicBool,
}

impl<T: FlowItem> UnicastSubject<T> {
    /// Create an empty, unsubscribed subject.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(UnicastState {
                queue: MpscLinked::new(),
                downstream: Mutex::new(None),
                terminal: Mutex::new(None),
                wip: AtomicUsize::new(0),
                taken: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                shut: AtomicBool::new(false),
            }),
        }
    }

    /// Push an item; buffered until the subscriber arrives.
    pub fn on_next(&self, item: T) {
        if self.state.shut.load(Ordering::Acquire) || self.state.cancelled.load(Ordering::Acquire)
        {
            return;
        }
        self.state.queue.offer(item);
        self.state.drain();
    }

    /// Fail the subject. A second terminal goes to the error hook.
    pub fn on_error(&self, error: FlowError) {
        if self.state.shut.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        *self.state.terminal.lock() = Some(Notification::Error(error));
        self.state.drain();
    }

    /// Complete the subject. Idempotent.
    pub fn on_complete(&self) {
        if self.state.shut.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.state.terminal.lock() = Some(Notification::Complete);
        self.state.drain();
    }
}

impl<T: FlowItem> Default for UnicastSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FlowItem> Clone for UnicastSubject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: FlowItem> Flow<T> for UnicastSubject<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        if self.state.taken.swap(true, Ordering::AcqRel) {
            crate::flow::signal_error(
                &subscriber,
                FlowError::invalid_state("unicast subject allows a single subscriber"),
            );
            return;
        }
        subscriber.on_subscribe(Arc::new(UnicastHandle {
            state: Arc::clone(&self.state),
        }));
        *self.state.downstream.lock() = Some(subscriber);
        self.state.drain();
    }
}

struct UnicastHandle<T> {
    state: Arc<UnicastState<T>>,
}

impl<T: FlowItem> Subscription for UnicastHandle<T> {
    fn request(&self, _n: u64) {
        // windows are consumed without demand accounting
    }

    fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
        self.state.drain();
    }
}

impl<T: FlowItem> UnicastState<T> {
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                self.queue.clear();
                *self.downstream.lock() = None;
                return;
            }
            let downstream = self.downstream.lock().clone();
            if let Some(downstream) = downstream {
                while let Some(item) = self.queue.poll() {
                    if self.cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    downstream.on_next(item);
                }
                if self.queue.is_empty() && !self.cancelled.load(Ordering::Acquire) {
                    let terminal = self.terminal.lock().take();
                    if let Some(terminal) = terminal {
                        terminal.accept(&downstream);
                        *self.downstream.lock() = None;
                        return;
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
