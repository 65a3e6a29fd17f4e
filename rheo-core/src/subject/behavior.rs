// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rheo_error::FlowError;

use crate::flow::{Flow, FlowItem, Subscriber, SubscriberRef, Subscription, SubscriptionRef};
use crate::hooks;
use crate::notification::Notification;

/// A hot source that replays its latest signal to every late subscriber.
///
/// The current signal lives in a versioned cell: the write path bumps a
/// monotonic index and publishes the new notification under the write half
/// of a lock; the subscribe path snapshots `(index, signal)` under the
/// read half, so a subscriber sees the latest value exactly once even when
/// emissions race its arrival.
///
/// Each subscriber emits on a fast path while uncontended and falls back
/// to a private overflow queue when its first emission is still in flight.
/// Terminal signals switch the subscriber list to a terminated state;
/// subscribers arriving afterwards receive the terminal synchronously
/// inside `subscribe`.
///
/// Producer-side calls (`on_next`, `on_error`, `on_complete`) must be
/// serialized by the caller, as for any subject.
pub struct BehaviorSubject<T> {
    state: Arc<BehaviorState<T>>,
}

struct BehaviorState<T> {
    current: RwLock<CurrentCell<T>>,
    subscribers: Mutex<SubscriberList<T>>,
    done: AtomicBool,
}

struct CurrentCell<T> {
    index: u64,
    signal: Option<Notification<T>>,
}

enum SubscriberList<T> {
    Live(Vec<Arc<BehaviorEntry<T>>>),
    Terminated,
}

impl<T: FlowItem> BehaviorSubject<T> {
    /// Create a subject with no current value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(BehaviorState {
                current: RwLock::new(CurrentCell {
                    index: 0,
                    signal: None,
                }),
                subscribers: Mutex::new(SubscriberList::Live(Vec::new())),
                done: AtomicBool::new(false),
            }),
        }
    }

    /// Create a subject pre-loaded with `default`, which is replayed to
    /// the first subscribers as if it had been emitted.
    #[must_use]
    pub fn with_default(default: T) -> Self {
        let subject = Self::new();
        subject.state.current.write().signal = Some(Notification::Next(default));
        subject
    }

    /// Push an item to all current subscribers and store it for late ones.
    pub fn on_next(&self, item: T) {
        if self.state.done.load(Ordering::Acquire) {
            return;
        }
        let index = self.state.publish(Notification::Next(item.clone()));
        for entry in self.state.snapshot() {
            entry.emit_next(Notification::Next(item.clone()), index);
        }
    }

    /// Fail the subject. Exactly one terminal wins; later ones go to the
    /// error hook.
    pub fn on_error(&self, error: FlowError) {
        if self.state.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        let index = self.state.publish(Notification::Error(error.clone()));
        for entry in self.state.terminate() {
            entry.emit_next(Notification::Error(error.clone()), index);
        }
    }

    /// Complete the subject. Idempotent.
    pub fn on_complete(&self) {
        if self.state.done.swap(true, Ordering::AcqRel) {
            return;
        }
        let index = self.state.publish(Notification::Complete);
        for entry in self.state.terminate() {
            entry.emit_next(Notification::Complete, index);
        }
    }

    /// The latest live value, if the subject holds one and has not
    /// terminated.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        match &self.state.current.read().signal {
            Some(Notification::Next(item)) => Some(item.clone()),
            _ => None,
        }
    }

    /// Whether any subscriber is currently attached.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() != 0
    }

    /// Number of currently attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        match &*self.state.subscribers.lock() {
            SubscriberList::Live(entries) => entries.len(),
            SubscriberList::Terminated => 0,
        }
    }
}

impl<T: FlowItem> Default for BehaviorSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FlowItem> Clone for BehaviorSubject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: FlowItem> Flow<T> for BehaviorSubject<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let entry = Arc::new(BehaviorEntry {
            downstream: subscriber.clone(),
            state: Arc::clone(&self.state),
            cancelled: AtomicBool::new(false),
            emission: Mutex::new(EntryEmission {
                next: false,
                emitting: false,
                fast_path: false,
                index: 0,
                queue: VecDeque::new(),
            }),
        });
        subscriber.on_subscribe(entry.clone());
        if entry.cancelled.load(Ordering::Acquire) {
            return;
        }
        if self.state.add(&entry) {
            if entry.cancelled.load(Ordering::Acquire) {
                self.state.remove(&entry);
            } else {
                entry.emit_first();
            }
        } else {
            // already terminated: replay the terminal synchronously
            let terminal = self.state.current.read().signal.clone();
            match terminal {
                Some(Notification::Error(error)) => subscriber.on_error(error),
                _ => subscriber.on_complete(),
            }
        }
    }
}

/// The subject is itself a consumer, so a flow can be piped straight into
/// it.
impl<T: FlowItem> Subscriber<T> for BehaviorSubject<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.state.done.load(Ordering::Acquire) {
            subscription.cancel();
        } else {
            subscription.request(u64::MAX);
        }
    }

    fn on_next(&self, item: T) {
        BehaviorSubject::on_next(self, item);
    }

    fn on_error(&self, error: FlowError) {
        BehaviorSubject::on_error(self, error);
    }

    fn on_complete(&self) {
        BehaviorSubject::on_complete(self);
    }
}

impl<T: FlowItem> BehaviorState<T> {
    /// Bump the version and publish `signal`. Returns the new index.
    fn publish(&self, signal: Notification<T>) -> u64 {
        let mut cell = self.current.write();
        cell.index += 1;
        cell.signal = Some(signal);
        cell.index
    }

    fn snapshot(&self) -> Vec<Arc<BehaviorEntry<T>>> {
        match &*self.subscribers.lock() {
            SubscriberList::Live(entries) => entries.clone(),
            SubscriberList::Terminated => Vec::new(),
        }
    }

    /// Switch to the terminated state, returning the subscribers that were
    /// attached at that moment.
    fn terminate(&self) -> Vec<Arc<BehaviorEntry<T>>> {
        let mut list = self.subscribers.lock();
        match std::mem::replace(&mut *list, SubscriberList::Terminated) {
            SubscriberList::Live(entries) => entries,
            SubscriberList::Terminated => Vec::new(),
        }
    }

    /// Returns `false` when the subject already terminated.
    fn add(&self, entry: &Arc<BehaviorEntry<T>>) -> bool {
        let mut list = self.subscribers.lock();
        match &mut *list {
            SubscriberList::Live(entries) => {
                entries.push(Arc::clone(entry));
                true
            }
            SubscriberList::Terminated => false,
        }
    }

    fn remove(&self, entry: &Arc<BehaviorEntry<T>>) {
        let mut list = self.subscribers.lock();
        if let SubscriberList::Live(entries) = &mut *list {
            entries.retain(|candidate| !Arc::ptr_eq(candidate, entry));
        }
    }
}

struct BehaviorEntry<T> {
    downstream: SubscriberRef<T>,
    state: Arc<BehaviorState<T>>,
    cancelled: AtomicBool,
    emission: Mutex<EntryEmission<T>>,
}

struct EntryEmission<T> {
    /// Whether the initial snapshot replay has run.
    next: bool,
    emitting: bool,
    /// Once the first emission finished, signals are delivered inline
    /// without re-checking the snapshot index.
    fast_path: bool,
    /// Version of the last signal this entry has accounted for.
    index: u64,
    queue: VecDeque<Notification<T>>,
}

impl<T: FlowItem> BehaviorEntry<T> {
    /// Replay the snapshot current value to a fresh subscriber.
    fn emit_first(&self) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let first = {
            let mut emission = self.emission.lock();
            if emission.next {
                return;
            }
            let (index, signal) = {
                let cell = self.state.current.read();
                (cell.index, cell.signal.clone())
            };
            emission.index = index;
            emission.next = true;
            emission.emitting = signal.is_some();
            signal
        };
        if let Some(signal) = first {
            if self.deliver(signal) {
                return;
            }
            self.emit_loop();
        }
    }

    /// Deliver a versioned signal, falling back to the overflow queue when
    /// the entry is mid-emission.
    fn emit_next(&self, signal: Notification<T>, index: u64) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        {
            let mut emission = self.emission.lock();
            if !emission.fast_path {
                if emission.index == index {
                    // the snapshot replay already covered this version
                    return;
                }
                if emission.emitting {
                    emission.queue.push_back(signal);
                    return;
                }
                emission.next = true;
                emission.fast_path = true;
            }
        }
        self.deliver(signal);
    }

    /// Returns `true` when emission should stop (cancelled or terminal).
    fn deliver(&self, signal: Notification<T>) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        signal.accept(&self.downstream)
    }

    fn emit_loop(&self) {
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            let batch = {
                let mut emission = self.emission.lock();
                if emission.queue.is_empty() {
                    emission.emitting = false;
                    emission.fast_path = true;
                    return;
                }
                std::mem::take(&mut emission.queue)
            };
            for signal in batch {
                if self.deliver(signal) {
                    return;
                }
            }
        }
    }
}

impl<T: FlowItem> Subscription for BehaviorEntry<T> {
    fn request(&self, _n: u64) {
        // hot subject: every subscription is effectively unbounded
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            let mut list = self.state.subscribers.lock();
            if let SubscriberList::Live(entries) = &mut *list {
                entries.retain(|candidate| !std::ptr::eq(Arc::as_ptr(candidate), self));
            }
        }
    }
}
