// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rheo_core::{
    demand, hooks, signal_complete, CombinerFn, CompositeError, Flow, FlowError, FlowItem,
    FlowRef, MpscLinked, Subscriber, SubscriberRef, Subscription, SubscriptionCell,
    SubscriptionRef,
};

use crate::DEFAULT_BUFFER_SIZE;

/// Combines the latest values of N sources through an N-ary combiner.
///
/// Nothing is emitted until every source has produced at least once; from
/// then on each arrival snapshots the latest array and queues it for the
/// demand-gated drain. A source that completes without ever producing
/// terminates the whole combination. With `delay_error` set, queued
/// snapshots are drained before any accumulated failure is reported;
/// failures from several sources aggregate into a composite.
pub struct CombineLatestFlow<T, R> {
    sources: Vec<FlowRef<T>>,
    combiner: CombinerFn<T, R>,
    buffer_size: usize,
    delay_error: bool,
}

impl<T: FlowItem, R: FlowItem> CombineLatestFlow<T, R> {
    pub fn new(sources: Vec<FlowRef<T>>, combiner: CombinerFn<T, R>, delay_error: bool) -> Self {
        Self {
            sources,
            combiner,
            buffer_size: DEFAULT_BUFFER_SIZE,
            delay_error,
        }
    }
}

/// Combine the latest values of `sources` through `combiner`.
pub fn combine_latest<T, R, F>(sources: Vec<FlowRef<T>>, combiner: F) -> FlowRef<R>
where
    T: FlowItem,
    R: FlowItem,
    F: Fn(&[T]) -> rheo_error::Result<R> + Send + Sync + 'static,
{
    Arc::new(CombineLatestFlow::new(sources, Arc::new(combiner), false))
}

/// Like [`combine_latest`], but failures wait until the queued
/// combinations have drained.
pub fn combine_latest_delay_error<T, R, F>(sources: Vec<FlowRef<T>>, combiner: F) -> FlowRef<R>
where
    T: FlowItem,
    R: FlowItem,
    F: Fn(&[T]) -> rheo_error::Result<R> + Send + Sync + 'static,
{
    Arc::new(CombineLatestFlow::new(sources, Arc::new(combiner), true))
}

impl<T: FlowItem, R: FlowItem> Flow<R> for CombineLatestFlow<T, R> {
    fn subscribe(&self, subscriber: SubscriberRef<R>) {
        if self.sources.is_empty() {
            signal_complete(&subscriber);
            return;
        }
        let count = self.sources.len();
        let coordinator = Arc::new(LatestCoordinator {
            downstream: subscriber.clone(),
            combiner: Arc::clone(&self.combiner),
            delay_error: self.delay_error,
            subscribers: (0..count)
                .map(|index| {
                    Arc::new(CombinerSubscriber {
                        index,
                        upstream: Arc::new(SubscriptionCell::new()),
                        prefetch: self.buffer_size as u64,
                        done: AtomicBool::new(false),
                        parent: Mutex::new(Weak::new()),
                    })
                })
                .collect(),
            combine_state: Mutex::new(CombineState {
                latest: vec![None; count],
                active: 0,
                complete: 0,
            }),
            queue: MpscLinked::new(),
            requested: AtomicU64::new(0),
            wip: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            done: AtomicBool::new(false),
            error: Mutex::new(None),
        });
        for subscriber in &coordinator.subscribers {
            *subscriber.parent.lock() = Arc::downgrade(&coordinator);
        }
        subscriber.on_subscribe(coordinator.clone());
        for (index, source) in self.sources.iter().enumerate() {
            if coordinator.cancelled.load(Ordering::Acquire) {
                return;
            }
            source.subscribe(coordinator.subscribers[index].clone());
        }
    }
}

struct CombineState<T> {
    latest: Vec<Option<T>>,
    /// Sources that have produced at least one value.
    active: usize,
    /// Sources that have completed after producing.
    complete: usize,
}

struct LatestCoordinator<T, R> {
    downstream: SubscriberRef<R>,
    combiner: CombinerFn<T, R>,
    delay_error: bool,
    subscribers: Vec<Arc<CombinerSubscriber<T, R>>>,
    combine_state: Mutex<CombineState<T>>,
    queue: MpscLinked<(usize, Vec<T>)>,
    requested: AtomicU64,
    wip: AtomicUsize,
    cancelled: AtomicBool,
    done: AtomicBool,
    error: Mutex<Option<FlowError>>,
}

impl<T: FlowItem, R: FlowItem> LatestCoordinator<T, R> {
    /// One combine step under the coordinator lock: fold the arrival into
    /// the latest array and decide between enqueueing a snapshot,
    /// replenishing the source, or terminating.
    fn combine(&self, value: Option<T>, index: usize) {
        let full = {
            let mut state = self.combine_state.lock();
            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            let len = state.latest.len();
            let had_value = state.latest[index].is_some();
            if value.is_some() && !had_value {
                state.active += 1;
            }
            if value.is_none() {
                state.complete += 1;
            }
            let full = state.active == len;
            let terminated = state.complete == len || (value.is_none() && !had_value);
            match value {
                Some(value) => {
                    state.latest[index] = Some(value);
                    if !terminated && full {
                        let snapshot: Vec<T> = state
                            .latest
                            .iter()
                            .map(|slot| slot.clone().expect("all sources active"))
                            .collect();
                        self.queue.offer((index, snapshot));
                    }
                }
                None => {
                    if terminated || self.error.lock().is_some() {
                        self.done.store(true, Ordering::Release);
                    }
                }
            }
            if terminated {
                self.done.store(true, Ordering::Release);
            }
            full
        };
        if !full && !self.done.load(Ordering::Acquire) {
            // not yet combining: keep this source flowing
            self.subscribers[index].request_one();
            return;
        }
        self.drain();
    }

    fn record_error(&self, error: FlowError) {
        let mut slot = self.error.lock();
        *slot = Some(match slot.take() {
            None => error,
            Some(previous) => {
                let mut composite = CompositeError::from_errors(vec![previous]);
                composite.suppress(error);
                FlowError::Composite(composite)
            }
        });
    }

    fn cancel_all(&self) {
        for subscriber in &self.subscribers {
            subscriber.cancel_upstream();
        }
    }

    fn clear(&self) {
        {
            let mut state = self.combine_state.lock();
            for slot in &mut state.latest {
                *slot = None;
            }
        }
        self.queue.clear();
    }

    /// Returns `true` when the drain is over.
    fn check_terminated(&self, done: bool, empty: bool) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            self.cancel_all();
            self.clear();
            return true;
        }
        if !done {
            return false;
        }
        if self.delay_error {
            if empty {
                self.cancel_all();
                self.clear();
                let error = self.error.lock().take();
                match error {
                    Some(error) => self.downstream.on_error(error),
                    None => self.downstream.on_complete(),
                }
                return true;
            }
        } else {
            let error = self.error.lock().take();
            if let Some(error) = error {
                self.cancel_all();
                self.clear();
                self.downstream.on_error(error);
                return true;
            }
            if empty {
                self.cancel_all();
                self.clear();
                self.downstream.on_complete();
                return true;
            }
        }
        false
    }

    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            if self.check_terminated(self.done.load(Ordering::Acquire), self.queue.is_empty()) {
                return;
            }
            let r = self.requested.load(Ordering::Acquire);
            let mut emitted = 0u64;
            while emitted != r {
                let done = self.done.load(Ordering::Acquire);
                let next = self.queue.poll();
                let empty = next.is_none();
                if self.check_terminated(done, empty) {
                    return;
                }
                let Some((index, snapshot)) = next else {
                    break;
                };
                match (self.combiner)(&snapshot) {
                    Err(error) => {
                        self.cancelled.store(true, Ordering::Release);
                        self.cancel_all();
                        self.clear();
                        self.downstream.on_error(error);
                        return;
                    }
                    Ok(combined) => {
                        self.downstream.on_next(combined);
                        self.subscribers[index].request_one();
                        emitted += 1;
                    }
                }
            }
            if emitted > 0 && r != demand::UNBOUNDED {
                demand::produced(&self.requested, emitted);
            }
            // a drain triggered by demand may empty the queue with a
            // delayed terminal still pending
            if self.check_terminated(self.done.load(Ordering::Acquire), self.queue.is_empty()) {
                return;
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                return;
            }
        }
    }
}

impl<T: FlowItem, R: FlowItem> Subscription for LatestCoordinator<T, R> {
    fn request(&self, n: u64) {
        if !demand::validate(n) {
            return;
        }
        demand::add(&self.requested, n);
        self.drain();
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            self.cancel_all();
            self.clear();
        }
    }
}

struct CombinerSubscriber<T, R> {
    index: usize,
    upstream: Arc<SubscriptionCell>,
    prefetch: u64,
    done: AtomicBool,
    parent: Mutex<Weak<LatestCoordinator<T, R>>>,
}

impl<T: FlowItem, R: FlowItem> CombinerSubscriber<T, R> {
    fn coordinator(&self) -> Option<Arc<LatestCoordinator<T, R>>> {
        self.parent.lock().upgrade()
    }

    fn request_one(&self) {
        self.upstream.request(1);
    }

    fn cancel_upstream(&self) {
        self.upstream.cancel();
    }
}

impl<T: FlowItem, R: FlowItem> Subscriber<T> for CombinerSubscriber<T, R> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.upstream.request(self.prefetch);
        }
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        if let Some(coordinator) = self.coordinator() {
            coordinator.combine(Some(item), self.index);
        }
    }

    fn on_error(&self, error: FlowError) {
        if self.done.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        if let Some(coordinator) = self.coordinator() {
            coordinator.record_error(error);
            coordinator.combine(None, self.index);
        }
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(coordinator) = self.coordinator() {
            coordinator.combine(None, self.index);
        }
    }
}
