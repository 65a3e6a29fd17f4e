// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The no-value stream variant.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use rheo_core::{
    hooks, Cancel, CancelRef, CancelSet, CompositeError, FlagCancel, Flow, FlowError, FlowRef,
    MpscLinked, SerialCancel, SpscRing, Subscriber, Subscription, SubscriptionCell,
    SubscriptionRef,
};
use rheo_error::Result;

/// Consumer of a no-value source: a handle first, then exactly one of
/// completion or error.
pub trait CompletableObserver: Send + Sync {
    /// Receives the cancellation handle before the terminal.
    fn on_subscribe(&self, cancel: CancelRef);

    /// Receives the completion terminal.
    fn on_complete(&self);

    /// Receives the failure terminal.
    fn on_error(&self, error: FlowError);
}

/// Shared handle to a [`CompletableObserver`].
pub type CompletableObserverRef = Arc<dyn CompletableObserver>;

/// A producer of completion or an error, with no items.
pub trait CompletableSource: Send + Sync {
    /// Accept an observer; `on_subscribe` is delivered first.
    fn subscribe(&self, observer: CompletableObserverRef);
}

/// Shared handle to a [`CompletableSource`].
pub type CompletableRef = Arc<dyn CompletableSource>;

/// A completable that completes immediately.
pub fn complete() -> CompletableRef {
    struct Complete;
    impl CompletableSource for Complete {
        fn subscribe(&self, observer: CompletableObserverRef) {
            observer.on_subscribe(Arc::new(FlagCancel::new()));
            observer.on_complete();
        }
    }
    Arc::new(Complete)
}

/// A completable that fails immediately with a clone of `error`.
pub fn completable_error(error: FlowError) -> CompletableRef {
    struct Error {
        error: FlowError,
    }
    impl CompletableSource for Error {
        fn subscribe(&self, observer: CompletableObserverRef) {
            observer.on_subscribe(Arc::new(FlagCancel::new()));
            observer.on_error(self.error.clone());
        }
    }
    Arc::new(Error { error })
}

/// A completable that runs `task` on subscribe and completes, or fails
/// with the task's error.
pub fn from_task<F>(task: F) -> CompletableRef
where
    F: Fn() -> Result<()> + Send + Sync + 'static,
{
    struct FromTask<F> {
        task: F,
    }
    impl<F: Fn() -> Result<()> + Send + Sync + 'static> CompletableSource for FromTask<F> {
        fn subscribe(&self, observer: CompletableObserverRef) {
            observer.on_subscribe(Arc::new(FlagCancel::new()));
            match (self.task)() {
                Ok(()) => observer.on_complete(),
                Err(error) => observer.on_error(error),
            }
        }
    }
    Arc::new(FromTask { task })
}

/// Run a stream of completables strictly one after another, completing
/// when the stream and the last inner both completed.
///
/// `prefetch` controls the upstream request cadence; re-entrant
/// subscribe-next calls collapse through a missed counter.
pub fn concat_completable(sources: FlowRef<CompletableRef>, prefetch: usize) -> CompletableRef {
    Arc::new(CompletableConcat { sources, prefetch })
}

struct CompletableConcat {
    sources: FlowRef<CompletableRef>,
    prefetch: usize,
}

impl CompletableSource for CompletableConcat {
    fn subscribe(&self, observer: CompletableObserverRef) {
        let coordinator = Arc::new_cyclic(|this: &Weak<ConcatCoordinator>| ConcatCoordinator {
            downstream: observer,
            prefetch: self.prefetch as u64,
            queue: SpscRing::new(self.prefetch),
            upstream: Arc::new(SubscriptionCell::new()),
            inner: SerialCancel::new(),
            wip: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            done: AtomicBool::new(false),
            once: AtomicBool::new(false),
            this: this.clone(),
        });
        self.sources.subscribe(coordinator);
    }
}

struct ConcatCoordinator {
    downstream: CompletableObserverRef,
    prefetch: u64,
    queue: SpscRing<CompletableRef>,
    upstream: Arc<SubscriptionCell>,
    inner: SerialCancel,
    wip: AtomicUsize,
    /// Whether an inner is currently running.
    active: AtomicBool,
    done: AtomicBool,
    /// Guards the one terminal this coordinator may deliver.
    once: AtomicBool,
    this: Weak<Self>,
}

impl ConcatCoordinator {
    fn next(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }
        let mut missed = 1;
        loop {
            if !self.active.load(Ordering::Acquire) {
                let done = self.done.load(Ordering::Acquire);
                match self.queue.poll() {
                    Some(source) => {
                        self.active.store(true, Ordering::Release);
                        source.subscribe(Arc::new(ConcatInner {
                            parent: self.this.clone(),
                        }));
                    }
                    None => {
                        if done && !self.once.swap(true, Ordering::AcqRel) {
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

    fn fail(&self, error: FlowError) {
        if self.once.swap(true, Ordering::AcqRel) {
            hooks::on_error(error);
            return;
        }
        self.upstream.cancel();
        self.inner.dispose();
        self.downstream.on_error(error);
    }

    fn inner_complete(&self) {
        self.active.store(false, Ordering::Release);
        if !self.done.load(Ordering::Acquire) {
            self.upstream.request(1);
        }
        self.next();
    }
}

impl Subscriber<CompletableRef> for ConcatCoordinator {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        if self.upstream.set_once(subscription) {
            self.downstream.on_subscribe(Arc::new(ConcatCancel {
                upstream: Arc::clone(&self.upstream),
                inner: self.this.clone(),
            }));
            self.upstream.request(self.prefetch);
        }
    }

    fn on_next(&self, source: CompletableRef) {
        if !self.queue.offer(source) {
            self.fail(FlowError::queue_full("completable concat prefetch"));
            return;
        }
        if let Some(this) = self.this.upgrade() {
            this.next();
        }
    }

    fn on_error(&self, error: FlowError) {
        self.fail(error);
    }

    fn on_complete(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            if let Some(this) = self.this.upgrade() {
                this.next();
            }
        }
    }
}

struct ConcatCancel {
    upstream: Arc<SubscriptionCell>,
    inner: Weak<ConcatCoordinator>,
}

impl Cancel for ConcatCancel {
    fn dispose(&self) {
        self.upstream.cancel();
        if let Some(coordinator) = self.inner.upgrade() {
            coordinator.inner.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.upstream.is_cancelled()
    }
}

struct ConcatInner {
    parent: Weak<ConcatCoordinator>,
}

impl CompletableObserver for ConcatInner {
    fn on_subscribe(&self, cancel: CancelRef) {
        if let Some(parent) = self.parent.upgrade() {
            parent.inner.set(cancel);
        } else {
            cancel.dispose();
        }
    }

    fn on_complete(&self) {
        if let Some(parent) = self.parent.upgrade() {
            parent.inner_complete();
        }
    }

    fn on_error(&self, error: FlowError) {
        match self.parent.upgrade() {
            Some(parent) => parent.fail(error),
            None => hooks::on_error(error),
        }
    }
}

/// Run every source concurrently; complete when all completed, and only
/// then report the failures, folded into one composite error.
pub fn merge_delay_error(sources: Vec<CompletableRef>) -> CompletableRef {
    Arc::new(CompletableMergeDelayError { sources })
}

struct CompletableMergeDelayError {
    sources: Vec<CompletableRef>,
}

impl CompletableSource for CompletableMergeDelayError {
    fn subscribe(&self, observer: CompletableObserverRef) {
        let set = Arc::new(CancelSet::new());
        observer.on_subscribe(set.clone());

        let state = Arc::new(MergeState {
            downstream: observer,
            set: Arc::clone(&set),
            errors: MpscLinked::new(),
            remaining: AtomicU64::new(1),
        });

        for source in &self.sources {
            if set.is_disposed() {
                return;
            }
            state.remaining.fetch_add(1, Ordering::AcqRel);
            source.subscribe(Arc::new(MergeObserver {
                state: Arc::clone(&state),
            }));
        }
        state.try_terminate();
    }
}

struct MergeState {
    downstream: CompletableObserverRef,
    set: Arc<CancelSet>,
    errors: MpscLinked<FlowError>,
    remaining: AtomicU64,
}

impl MergeState {
    fn try_terminate(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let mut composite = CompositeError::new();
        while let Some(error) = self.errors.poll() {
            composite.suppress(error);
        }
        match composite.simplify() {
            None => self.downstream.on_complete(),
            Some(error) => self.downstream.on_error(error),
        }
    }
}

struct MergeObserver {
    state: Arc<MergeState>,
}

impl CompletableObserver for MergeObserver {
    fn on_subscribe(&self, cancel: CancelRef) {
        self.state.set.add(cancel);
    }

    fn on_complete(&self) {
        self.state.try_terminate();
    }

    fn on_error(&self, error: FlowError) {
        self.state.errors.offer(error);
        self.state.try_terminate();
    }
}
