// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The single-valued stream variant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rheo_core::{
    demand, Cancel, CancelRef, FlagCancel, Flow, FlowError, FlowItem, FlowRef, Result,
    Subscriber, SubscriberRef, Subscription,
};

/// Consumer of a single-valued source: a handle first, then exactly one
/// of success or error.
pub trait SingleObserver<T>: Send + Sync {
    /// Receives the cancellation handle before any terminal.
    fn on_subscribe(&self, cancel: CancelRef);

    /// Receives the one result value.
    fn on_success(&self, value: T);

    /// Receives the failure terminal.
    fn on_error(&self, error: FlowError);
}

/// Shared handle to a [`SingleObserver`].
pub type SingleObserverRef<T> = Arc<dyn SingleObserver<T>>;

/// A producer of exactly one value or an error.
pub trait SingleSource<T: FlowItem>: Send + Sync {
    /// Accept an observer; `on_subscribe` is delivered first.
    fn subscribe(&self, observer: SingleObserverRef<T>);
}

/// Shared handle to a [`SingleSource`].
pub type SingleRef<T> = Arc<dyn SingleSource<T>>;

/// A single that succeeds immediately with a clone of `value`.
pub fn single_just<T: FlowItem>(value: T) -> SingleRef<T> {
    struct Just<T> {
        value: T,
    }
    impl<T: FlowItem> SingleSource<T> for Just<T> {
        fn subscribe(&self, observer: SingleObserverRef<T>) {
            observer.on_subscribe(Arc::new(FlagCancel::new()));
            observer.on_success(self.value.clone());
        }
    }
    Arc::new(Just { value })
}

/// A single that fails immediately with a clone of `error`.
pub fn single_error<T: FlowItem>(error: FlowError) -> SingleRef<T> {
    struct Error {
        error: FlowError,
    }
    impl<T: FlowItem> SingleSource<T> for Error {
        fn subscribe(&self, observer: SingleObserverRef<T>) {
            observer.on_subscribe(Arc::new(FlagCancel::new()));
            observer.on_error(self.error.clone());
        }
    }
    Arc::new(Error { error })
}

type LiftFn<T, R> =
    Arc<dyn Fn(SingleObserverRef<R>) -> Result<SingleObserverRef<T>> + Send + Sync>;

/// Operator composition on any shared single.
pub trait SingleExt<T: FlowItem> {
    /// Transform the success value through a fallible mapper.
    fn map<R, F>(&self, mapper: F) -> SingleRef<R>
    where
        R: FlowItem,
        F: Fn(T) -> Result<R> + Send + Sync + 'static;

    /// Run a side effect on the success value before passing it on; a
    /// failing side effect converts the success into an error.
    fn do_on_success<F>(&self, on_success: F) -> SingleRef<T>
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static;

    /// Run a side effect on the error before passing it on; a failing
    /// side effect is composed with the original error.
    fn do_on_error<F>(&self, on_error: F) -> SingleRef<T>
    where
        F: Fn(&FlowError) -> Result<()> + Send + Sync + 'static;

    /// Splice a custom observer transformation into the subscribe path.
    fn lift<R>(&self, lift: LiftFn<T, R>) -> SingleRef<R>
    where
        R: FlowItem;

    /// Expose this single as a one-item flow: the success value is
    /// emitted once demand arrives, then the flow completes.
    fn to_flow(&self) -> FlowRef<T>;
}

impl<T: FlowItem> SingleExt<T> for SingleRef<T> {
    fn map<R, F>(&self, mapper: F) -> SingleRef<R>
    where
        R: FlowItem,
        F: Fn(T) -> Result<R> + Send + Sync + 'static,
    {
        let source = self.clone();
        let mapper = Arc::new(mapper);
        Arc::new(SingleMap { source, mapper })
    }

    fn do_on_success<F>(&self, on_success: F) -> SingleRef<T>
    where
        F: Fn(&T) -> Result<()> + Send + Sync + 'static,
    {
        let source = self.clone();
        let on_success = Arc::new(on_success);
        Arc::new(SingleDoOnSuccess { source, on_success })
    }

    fn do_on_error<F>(&self, on_error: F) -> SingleRef<T>
    where
        F: Fn(&FlowError) -> Result<()> + Send + Sync + 'static,
    {
        let source = self.clone();
        let on_error = Arc::new(on_error);
        Arc::new(SingleDoOnError { source, on_error })
    }

    fn lift<R>(&self, lift: LiftFn<T, R>) -> SingleRef<R>
    where
        R: FlowItem,
    {
        Arc::new(SingleLift {
            source: self.clone(),
            lift,
        })
    }

    fn to_flow(&self) -> FlowRef<T> {
        Arc::new(SingleToFlow {
            source: self.clone(),
        })
    }
}

struct SingleMap<T, R> {
    source: SingleRef<T>,
    mapper: Arc<dyn Fn(T) -> Result<R> + Send + Sync>,
}

impl<T: FlowItem, R: FlowItem> SingleSource<R> for SingleMap<T, R> {
    fn subscribe(&self, observer: SingleObserverRef<R>) {
        self.source.subscribe(Arc::new(MapObserver {
            downstream: observer,
            mapper: Arc::clone(&self.mapper),
        }));
    }
}

struct MapObserver<T, R> {
    downstream: SingleObserverRef<R>,
    mapper: Arc<dyn Fn(T) -> Result<R> + Send + Sync>,
}

impl<T: FlowItem, R: FlowItem> SingleObserver<T> for MapObserver<T, R> {
    fn on_subscribe(&self, cancel: CancelRef) {
        self.downstream.on_subscribe(cancel);
    }

    fn on_success(&self, value: T) {
        match (self.mapper)(value) {
            Ok(mapped) => self.downstream.on_success(mapped),
            Err(error) => self.downstream.on_error(error),
        }
    }

    fn on_error(&self, error: FlowError) {
        self.downstream.on_error(error);
    }
}

struct SingleDoOnSuccess<T> {
    source: SingleRef<T>,
    on_success: Arc<dyn Fn(&T) -> Result<()> + Send + Sync>,
}

impl<T: FlowItem> SingleSource<T> for SingleDoOnSuccess<T> {
    fn subscribe(&self, observer: SingleObserverRef<T>) {
        struct Observer<T> {
            downstream: SingleObserverRef<T>,
            on_success: Arc<dyn Fn(&T) -> Result<()> + Send + Sync>,
        }
        impl<T: FlowItem> SingleObserver<T> for Observer<T> {
            fn on_subscribe(&self, cancel: CancelRef) {
                self.downstream.on_subscribe(cancel);
            }

            fn on_success(&self, value: T) {
                if let Err(error) = (self.on_success)(&value) {
                    self.downstream.on_error(error);
                    return;
                }
                self.downstream.on_success(value);
            }

            fn on_error(&self, error: FlowError) {
                self.downstream.on_error(error);
            }
        }
        self.source.subscribe(Arc::new(Observer {
            downstream: observer,
            on_success: Arc::clone(&self.on_success),
        }));
    }
}

struct SingleDoOnError<T> {
    source: SingleRef<T>,
    on_error: Arc<dyn Fn(&FlowError) -> Result<()> + Send + Sync>,
}

impl<T: FlowItem> SingleSource<T> for SingleDoOnError<T> {
    fn subscribe(&self, observer: SingleObserverRef<T>) {
        struct Observer<T> {
            downstream: SingleObserverRef<T>,
            on_error: Arc<dyn Fn(&FlowError) -> Result<()> + Send + Sync>,
        }
        impl<T: FlowItem> SingleObserver<T> for Observer<T> {
            fn on_subscribe(&self, cancel: CancelRef) {
                self.downstream.on_subscribe(cancel);
            }

            fn on_success(&self, value: T) {
                self.downstream.on_success(value);
            }

            fn on_error(&self, error: FlowError) {
                let error = match (self.on_error)(&error) {
                    Ok(()) => error,
                    Err(handler_error) => handler_error.compose_with(error),
                };
                self.downstream.on_error(error);
            }
        }
        self.source.subscribe(Arc::new(Observer {
            downstream: observer,
            on_error: Arc::clone(&self.on_error),
        }));
    }
}

struct SingleLift<T, R> {
    source: SingleRef<T>,
    lift: LiftFn<T, R>,
}

impl<T: FlowItem, R: FlowItem> SingleSource<R> for SingleLift<T, R> {
    fn subscribe(&self, observer: SingleObserverRef<R>) {
        match (self.lift)(observer.clone()) {
            Ok(lifted) => self.source.subscribe(lifted),
            Err(error) => {
                observer.on_subscribe(disposed_handle());
                observer.on_error(error);
            }
        }
    }
}

fn disposed_handle() -> CancelRef {
    let handle = FlagCancel::new();
    handle.dispose();
    Arc::new(handle)
}

struct SingleToFlow<T> {
    source: SingleRef<T>,
}

impl<T: FlowItem> Flow<T> for SingleToFlow<T> {
    fn subscribe(&self, subscriber: SubscriberRef<T>) {
        let bridge = Arc::new(SingleBridge {
            downstream: subscriber.clone(),
            state: Mutex::new(BridgeState {
                value: None,
                has_request: false,
                emitted: false,
            }),
            handle: Mutex::new(None),
            cancelled: AtomicBool::new(false),
        });
        subscriber.on_subscribe(bridge.clone());
        self.source.subscribe(bridge);
    }
}

struct BridgeState<T> {
    value: Option<T>,
    has_request: bool,
    emitted: bool,
}

/// Adapts the one-shot observer contract to the demand-gated flow
/// contract: whichever of result and request arrives second emits.
struct SingleBridge<T> {
    downstream: SubscriberRef<T>,
    state: Mutex<BridgeState<T>>,
    handle: Mutex<Option<CancelRef>>,
    cancelled: AtomicBool,
}

impl<T: FlowItem> SingleObserver<T> for SingleBridge<T> {
    fn on_subscribe(&self, cancel: CancelRef) {
        *self.handle.lock() = Some(cancel);
    }

    fn on_success(&self, value: T) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let ready = {
            let mut state = self.state.lock();
            if state.emitted {
                return;
            }
            if state.has_request {
                state.emitted = true;
                true
            } else {
                state.value = Some(value.clone());
                false
            }
        };
        if ready {
            self.downstream.on_next(value);
            self.downstream.on_complete();
        }
    }

    fn on_error(&self, error: FlowError) {
        if !self.cancelled.load(Ordering::Acquire) {
            self.downstream.on_error(error);
        }
    }
}

impl<T: FlowItem> Subscription for SingleBridge<T> {
    fn request(&self, n: u64) {
        if !demand::validate(n) || self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let staged = {
            let mut state = self.state.lock();
            state.has_request = true;
            if state.emitted {
                None
            } else if let Some(value) = state.value.take() {
                state.emitted = true;
                Some(value)
            } else {
                None
            }
        };
        if let Some(value) = staged {
            self.downstream.on_next(value);
            self.downstream.on_complete();
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.state.lock().value = None;
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle.dispose();
        }
    }
}
