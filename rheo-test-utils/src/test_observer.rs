// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Recording observers for the single-valued and no-value variants.

use std::sync::Arc;

use parking_lot::Mutex;
use rheo_core::{Cancel, CancelRef, FlowError, FlowItem};
use rheo_single::{CompletableObserver, SingleObserver};

#[derive(Default)]
struct SingleRecorded<T> {
    values: Vec<T>,
    errors: Vec<FlowError>,
    subscriptions: usize,
}

/// A [`SingleObserver`] that records its signals.
pub struct TestSingleObserver<T> {
    recorded: Mutex<SingleRecorded<T>>,
    handle: Mutex<Option<CancelRef>>,
}

impl<T: FlowItem> TestSingleObserver<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            recorded: Mutex::new(SingleRecorded {
                values: Vec::new(),
                errors: Vec::new(),
                subscriptions: 0,
            }),
            handle: Mutex::new(None),
        })
    }

    pub fn values(&self) -> Vec<T> {
        self.recorded.lock().values.clone()
    }

    pub fn errors(&self) -> Vec<FlowError> {
        self.recorded.lock().errors.clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.recorded.lock().subscriptions
    }

    /// Dispose the received handle.
    pub fn dispose(&self) {
        let handle = self.handle.lock().clone();
        if let Some(handle) = handle {
            handle.dispose();
        }
    }

    /// Assert exactly one success with this value and no error.
    ///
    /// # Panics
    ///
    /// Panics when the recorded outcome differs.
    pub fn assert_value(&self, expected: &T)
    where
        T: PartialEq + std::fmt::Debug,
    {
        let recorded = self.recorded.lock();
        assert!(
            recorded.errors.is_empty(),
            "expected a value, got errors: {:?}",
            recorded.errors
        );
        assert_eq!(recorded.values.len(), 1, "expected exactly one value");
        assert_eq!(&recorded.values[0], expected);
    }

    /// Assert exactly one error matching the predicate and no value.
    ///
    /// # Panics
    ///
    /// Panics when the recorded outcome differs.
    pub fn assert_error_matches(&self, predicate: impl Fn(&FlowError) -> bool) {
        let recorded = self.recorded.lock();
        assert!(recorded.values.is_empty(), "failed single must not succeed");
        assert_eq!(recorded.errors.len(), 1, "expected exactly one error");
        assert!(
            predicate(&recorded.errors[0]),
            "error did not match: {:?}",
            recorded.errors[0]
        );
    }
}

impl<T: FlowItem> SingleObserver<T> for TestSingleObserver<T> {
    fn on_subscribe(&self, cancel: CancelRef) {
        self.recorded.lock().subscriptions += 1;
        *self.handle.lock() = Some(cancel);
    }

    fn on_success(&self, value: T) {
        self.recorded.lock().values.push(value);
    }

    fn on_error(&self, error: FlowError) {
        self.recorded.lock().errors.push(error);
    }
}

#[derive(Default)]
struct CompletableRecorded {
    completions: usize,
    errors: Vec<FlowError>,
    subscriptions: usize,
}

/// A [`CompletableObserver`] that records its signals.
pub struct TestCompletableObserver {
    recorded: Mutex<CompletableRecorded>,
    handle: Mutex<Option<CancelRef>>,
}

impl TestCompletableObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            recorded: Mutex::new(CompletableRecorded::default()),
            handle: Mutex::new(None),
        })
    }

    pub fn completions(&self) -> usize {
        self.recorded.lock().completions
    }

    pub fn errors(&self) -> Vec<FlowError> {
        self.recorded.lock().errors.clone()
    }

    /// Dispose the received handle.
    pub fn dispose(&self) {
        let handle = self.handle.lock().clone();
        if let Some(handle) = handle {
            handle.dispose();
        }
    }

    /// Assert exactly one completion and no error.
    ///
    /// # Panics
    ///
    /// Panics when the recorded outcome differs.
    pub fn assert_completed(&self) {
        let recorded = self.recorded.lock();
        assert!(
            recorded.errors.is_empty(),
            "expected completion, got errors: {:?}",
            recorded.errors
        );
        assert_eq!(recorded.completions, 1, "expected exactly one completion");
    }

    /// Assert exactly one error matching the predicate.
    ///
    /// # Panics
    ///
    /// Panics when the recorded outcome differs.
    pub fn assert_error_matches(&self, predicate: impl Fn(&FlowError) -> bool) {
        let recorded = self.recorded.lock();
        assert_eq!(recorded.completions, 0, "failed completable must not complete");
        assert_eq!(recorded.errors.len(), 1, "expected exactly one error");
        assert!(
            predicate(&recorded.errors[0]),
            "error did not match: {:?}",
            recorded.errors[0]
        );
    }
}

impl CompletableObserver for TestCompletableObserver {
    fn on_subscribe(&self, cancel: CancelRef) {
        self.recorded.lock().subscriptions += 1;
        *self.handle.lock() = Some(cancel);
    }

    fn on_complete(&self) {
        self.recorded.lock().completions += 1;
    }

    fn on_error(&self, error: FlowError) {
        self.recorded.lock().errors.push(error);
    }
}
