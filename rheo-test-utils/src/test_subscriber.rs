// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The recording stream consumer used across the operator test suites.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rheo_core::{FlowError, FlowItem, Subscriber, Subscription, SubscriptionRef};

#[derive(Default)]
struct Recorded<T> {
    items: Vec<T>,
    errors: Vec<FlowError>,
    completions: usize,
    subscriptions: usize,
}

/// A subscriber that records everything it receives and exposes
/// assertion helpers in the arrange/act/assert style of the suites.
///
/// The configured initial request is issued inside `on_subscribe`;
/// further demand is granted through [`request`](TestSubscriber::request).
pub struct TestSubscriber<T> {
    recorded: Mutex<Recorded<T>>,
    subscription: Mutex<Option<SubscriptionRef>>,
    initial_request: u64,
}

impl<T: FlowItem> TestSubscriber<T> {
    /// A subscriber with unbounded initial demand.
    pub fn new() -> Arc<Self> {
        Self::with_request(u64::MAX)
    }

    /// A subscriber that requests `initial_request` on subscription.
    /// Zero means no initial demand at all.
    pub fn with_request(initial_request: u64) -> Arc<Self> {
        Arc::new(Self {
            recorded: Mutex::new(Recorded {
                items: Vec::new(),
                errors: Vec::new(),
                completions: 0,
                subscriptions: 0,
            }),
            subscription: Mutex::new(None),
            initial_request,
        })
    }

    /// Grant `n` more demand.
    pub fn request(&self, n: u64) {
        let subscription = self.subscription.lock().clone();
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    /// Cancel the subscription.
    pub fn cancel(&self) {
        let subscription = self.subscription.lock().clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }

    /// Everything received so far.
    pub fn items(&self) -> Vec<T> {
        self.recorded.lock().items.clone()
    }

    /// Number of recorded items.
    pub fn item_count(&self) -> usize {
        self.recorded.lock().items.len()
    }

    /// The recorded errors.
    pub fn errors(&self) -> Vec<FlowError> {
        self.recorded.lock().errors.clone()
    }

    /// Number of completions received.
    pub fn completions(&self) -> usize {
        self.recorded.lock().completions
    }

    /// Errors plus completions.
    pub fn terminal_count(&self) -> usize {
        let recorded = self.recorded.lock();
        recorded.errors.len() + recorded.completions
    }

    /// How many times `on_subscribe` was delivered.
    pub fn subscription_count(&self) -> usize {
        self.recorded.lock().subscriptions
    }

    /// Spin until at least `count` items arrived or `timeout` elapsed.
    /// Returns whether the count was reached.
    pub fn await_count(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.item_count() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.item_count() >= count
    }

    /// Spin until a terminal arrived or `timeout` elapsed. Returns
    /// whether a terminal was seen.
    pub fn await_terminal(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.terminal_count() > 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        self.terminal_count() > 0
    }

    /// Assert exactly these items were received, in order.
    ///
    /// # Panics
    ///
    /// Panics when the recorded items differ.
    pub fn assert_items(&self, expected: &[T])
    where
        T: PartialEq + std::fmt::Debug,
    {
        assert_eq!(self.items(), expected);
    }

    /// Assert the stream completed exactly once and never errored.
    ///
    /// # Panics
    ///
    /// Panics on a missing or duplicated terminal, or any error.
    pub fn assert_completed(&self) {
        let recorded = self.recorded.lock();
        assert!(
            recorded.errors.is_empty(),
            "expected completion, got errors: {:?}",
            recorded.errors
        );
        assert_eq!(recorded.completions, 1, "expected exactly one completion");
    }

    /// Assert the stream failed exactly once with an error matching the
    /// predicate.
    ///
    /// # Panics
    ///
    /// Panics when no error, several terminals, or a non-matching error
    /// was recorded.
    pub fn assert_error_matches(&self, predicate: impl Fn(&FlowError) -> bool) {
        let recorded = self.recorded.lock();
        assert_eq!(recorded.completions, 0, "errored stream must not complete");
        assert_eq!(
            recorded.errors.len(),
            1,
            "expected exactly one error, got {:?}",
            recorded.errors
        );
        assert!(
            predicate(&recorded.errors[0]),
            "error did not match: {:?}",
            recorded.errors[0]
        );
    }

    /// Assert no terminal of any kind arrived yet.
    ///
    /// # Panics
    ///
    /// Panics when a terminal was recorded.
    pub fn assert_no_terminal(&self) {
        assert_eq!(self.terminal_count(), 0, "unexpected terminal");
    }
}

impl<T: FlowItem> Subscriber<T> for TestSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        self.recorded.lock().subscriptions += 1;
        *self.subscription.lock() = Some(subscription.clone());
        if self.initial_request > 0 {
            subscription.request(self.initial_request);
        }
    }

    fn on_next(&self, item: T) {
        self.recorded.lock().items.push(item);
    }

    fn on_error(&self, error: FlowError) {
        self.recorded.lock().errors.push(error);
    }

    fn on_complete(&self) {
        self.recorded.lock().completions += 1;
    }
}
