// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Single-result emission gated on demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rheo_core::{demand, FlowItem, Subscriber, SubscriberRef, Subscription, SubscriptionCell};

struct DeferredState<T> {
    value: Option<T>,
    has_request: bool,
    emitted: bool,
}

/// The subscription handed downstream by operators that produce exactly
/// one value at completion time (`single`, `to_list`, `to_map`).
///
/// The value may become ready before or after the downstream requests;
/// whichever side arrives second performs the emission. Cancelling also
/// cancels the operator's upstream.
pub(crate) struct DeferredScalar<T> {
    downstream: SubscriberRef<T>,
    upstream: Arc<SubscriptionCell>,
    state: Mutex<DeferredState<T>>,
    cancelled: AtomicBool,
}

impl<T: FlowItem> DeferredScalar<T> {
    pub(crate) fn new(downstream: SubscriberRef<T>, upstream: Arc<SubscriptionCell>) -> Self {
        Self {
            downstream,
            upstream,
            state: Mutex::new(DeferredState {
                value: None,
                has_request: false,
                emitted: false,
            }),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Stage the result; emits immediately when demand already arrived.
    pub(crate) fn complete_with(&self, value: T) {
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

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl<T: FlowItem> Subscription for DeferredScalar<T> {
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
        self.upstream.cancel();
    }
}
