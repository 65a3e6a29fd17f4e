// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Demand carry-over for operators that consume a sequence of inner
//! upstreams one after another.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::demand;
use crate::flow::{Subscription, SubscriptionRef};

struct ArbiterState {
    current: Option<SubscriptionRef>,
    /// Demand requested downstream but not yet satisfied by any upstream.
    requested: u64,
}

/// Multiplexes a succession of upstream subscriptions behind one
/// downstream handle, carrying unsatisfied demand from each inner to the
/// next.
///
/// `concat`-style operators hand this to their downstream once and then
/// swap the producing inner underneath it. When an inner is replaced, the
/// newcomer immediately receives the outstanding demand.
///
/// The state lock is never held across a call into a subscription: a
/// synchronous upstream may re-enter `produced` from inside `request`.
pub struct SubscriptionArbiter {
    state: Mutex<ArbiterState>,
    cancelled: AtomicBool,
}

impl SubscriptionArbiter {
    /// Create an arbiter with no upstream and zero demand.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ArbiterState {
                current: None,
                requested: 0,
            }),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Install the next producing upstream; it immediately receives all
    /// outstanding demand. A subscription installed after cancellation is
    /// cancelled on arrival.
    pub fn set_subscription(&self, subscription: SubscriptionRef) {
        if self.cancelled.load(Ordering::Acquire) {
            subscription.cancel();
            return;
        }
        let outstanding = {
            let mut state = self.state.lock();
            state.current = Some(subscription.clone());
            state.requested
        };
        if self.cancelled.load(Ordering::Acquire) {
            subscription.cancel();
            return;
        }
        if outstanding > 0 {
            subscription.request(outstanding);
        }
    }

    /// Account `n` items emitted downstream by the current upstream.
    pub fn produced(&self, n: u64) {
        let mut state = self.state.lock();
        if state.requested != demand::UNBOUNDED {
            state.requested = state.requested.saturating_sub(n);
        }
    }

    /// Whether the arbiter has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for SubscriptionArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription for SubscriptionArbiter {
    fn request(&self, n: u64) {
        if !demand::validate(n) || self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let target = {
            let mut state = self.state.lock();
            state.requested = if n == demand::UNBOUNDED {
                demand::UNBOUNDED
            } else if state.requested == demand::UNBOUNDED {
                demand::UNBOUNDED
            } else {
                state.requested.saturating_add(n)
            };
            state.current.clone()
        };
        if let Some(target) = target {
            target.request(n);
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let current = self.state.lock().current.take();
        if let Some(current) = current {
            current.cancel();
        }
    }
}
