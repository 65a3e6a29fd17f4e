// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Subscription slots: the set-once deferred cell and the two-slot
//! composite.

use std::sync::Arc;

use parking_lot::Mutex;
use rheo_error::FlowError;

use crate::demand;
use crate::flow::{Subscription, SubscriptionRef};
use crate::hooks;

enum CellState {
    /// No upstream yet; demand issued early is parked here.
    Empty { missed: u64 },
    Active(SubscriptionRef),
    Cancelled,
}

/// A set-once subscription holder with deferred demand and a cancelled
/// sentinel.
///
/// Downstream may start requesting before the upstream handle arrives;
/// the missed amount is flushed to the upstream on `set_once`. A second
/// `set_once` is a protocol violation: the incoming subscription is
/// cancelled and the violation reported. `cancel` wins every race — a
/// subscription installed afterwards is cancelled on arrival.
pub struct SubscriptionCell {
    state: Mutex<CellState>,
}

impl SubscriptionCell {
    /// Create an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CellState::Empty { missed: 0 }),
        }
    }

    /// Install the upstream subscription. Returns `true` when this call
    /// installed it; parked demand is flushed before returning.
    pub fn set_once(&self, subscription: SubscriptionRef) -> bool {
        let missed = {
            let mut state = self.state.lock();
            match &*state {
                CellState::Empty { missed } => {
                    let missed = *missed;
                    *state = CellState::Active(subscription.clone());
                    missed
                }
                CellState::Active(_) => {
                    drop(state);
                    subscription.cancel();
                    hooks::on_error(FlowError::invalid_state("subscription already set"));
                    return false;
                }
                CellState::Cancelled => {
                    drop(state);
                    subscription.cancel();
                    return false;
                }
            }
        };
        if missed > 0 {
            subscription.request(missed);
        }
        true
    }

    /// Whether the cell has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.state.lock(), CellState::Cancelled)
    }

    /// The installed subscription, if any.
    #[must_use]
    pub fn current(&self) -> Option<SubscriptionRef> {
        match &*self.state.lock() {
            CellState::Active(subscription) => Some(subscription.clone()),
            _ => None,
        }
    }

    /// Cancel the cell only if no subscription has arrived yet. Returns
    /// `true` when the cell was still empty — the caller then knows the
    /// upstream has never been installed and must signal the terminal
    /// itself.
    pub fn cancel_if_empty(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(&*state, CellState::Empty { .. }) {
            *state = CellState::Cancelled;
            true
        } else {
            false
        }
    }
}

impl Default for SubscriptionCell {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription for SubscriptionCell {
    fn request(&self, n: u64) {
        if !demand::validate(n) {
            return;
        }
        let target = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Empty { missed } => {
                    *missed = if *missed == demand::UNBOUNDED {
                        demand::UNBOUNDED
                    } else {
                        missed.saturating_add(n)
                    };
                    None
                }
                CellState::Active(subscription) => Some(subscription.clone()),
                CellState::Cancelled => None,
            }
        };
        if let Some(target) = target {
            target.request(n);
        }
    }

    fn cancel(&self) {
        let previous = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, CellState::Cancelled) {
                CellState::Active(subscription) => Some(subscription),
                _ => None,
            }
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

/// A shared two-slot cancellation handle.
///
/// Two-source operators park both upstream subscriptions here; whichever
/// side terminates first disposes the pair, and a subscription arriving
/// after disposal is cancelled on the spot.
pub struct PairSubscription {
    slots: [Mutex<Option<SubscriptionRef>>; 2],
    disposed: Mutex<bool>,
}

impl PairSubscription {
    /// Create an empty, undisposed pair.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [Mutex::new(None), Mutex::new(None)],
            disposed: Mutex::new(false),
        }
    }

    /// Park `subscription` in `slot`. Returns `false` (cancelling the
    /// incoming subscription) when the pair was already disposed.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not 0 or 1.
    pub fn set(&self, slot: usize, subscription: SubscriptionRef) -> bool {
        assert!(slot < 2, "pair subscription has exactly two slots");
        {
            let disposed = self.disposed.lock();
            if !*disposed {
                // the slot lock nests inside the disposed lock so dispose
                // cannot miss a concurrently parked subscription
                *self.slots[slot].lock() = Some(subscription);
                return true;
            }
        }
        subscription.cancel();
        false
    }

    /// Cancel both parked subscriptions. Idempotent.
    pub fn dispose(&self) {
        let taken = {
            let mut disposed = self.disposed.lock();
            if *disposed {
                return;
            }
            *disposed = true;
            [self.slots[0].lock().take(), self.slots[1].lock().take()]
        };
        for subscription in taken.into_iter().flatten() {
            subscription.cancel();
        }
    }

    /// Whether the pair has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        *self.disposed.lock()
    }
}

impl Default for PairSubscription {
    fn default() -> Self {
        Self::new()
    }
}
