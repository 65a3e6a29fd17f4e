// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Cancellation handles for scheduled work.
//!
//! Stream subscriptions carry their own `cancel`; these types cover the
//! other cancellable resources — timer tasks and workers — and the serial
//! slot that replaces one timer with the next.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A cancellable resource.
pub trait Cancel: Send + Sync {
    /// Release the resource. Idempotent.
    fn dispose(&self);

    /// Whether the resource has been released.
    fn is_disposed(&self) -> bool;
}

/// Shared handle to a [`Cancel`].
pub type CancelRef = Arc<dyn Cancel>;

/// A plain flag with no resource behind it.
#[derive(Default)]
pub struct FlagCancel {
    disposed: AtomicBool,
}

impl FlagCancel {
    /// Create an undisposed flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cancel for FlagCancel {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// A single slot whose occupant is disposed when replaced or when the slot
/// itself is disposed.
///
/// Timeout operators install one timer per item through a slot like this;
/// the previous timer is disposed on replacement, and a resource arriving
/// after the slot was disposed is disposed immediately.
#[derive(Default)]
pub struct SerialCancel {
    state: Mutex<SerialState>,
}

#[derive(Default)]
struct SerialState {
    current: Option<CancelRef>,
    disposed: bool,
}

impl SerialCancel {
    /// Create an empty, undisposed slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `next`, disposing the previous occupant. Returns `false`
    /// (and disposes `next`) when the slot was already disposed.
    pub fn set(&self, next: CancelRef) -> bool {
        let previous = {
            let mut state = self.state.lock();
            if state.disposed {
                None
            } else {
                state.current.replace(next.clone())
            }
        };
        // calls happen outside the lock: dispose may re-enter
        if self.state.lock().disposed {
            next.dispose();
            return false;
        }
        if let Some(previous) = previous {
            previous.dispose();
        }
        true
    }

    /// Install `next` without disposing the previous occupant. Returns
    /// `false` (and disposes `next`) when the slot was already disposed.
    pub fn replace(&self, next: CancelRef) -> bool {
        {
            let mut state = self.state.lock();
            if !state.disposed {
                state.current = Some(next);
                return true;
            }
        }
        next.dispose();
        false
    }
}

impl Cancel for SerialCancel {
    fn dispose(&self) {
        let current = {
            let mut state = self.state.lock();
            state.disposed = true;
            state.current.take()
        };
        if let Some(current) = current {
            current.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

/// A grow-only set of cancellables disposed together.
///
/// Fan-out operators park every inner's handle here; disposing the set
/// disposes all of them, and a handle added after disposal is disposed on
/// arrival.
#[derive(Default)]
pub struct CancelSet {
    state: Mutex<CancelSetState>,
}

#[derive(Default)]
struct CancelSetState {
    items: Vec<CancelRef>,
    disposed: bool,
}

impl CancelSet {
    /// Create an empty, undisposed set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle. Returns `false` (and disposes the handle) when the
    /// set was already disposed.
    pub fn add(&self, cancel: CancelRef) -> bool {
        {
            let mut state = self.state.lock();
            if !state.disposed {
                state.items.push(cancel);
                return true;
            }
        }
        cancel.dispose();
        false
    }
}

impl Cancel for CancelSet {
    fn dispose(&self) {
        let items = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.items)
        };
        for item in items {
            item.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_disposes_previous_occupant() {
        let slot = SerialCancel::new();
        let first: CancelRef = Arc::new(FlagCancel::new());
        let second: CancelRef = Arc::new(FlagCancel::new());

        assert!(slot.set(first.clone()));
        assert!(slot.set(second.clone()));

        assert!(first.is_disposed());
        assert!(!second.is_disposed());
    }

    #[test]
    fn set_after_dispose_disposes_incoming() {
        let slot = SerialCancel::new();
        slot.dispose();

        let late: CancelRef = Arc::new(FlagCancel::new());
        assert!(!slot.set(late.clone()));
        assert!(late.is_disposed());
    }

    #[test]
    fn dispose_is_idempotent() {
        let slot = SerialCancel::new();
        let occupant: CancelRef = Arc::new(FlagCancel::new());
        slot.set(occupant.clone());

        slot.dispose();
        slot.dispose();

        assert!(occupant.is_disposed());
        assert!(slot.is_disposed());
    }
}
