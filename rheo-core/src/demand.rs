// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Demand arithmetic for backpressured streams.
//!
//! Pending demand is a `u64` counter. Additions saturate at
//! [`UNBOUNDED`]; once a counter reaches the sentinel, accounting is
//! disabled and it never moves again.

use std::sync::atomic::{AtomicU64, Ordering};

use rheo_error::FlowError;

use crate::hooks;

/// Sentinel request amount that disables demand accounting.
pub const UNBOUNDED: u64 = u64::MAX;

/// Add `n` to a demand counter, saturating at [`UNBOUNDED`]. Returns the
/// value before the addition.
pub fn add(requested: &AtomicU64, n: u64) -> u64 {
    loop {
        let current = requested.load(Ordering::Acquire);
        if current == UNBOUNDED {
            return UNBOUNDED;
        }
        let next = current.saturating_add(n);
        if requested
            .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return current;
        }
    }
}

/// Subtract `n` emitted items from a demand counter. A counter pinned at
/// [`UNBOUNDED`] is left untouched. Draining below zero is a bookkeeping
/// bug and is reported to the error hook.
pub fn produced(requested: &AtomicU64, n: u64) -> u64 {
    loop {
        let current = requested.load(Ordering::Acquire);
        if current == UNBOUNDED {
            return UNBOUNDED;
        }
        let next = match current.checked_sub(n) {
            Some(next) => next,
            None => {
                hooks::on_error(FlowError::invalid_state(format!(
                    "more items produced ({n}) than requested ({current})"
                )));
                0
            }
        };
        if requested
            .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return next;
        }
    }
}

/// Validate a request amount per the protocol: zero is a violation that is
/// reported to the error hook. Returns `true` when the request may be
/// honored.
pub fn validate(n: u64) -> bool {
    if n == 0 {
        hooks::on_error(FlowError::invalid_state("request amount must be positive"));
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_saturates_at_unbounded() {
        let counter = AtomicU64::new(UNBOUNDED - 1);
        add(&counter, 10);
        assert_eq!(counter.load(Ordering::Acquire), UNBOUNDED);
        add(&counter, 1);
        assert_eq!(counter.load(Ordering::Acquire), UNBOUNDED);
    }

    #[test]
    fn produced_ignores_unbounded() {
        let counter = AtomicU64::new(UNBOUNDED);
        produced(&counter, 5);
        assert_eq!(counter.load(Ordering::Acquire), UNBOUNDED);
    }

    #[test]
    fn add_then_produce_round_trips() {
        let counter = AtomicU64::new(0);
        add(&counter, 3);
        assert_eq!(produced(&counter, 2), 1);
        assert_eq!(produced(&counter, 1), 0);
    }
}
