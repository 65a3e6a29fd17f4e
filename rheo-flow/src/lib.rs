// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The rheo stream operators.
//!
//! Each operator is a closed state machine: a recipe struct implementing
//! [`Flow`] that, on subscribe, instantiates per-subscription subscriber
//! state and wires it between its upstream(s) and the downstream consumer.
//! Composition happens through [`FlowExt`] on any `FlowRef<T>` and the
//! free source constructors in [`sources`].

#![allow(clippy::multiple_crate_versions)]

pub mod combine_latest;
pub mod concat;
pub mod concat_map;
pub mod debounce_selector;
pub mod filter;
pub mod map;
pub mod repeat_until;
pub mod retry_bi_predicate;
pub mod sample_timed;
pub mod scan_seed;
pub mod single;
pub mod sources;
pub mod switch_map;
pub mod take;
pub mod take_until;
pub mod take_until_predicate;
pub mod timeout_selector;
pub mod timeout_timed;
pub mod to_list;
pub mod to_map;
pub mod window_boundary;
pub mod with_latest_from;

mod deferred;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use rheo_core::{FlowItem, FlowRef, Result};
use rheo_scheduler::SchedulerRef;

pub use sources::{empty, error_flow, from_iter, just, never, range};

/// Default per-source prefetch / buffer size, a power of two.
pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Operator composition on any shared flow.
///
/// Every method returns a new recipe; nothing runs until `subscribe`.
pub trait FlowExt<T: FlowItem> {
    /// Transform each item through a fallible mapper.
    fn map<R, F>(&self, mapper: F) -> FlowRef<R>
    where
        R: FlowItem,
        F: Fn(T) -> Result<R> + Send + Sync + 'static;

    /// Keep only items the predicate accepts.
    fn filter<F>(&self, predicate: F) -> FlowRef<T>
    where
        F: Fn(&T) -> Result<bool> + Send + Sync + 'static;

    /// Pass at most `count` items through, then complete and cancel.
    fn take(&self, count: u64) -> FlowRef<T>;

    /// Emit items until one *after which* the predicate returns true;
    /// that item is still delivered, then the stream completes.
    fn take_until_predicate<F>(&self, predicate: F) -> FlowRef<T>
    where
        F: Fn(&T) -> Result<bool> + Send + Sync + 'static;

    /// Expect exactly one item (or none with a default). More than one
    /// fails; none without a default fails.
    fn single(&self, default: Option<T>) -> FlowRef<T>;

    /// Resubscribe on completion until the supplier says stop.
    fn repeat_until<F>(&self, until: F) -> FlowRef<T>
    where
        F: Fn() -> Result<bool> + Send + Sync + 'static;

    /// Resubscribe on error while the predicate over (retry count, error)
    /// holds.
    fn retry_bi_predicate<F>(&self, predicate: F) -> FlowRef<T>
    where
        F: Fn(&u64, &rheo_error::FlowError) -> Result<bool> + Send + Sync + 'static;

    /// Collect every item into a single `Vec` emitted at completion.
    fn to_list(&self) -> FlowRef<Vec<T>>;

    /// Collect items into a map keyed by the selector; later keys win.
    fn to_map<K, F>(&self, key_selector: F) -> FlowRef<HashMap<K, T>>
    where
        K: FlowItem + Eq + Hash,
        F: Fn(&T) -> Result<K> + Send + Sync + 'static;

    /// Emit the seed, then one accumulation per upstream item.
    fn scan_seed<R, S, F>(&self, seed: S, accumulator: F) -> FlowRef<R>
    where
        R: FlowItem,
        S: Fn() -> Result<R> + Send + Sync + 'static,
        F: Fn(R, T) -> Result<R> + Send + Sync + 'static;

    /// Emit the most recent item on a periodic gate.
    fn sample_timed(&self, period: Duration, scheduler: SchedulerRef) -> FlowRef<T>;

    /// Combine each primary item with the latest value of `other`.
    fn with_latest_from<U, R, F>(&self, other: FlowRef<U>, combiner: F) -> FlowRef<R>
    where
        U: FlowItem,
        R: FlowItem,
        F: Fn(T, U) -> Result<R> + Send + Sync + 'static;

    /// Map each item to an inner flow, mirroring only the newest inner.
    fn switch_map<R, F>(&self, mapper: F) -> FlowRef<R>
    where
        R: FlowItem,
        F: Fn(T) -> Result<FlowRef<R>> + Send + Sync + 'static;

    /// Map each item to an inner flow, draining inners strictly in order.
    fn concat_map<R, F>(&self, mapper: F) -> FlowRef<R>
    where
        R: FlowItem,
        F: Fn(T) -> Result<FlowRef<R>> + Send + Sync + 'static;

    /// Fail (or switch to `fallback`) when the gap between items exceeds
    /// `timeout`.
    fn timeout_timed(
        &self,
        timeout: Duration,
        scheduler: SchedulerRef,
        fallback: Option<FlowRef<T>>,
    ) -> FlowRef<T>;

    /// Mirror the source until `other` emits or terminates, then complete.
    fn take_until<U: FlowItem>(&self, other: FlowRef<U>) -> FlowRef<T>;

    /// Emit an item only once its per-item inner flow signals before the
    /// next item arrives.
    fn debounce_selector<U, F>(&self, selector: F) -> FlowRef<T>
    where
        U: FlowItem,
        F: Fn(&T) -> Result<FlowRef<U>> + Send + Sync + 'static;

    /// Split the stream into consecutive windows delimited by `boundary`
    /// emissions.
    fn window_boundary<B: FlowItem>(&self, boundary: FlowRef<B>) -> FlowRef<FlowRef<T>>;
}

impl<T: FlowItem> FlowExt<T> for FlowRef<T> {
    fn map<R, F>(&self, mapper: F) -> FlowRef<R>
    where
        R: FlowItem,
        F: Fn(T) -> Result<R> + Send + Sync + 'static,
    {
        Arc::new(map::MapFlow::new(self.clone(), Arc::new(mapper)))
    }

    fn filter<F>(&self, predicate: F) -> FlowRef<T>
    where
        F: Fn(&T) -> Result<bool> + Send + Sync + 'static,
    {
        Arc::new(filter::FilterFlow::new(self.clone(), Arc::new(predicate)))
    }

    fn take(&self, count: u64) -> FlowRef<T> {
        Arc::new(take::TakeFlow::new(self.clone(), count))
    }

    fn take_until_predicate<F>(&self, predicate: F) -> FlowRef<T>
    where
        F: Fn(&T) -> Result<bool> + Send + Sync + 'static,
    {
        Arc::new(take_until_predicate::TakeUntilPredicateFlow::new(
            self.clone(),
            Arc::new(predicate),
        ))
    }

    fn single(&self, default: Option<T>) -> FlowRef<T> {
        Arc::new(single::SingleFlow::new(self.clone(), default))
    }

    fn repeat_until<F>(&self, until: F) -> FlowRef<T>
    where
        F: Fn() -> Result<bool> + Send + Sync + 'static,
    {
        Arc::new(repeat_until::RepeatUntilFlow::new(
            self.clone(),
            Arc::new(until),
        ))
    }

    fn retry_bi_predicate<F>(&self, predicate: F) -> FlowRef<T>
    where
        F: Fn(&u64, &rheo_error::FlowError) -> Result<bool> + Send + Sync + 'static,
    {
        Arc::new(retry_bi_predicate::RetryBiPredicateFlow::new(
            self.clone(),
            Arc::new(predicate),
        ))
    }

    fn to_list(&self) -> FlowRef<Vec<T>> {
        Arc::new(to_list::ToListFlow::new(self.clone()))
    }

    fn to_map<K, F>(&self, key_selector: F) -> FlowRef<HashMap<K, T>>
    where
        K: FlowItem + Eq + Hash,
        F: Fn(&T) -> Result<K> + Send + Sync + 'static,
    {
        Arc::new(to_map::ToMapFlow::new(self.clone(), Arc::new(key_selector)))
    }

    fn scan_seed<R, S, F>(&self, seed: S, accumulator: F) -> FlowRef<R>
    where
        R: FlowItem,
        S: Fn() -> Result<R> + Send + Sync + 'static,
        F: Fn(R, T) -> Result<R> + Send + Sync + 'static,
    {
        Arc::new(scan_seed::ScanSeedFlow::new(
            self.clone(),
            Arc::new(seed),
            Arc::new(accumulator),
        ))
    }

    fn sample_timed(&self, period: Duration, scheduler: SchedulerRef) -> FlowRef<T> {
        Arc::new(sample_timed::SampleTimedFlow::new(
            self.clone(),
            period,
            scheduler,
        ))
    }

    fn with_latest_from<U, R, F>(&self, other: FlowRef<U>, combiner: F) -> FlowRef<R>
    where
        U: FlowItem,
        R: FlowItem,
        F: Fn(T, U) -> Result<R> + Send + Sync + 'static,
    {
        Arc::new(with_latest_from::WithLatestFromFlow::new(
            self.clone(),
            other,
            Arc::new(combiner),
        ))
    }

    fn switch_map<R, F>(&self, mapper: F) -> FlowRef<R>
    where
        R: FlowItem,
        F: Fn(T) -> Result<FlowRef<R>> + Send + Sync + 'static,
    {
        Arc::new(switch_map::SwitchMapFlow::new(
            self.clone(),
            Arc::new(mapper),
            DEFAULT_BUFFER_SIZE,
        ))
    }

    fn concat_map<R, F>(&self, mapper: F) -> FlowRef<R>
    where
        R: FlowItem,
        F: Fn(T) -> Result<FlowRef<R>> + Send + Sync + 'static,
    {
        Arc::new(concat_map::ConcatMapFlow::new(
            self.clone(),
            Arc::new(mapper),
            concat_map::DEFAULT_PREFETCH,
        ))
    }

    fn timeout_timed(
        &self,
        timeout: Duration,
        scheduler: SchedulerRef,
        fallback: Option<FlowRef<T>>,
    ) -> FlowRef<T> {
        Arc::new(timeout_timed::TimeoutTimedFlow::new(
            self.clone(),
            timeout,
            scheduler,
            fallback,
        ))
    }

    fn take_until<U: FlowItem>(&self, other: FlowRef<U>) -> FlowRef<T> {
        Arc::new(take_until::TakeUntilFlow::new(self.clone(), other))
    }

    fn debounce_selector<U, F>(&self, selector: F) -> FlowRef<T>
    where
        U: FlowItem,
        F: Fn(&T) -> Result<FlowRef<U>> + Send + Sync + 'static,
    {
        Arc::new(debounce_selector::DebounceSelectorFlow::new(
            self.clone(),
            Arc::new(selector),
        ))
    }

    fn window_boundary<B: FlowItem>(&self, boundary: FlowRef<B>) -> FlowRef<FlowRef<T>> {
        Arc::new(window_boundary::WindowBoundaryFlow::new(
            self.clone(),
            boundary,
        ))
    }
}
