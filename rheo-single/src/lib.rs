// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Single-valued and no-value stream variants.
//!
//! A [`SingleSource`] terminates with exactly one success value or an
//! error; a [`CompletableSource`] terminates with completion or an error.
//! Both hand their observer a plain cancellation handle instead of a
//! demand-carrying subscription — a one-shot result has nothing to
//! backpressure.

#![allow(clippy::multiple_crate_versions)]

pub mod completable;
pub mod single;

pub use completable::{
    complete, completable_error, concat_completable, from_task, merge_delay_error,
    CompletableObserver, CompletableObserverRef, CompletableRef, CompletableSource,
};
pub use single::{
    single_error, single_just, SingleExt, SingleObserver, SingleObserverRef, SingleRef,
    SingleSource,
};
