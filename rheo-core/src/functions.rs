// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Shared aliases for the user-supplied function shapes operators accept.
//!
//! All user functions are fallible: returning `Err` cancels the upstream
//! and fails the stream, which is also how "the function produced no
//! value" is expressed in a language without null.

use std::sync::Arc;

use rheo_error::Result;

/// `A -> B`, may fail.
pub type MapFn<T, R> = Arc<dyn Fn(T) -> Result<R> + Send + Sync>;

/// `(A, B) -> C`, may fail.
pub type BiMapFn<A, B, R> = Arc<dyn Fn(A, B) -> Result<R> + Send + Sync>;

/// `A -> bool`, may fail.
pub type PredicateFn<T> = Arc<dyn Fn(&T) -> Result<bool> + Send + Sync>;

/// `(A, B) -> bool`, may fail.
pub type BiPredicateFn<A, B> = Arc<dyn Fn(&A, &B) -> Result<bool> + Send + Sync>;

/// `() -> A`, may fail.
pub type SupplierFn<R> = Arc<dyn Fn() -> Result<R> + Send + Sync>;

/// `() -> bool`, may fail.
pub type BooleanSupplierFn = Arc<dyn Fn() -> Result<bool> + Send + Sync>;

/// `A -> ()`, may fail.
pub type ConsumerFn<T> = Arc<dyn Fn(&T) -> Result<()> + Send + Sync>;

/// N-ary combiner over a snapshot of latest values, may fail.
pub type CombinerFn<T, R> = Arc<dyn Fn(&[T]) -> Result<R> + Send + Sync>;

/// A scheduler task. Periodic scheduling re-invokes the same task, hence
/// `Fn` rather than `FnOnce`.
pub type Task = Arc<dyn Fn() + Send + Sync>;
