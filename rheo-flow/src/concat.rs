// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Sequential concatenation of flows.
//!
//! `concat` is the identity specialization of [`concat_map`] over a flow
//! of flows: every item of inner `j` precedes every item of inner `j+1`,
//! and an inner is not subscribed before its predecessor terminated.
//!
//! [`concat_map`]: crate::concat_map

use std::sync::Arc;

use rheo_core::{FlowItem, FlowRef};

use crate::concat_map::{ConcatMapFlow, DEFAULT_PREFETCH};
use crate::sources::from_iter;

/// Concatenate a stream of flows.
pub fn concat<T: FlowItem>(sources: FlowRef<FlowRef<T>>) -> FlowRef<T> {
    Arc::new(ConcatMapFlow::new(
        sources,
        Arc::new(|inner: FlowRef<T>| Ok(inner)),
        DEFAULT_PREFETCH,
    ))
}

/// Concatenate a fixed list of flows.
pub fn concat_all<T: FlowItem>(sources: Vec<FlowRef<T>>) -> FlowRef<T> {
    concat(from_iter(sources))
}

/// Concatenate two flows.
pub fn concat_pair<T: FlowItem>(first: FlowRef<T>, second: FlowRef<T>) -> FlowRef<T> {
    concat_all(vec![first, second])
}
