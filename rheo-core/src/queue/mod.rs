// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Internal queue shapes.
//!
//! Two shapes cover every operator: a bounded power-of-two ring for the
//! single-producer/single-consumer fast path, and an unbounded linked
//! queue for the multi-producer case (window boundaries, arbiter events,
//! error aggregation). Both expose the same minimal surface:
//! `offer` / `poll` / `is_empty` / `clear`.

mod mpsc_linked;
mod spsc_ring;

pub use mpsc_linked::MpscLinked;
pub use spsc_ring::SpscRing;
