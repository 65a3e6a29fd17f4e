// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Scheduler abstraction for the time-driven rheo operators.
//!
//! A [`Scheduler`] hands out [`Worker`]s; a worker owns a timeline on
//! which tasks run after a delay or periodically. Emission never suspends
//! anywhere in rheo — async appears only here, where the Tokio timer backs
//! the worker's delays.

#![allow(clippy::multiple_crate_versions)]

mod periodic;
mod scheduler;
mod tokio_scheduler;

pub use scheduler::{schedule_periodically, Scheduler, SchedulerRef, Worker, WorkerRef};
pub use tokio_scheduler::TokioScheduler;
