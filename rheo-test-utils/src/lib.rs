// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Test plumbing for the rheo crates: recording consumers, a
//! controllable publisher, a virtual-time scheduler and small data
//! factories shared by the operator test suites.

#![allow(clippy::multiple_crate_versions)]

pub mod manual_scheduler;
pub mod test_data;
pub mod test_observer;
pub mod test_publisher;
pub mod test_subscriber;

pub use manual_scheduler::ManualScheduler;
pub use test_observer::{TestCompletableObserver, TestSingleObserver};
pub use test_publisher::TestPublisher;
pub use test_subscriber::TestSubscriber;
