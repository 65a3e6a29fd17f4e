// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! rheo — a push-based reactive dataflow runtime.
//!
//! A [`Flow`] is a reusable recipe: subscribing wires fresh operator
//! state between the source and the consumer, items push downstream
//! against a demand count flowing upstream, and cancellation may arrive
//! from either side at any time. Composition happens through
//! [`FlowExt`] and the source constructors; time-driven operators take a
//! [`Scheduler`].
//!
//! ```
//! use rheo::{from_iter, Flow, FlowExt};
//! use rheo_test_utils::TestSubscriber;
//!
//! let doubled = from_iter(vec![1, 2, 3]).map(|n| Ok(n * 2));
//! let subscriber = TestSubscriber::new();
//! doubled.subscribe(subscriber.clone());
//! subscriber.assert_items(&[2, 4, 6]);
//! ```

#![allow(clippy::multiple_crate_versions)]

pub use rheo_core::{
    demand, hooks, BehaviorSubject, Cancel, CancelRef, CancelSet, CompositeError, FlagCancel,
    Flow, FlowError, FlowItem, FlowRef, FullArbiter, MpscLinked, Notification, Result,
    SerialCancel, SerializedSubscriber, SpscRing, Subscriber, SubscriberRef, Subscription,
    SubscriptionArbiter, SubscriptionCell, SubscriptionRef, UnicastSubject,
};
pub use rheo_flow::{
    combine_latest::{combine_latest, combine_latest_delay_error},
    concat::{concat, concat_all, concat_pair},
    empty, error_flow, from_iter, just, never, range,
    timeout_selector::{timeout_selector, timeout_selector_with_fallback, TimeoutSelectorFlow},
    FlowExt, DEFAULT_BUFFER_SIZE,
};
pub use rheo_scheduler::{
    schedule_periodically, Scheduler, SchedulerRef, TokioScheduler, Worker, WorkerRef,
};
pub use rheo_single::{
    complete, completable_error, concat_completable, from_task, merge_delay_error, single_error,
    single_just, CompletableObserver, CompletableObserverRef, CompletableRef, CompletableSource,
    SingleExt, SingleObserver, SingleObserverRef, SingleRef, SingleSource,
};
