// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Core protocol of the rheo reactive dataflow runtime.
//!
//! Everything in this crate serves the push contract: a producer accepts a
//! consumer, immediately hands it a subscription handle, and thereafter
//! delivers a serialized sequence of items terminated by at most one error
//! or completion. Demand flows the other way as a non-negative request
//! count; cancellation may arrive from either side at any time.
//!
//! The crate houses the protocol traits ([`Flow`], [`Subscriber`],
//! [`Subscription`]), demand arithmetic, the cancellation and subscription
//! plumbing shared by every operator, the two internal queue shapes, the
//! serialization helpers that uphold the one-thread-at-a-time delivery
//! guarantee, the hot subjects, and the process-wide orphan error hook.

#![allow(clippy::multiple_crate_versions)]

pub mod cancel;
pub mod demand;
pub mod flow;
pub mod full_arbiter;
pub mod functions;
pub mod hooks;
pub mod notification;
pub mod queue;
pub mod serialized;
pub mod subject;
pub mod subscription_arbiter;
pub mod subscription_cell;

pub use cancel::{Cancel, CancelRef, CancelSet, FlagCancel, SerialCancel};
pub use flow::{
    signal_complete, signal_error, Flow, FlowItem, FlowRef, NoopSubscription, Subscriber,
    SubscriberRef, Subscription, SubscriptionRef,
};
pub use full_arbiter::{FullArbiter, FullArbiterSubscriber};
pub use functions::{
    BiMapFn, BiPredicateFn, BooleanSupplierFn, CombinerFn, ConsumerFn, MapFn, PredicateFn,
    SupplierFn, Task,
};
pub use notification::Notification;
pub use queue::{MpscLinked, SpscRing};
pub use serialized::SerializedSubscriber;
pub use subject::{BehaviorSubject, UnicastSubject};
pub use subscription_arbiter::SubscriptionArbiter;
pub use subscription_cell::{PairSubscription, SubscriptionCell};

pub use rheo_error::{CompositeError, FlowError, Result};
