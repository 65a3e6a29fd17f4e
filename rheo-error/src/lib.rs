// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Error types for the rheo reactive dataflow runtime.
//!
//! This crate defines the root [`FlowError`] type carried by every stream
//! event channel, plus the [`CompositeError`] aggregate used when several
//! upstreams fail concurrently.
//!
//! # Examples
//!
//! ```
//! use rheo_error::{FlowError, Result};
//!
//! fn check_demand(outstanding: u64) -> Result<()> {
//!     if outstanding == 0 {
//!         return Err(FlowError::missing_demand("sampler tick"));
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

mod composite;

pub use composite::CompositeError;

/// Root error type for all rheo stream signals.
///
/// Errors travel downstream as terminal events and therefore have to be
/// cloneable: a subject replays the same terminal to every subscriber.
/// User-supplied failures are held behind an `Arc` for that reason.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
    /// A user-provided function (mapper, combiner, predicate, supplier,
    /// accumulator) failed.
    #[error("user function failed: {0}")]
    User(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A user-provided function produced no value where one was required.
    #[error("no value produced: {context}")]
    NullValue {
        /// Which function came up empty
        context: String,
    },

    /// No item arrived within the configured window.
    #[error("operation timed out")]
    Timeout,

    /// An operator had to emit but downstream had zero outstanding demand.
    #[error("could not emit value due to lack of requests: {context}")]
    MissingDemand {
        /// The operator that was starved
        context: String,
    },

    /// A bounded internal queue rejected an offer. This indicates a
    /// protocol violation by the upstream (more items than requested).
    #[error("queue full: {context}")]
    QueueFull {
        /// The queue that overflowed
        context: String,
    },

    /// An operation was attempted against a stream in the wrong state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the violation
        message: String,
    },

    /// A single-element sequence completed without emitting.
    #[error("sequence contains no elements")]
    NoSuchElement,

    /// A single-element sequence emitted a second item.
    #[error("sequence contains more than one element")]
    MoreThanOneElement,

    /// Several errors occurred concurrently and were aggregated.
    #[error(transparent)]
    Composite(CompositeError),
}

impl FlowError {
    /// Wrap a user error.
    pub fn user(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::User(Arc::new(error))
    }

    /// Wrap a plain message as a user error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::User(Arc::new(MessageError(message.into())))
    }

    /// Create a missing-value error naming the function that came up empty.
    pub fn null_value(context: impl Into<String>) -> Self {
        Self::NullValue {
            context: context.into(),
        }
    }

    /// Create a lack-of-requests error.
    pub fn missing_demand(context: impl Into<String>) -> Self {
        Self::MissingDemand {
            context: context.into(),
        }
    }

    /// Create a queue-overflow error.
    pub fn queue_full(context: impl Into<String>) -> Self {
        Self::QueueFull {
            context: context.into(),
        }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Fold this error together with another into a composite, flattening
    /// any composites already present on either side.
    #[must_use]
    pub fn compose_with(self, other: FlowError) -> Self {
        Self::Composite(CompositeError::from_errors(vec![self, other]))
    }

    /// Returns `true` for the timeout variant.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` for the composite variant.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }
}

/// Identity used for insertion-order de-duplication inside composites.
///
/// User errors compare by the shared allocation, everything else by
/// variant shape and rendered message.
pub(crate) fn same_error(a: &FlowError, b: &FlowError) -> bool {
    match (a, b) {
        (FlowError::User(x), FlowError::User(y)) => Arc::ptr_eq(x, y),
        _ => {
            std::mem::discriminant(a) == std::mem::discriminant(b)
                && a.to_string() == b.to_string()
        }
    }
}

#[derive(Debug)]
struct MessageError(String);

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MessageError {}

/// Specialized Result type for rheo operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Extension trait for converting foreign errors into [`FlowError`].
pub trait IntoFlowError {
    /// Convert this error into a [`FlowError`].
    fn into_flow_error(self) -> FlowError;
}

impl<E: std::error::Error + Send + Sync + 'static> IntoFlowError for E {
    fn into_flow_error(self) -> FlowError {
        FlowError::user(self)
    }
}
