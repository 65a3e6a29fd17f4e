// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rheo_error::FlowError;

use crate::flow::{FlowItem, SubscriberRef};

/// A materialized stream signal.
///
/// Subjects and serialization helpers hold signals in queues and latest
/// cells; this enum is their storage form.
#[derive(Debug, Clone)]
pub enum Notification<T> {
    /// An item.
    Next(T),
    /// The failure terminal.
    Error(FlowError),
    /// The completion terminal.
    Complete,
}

impl<T: FlowItem> Notification<T> {
    /// Returns `true` for either terminal variant.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Complete)
    }

    /// Replay this signal into a subscriber. Returns `true` when the
    /// signal was a terminal, i.e. the emission loop should stop.
    pub fn accept(self, subscriber: &SubscriberRef<T>) -> bool {
        match self {
            Self::Next(item) => {
                subscriber.on_next(item);
                false
            }
            Self::Error(error) => {
                subscriber.on_error(error);
                true
            }
            Self::Complete => {
                subscriber.on_complete();
                true
            }
        }
    }
}
