// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Serialization of concurrent upstream signals into a single-reader
//! emission stream.

use std::collections::VecDeque;

use parking_lot::Mutex;
use rheo_error::FlowError;

use crate::flow::{FlowItem, Subscriber, SubscriberRef, SubscriptionRef};
use crate::hooks;
use crate::notification::Notification;

struct SerialState<T> {
    emitting: bool,
    done: bool,
    queue: VecDeque<Notification<T>>,
    /// Terminal failure recorded while another thread was emitting.
    /// Takes precedence over everything still queued.
    pending_error: Option<FlowError>,
}

/// Wraps a downstream subscriber and guarantees serial delivery under
/// concurrent upstream threads.
///
/// A producer that finds the gate open emits inline, then drains whatever
/// accumulated while it was busy. Producers that find the gate closed
/// append to the overflow queue and leave. An error recorded mid-emission
/// jumps the queue; items behind it are dropped.
///
/// The state lock is only ever held for queue flips; every downstream
/// call happens outside it.
pub struct SerializedSubscriber<T> {
    downstream: SubscriberRef<T>,
    state: Mutex<SerialState<T>>,
}

impl<T: FlowItem> SerializedSubscriber<T> {
    /// Wrap `downstream`.
    #[must_use]
    pub fn new(downstream: SubscriberRef<T>) -> Self {
        Self {
            downstream,
            state: Mutex::new(SerialState {
                emitting: false,
                done: false,
                queue: VecDeque::new(),
                pending_error: None,
            }),
        }
    }

    fn emit_loop(&self) {
        enum Step<T> {
            Fail(FlowError),
            Deliver(VecDeque<Notification<T>>),
            Idle,
        }

        loop {
            let step = {
                let mut state = self.state.lock();
                if let Some(error) = state.pending_error.take() {
                    state.done = true;
                    state.queue.clear();
                    Step::Fail(error)
                } else if state.queue.is_empty() {
                    state.emitting = false;
                    Step::Idle
                } else {
                    Step::Deliver(std::mem::take(&mut state.queue))
                }
            };

            match step {
                Step::Idle => return,
                Step::Fail(error) => {
                    self.downstream.on_error(error);
                    return;
                }
                Step::Deliver(batch) => {
                    for notification in batch {
                        match notification {
                            Notification::Next(item) => self.downstream.on_next(item),
                            Notification::Complete => {
                                self.state.lock().done = true;
                                self.downstream.on_complete();
                                return;
                            }
                            Notification::Error(error) => {
                                self.state.lock().done = true;
                                self.downstream.on_error(error);
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

impl<T: FlowItem> Subscriber<T> for SerializedSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        self.downstream.on_subscribe(subscription);
    }

    fn on_next(&self, item: T) {
        {
            let mut state = self.state.lock();
            if state.done {
                return;
            }
            if state.emitting {
                state.queue.push_back(Notification::Next(item));
                return;
            }
            state.emitting = true;
        }
        self.downstream.on_next(item);
        self.emit_loop();
    }

    fn on_error(&self, error: FlowError) {
        {
            let mut state = self.state.lock();
            if state.done {
                drop(state);
                hooks::on_error(error);
                return;
            }
            if state.emitting {
                state.pending_error = Some(error);
                return;
            }
            state.done = true;
        }
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        {
            let mut state = self.state.lock();
            if state.done {
                return;
            }
            if state.emitting {
                state.queue.push_back(Notification::Complete);
                return;
            }
            state.done = true;
        }
        self.downstream.on_complete();
    }
}
