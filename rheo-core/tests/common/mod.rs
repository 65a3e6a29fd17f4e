// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Minimal recording consumer shared by the core protocol tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use rheo_core::{FlowError, Subscriber, Subscription, SubscriptionRef};

#[derive(Default)]
pub struct Recording<T> {
    pub items: Vec<T>,
    pub errors: Vec<FlowError>,
    pub completions: usize,
    pub subscriptions: usize,
}

pub struct RecordingSubscriber<T> {
    state: Mutex<Recording<T>>,
    subscription: Mutex<Option<SubscriptionRef>>,
}

impl<T: Clone + Send + Sync + 'static> RecordingSubscriber<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Recording {
                items: Vec::new(),
                errors: Vec::new(),
                completions: 0,
                subscriptions: 0,
            }),
            subscription: Mutex::new(None),
        })
    }

    pub fn items(&self) -> Vec<T> {
        self.state.lock().items.clone()
    }

    pub fn error_count(&self) -> usize {
        self.state.lock().errors.len()
    }

    pub fn first_error(&self) -> Option<FlowError> {
        self.state.lock().errors.first().cloned()
    }

    pub fn completions(&self) -> usize {
        self.state.lock().completions
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions
    }

    pub fn terminal_count(&self) -> usize {
        let state = self.state.lock();
        state.errors.len() + state.completions
    }

    pub fn request(&self, n: u64) {
        let subscription = self.subscription.lock().clone();
        if let Some(subscription) = subscription {
            subscription.request(n);
        }
    }

    pub fn cancel(&self) {
        let subscription = self.subscription.lock().clone();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Subscriber<T> for RecordingSubscriber<T> {
    fn on_subscribe(&self, subscription: SubscriptionRef) {
        *self.subscription.lock() = Some(subscription);
        self.state.lock().subscriptions += 1;
    }

    fn on_next(&self, item: T) {
        self.state.lock().items.push(item);
    }

    fn on_error(&self, error: FlowError) {
        self.state.lock().errors.push(error);
    }

    fn on_complete(&self) {
        self.state.lock().completions += 1;
    }
}
