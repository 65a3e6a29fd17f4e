// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod common;

use std::sync::Arc;

use common::RecordingSubscriber;
use rheo_core::{FlowError, SerializedSubscriber, Subscriber};

#[test]
fn test_items_pass_through_in_order() {
    // Arrange
    let downstream = RecordingSubscriber::new();
    let serialized = SerializedSubscriber::new(downstream.clone() as _);

    // Act
    serialized.on_next(1);
    serialized.on_next(2);
    serialized.on_complete();

    // Assert
    assert_eq!(downstream.items(), vec![1, 2]);
    assert_eq!(downstream.completions(), 1);
}

#[test]
fn test_signals_after_terminal_are_dropped() {
    // Arrange
    let downstream = RecordingSubscriber::new();
    let serialized = SerializedSubscriber::new(downstream.clone() as _);

    // Act
    serialized.on_complete();
    serialized.on_next(1);
    serialized.on_complete();

    // Assert
    assert!(downstream.items().is_empty());
    assert_eq!(downstream.terminal_count(), 1);
}

#[test]
fn test_second_error_goes_to_hook_not_downstream() {
    // Arrange
    let downstream: Arc<common::RecordingSubscriber<i32>> = RecordingSubscriber::new();
    let serialized = SerializedSubscriber::new(downstream.clone() as _);

    // Act
    serialized.on_error(FlowError::Timeout);
    serialized.on_error(FlowError::NoSuchElement);

    // Assert
    assert_eq!(downstream.error_count(), 1);
    assert!(downstream.first_error().unwrap().is_timeout());
}

#[test]
fn test_concurrent_producers_never_interleave_and_terminal_is_unique() {
    // Arrange
    const THREADS: usize = 4;
    const PER_THREAD: usize = 2_000;

    let downstream = RecordingSubscriber::new();
    let serialized = Arc::new(SerializedSubscriber::new(downstream.clone() as _));

    // Act: several producers pushing concurrently, one completing
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let serialized = Arc::clone(&serialized);
            std::thread::spawn(move || {
                for i in 0..PER_THREAD {
                    serialized.on_next((t * PER_THREAD + i) as u64);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    serialized.on_complete();
    serialized.on_complete();

    // Assert: every item delivered exactly once, then one terminal
    let mut items = downstream.items();
    assert_eq!(items.len(), THREADS * PER_THREAD);
    items.sort_unstable();
    items.dedup();
    assert_eq!(items.len(), THREADS * PER_THREAD);
    assert_eq!(downstream.terminal_count(), 1);
}
