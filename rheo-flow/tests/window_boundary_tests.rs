// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rheo_core::{Flow, FlowError, FlowRef};
use rheo_flow::FlowExt;
use rheo_test_utils::{TestPublisher, TestSubscriber};

fn open_windows(outer: &TestSubscriber<FlowRef<i32>>) -> Vec<std::sync::Arc<TestSubscriber<i32>>> {
    outer
        .items()
        .into_iter()
        .map(|window| {
            let collector = TestSubscriber::<i32>::new();
            window.subscribe(collector.clone());
            collector
        })
        .collect()
}

#[test]
fn test_first_window_opens_on_subscribe() {
    // Arrange
    let source = TestPublisher::<i32>::new();
    let boundary = TestPublisher::<u8>::new();
    let flow = source.flow().window_boundary(boundary.flow());
    let outer = TestSubscriber::new();

    // Act
    flow.subscribe(outer.clone());

    // Assert
    assert_eq!(outer.item_count(), 1);
}

#[test]
fn test_boundary_ticks_split_items_into_consecutive_windows() {
    // Arrange
    let source = TestPublisher::new();
    let boundary = TestPublisher::<u8>::new();
    let flow = source.flow().window_boundary(boundary.flow());
    let outer = TestSubscriber::new();
    flow.subscribe(outer.clone());

    // Act
    source.emit(1);
    source.emit(2);
    boundary.emit(0);
    source.emit(3);
    source.complete();

    // Assert: two windows with the right contents and terminals
    let windows = open_windows(&outer);
    assert_eq!(windows.len(), 2);
    windows[0].assert_items(&[1, 2]);
    windows[0].assert_completed();
    windows[1].assert_items(&[3]);
    windows[1].assert_completed();
    outer.assert_completed();
}

#[test]
fn test_windows_buffer_until_subscribed() {
    // Arrange
    let source = TestPublisher::new();
    let boundary = TestPublisher::<u8>::new();
    let flow = source.flow().window_boundary(boundary.flow());
    let outer = TestSubscriber::new();
    flow.subscribe(outer.clone());

    // Act: fill the window before anyone reads it
    source.emit(10);
    source.emit(11);

    // Assert: a late reader still receives the buffered items
    let collector = TestSubscriber::<i32>::new();
    outer.items()[0].subscribe(collector.clone());
    collector.assert_items(&[10, 11]);
}

#[test]
fn test_upstream_error_reaches_window_and_outer() {
    // Arrange
    let source = TestPublisher::new();
    let boundary = TestPublisher::<u8>::new();
    let flow = source.flow().window_boundary(boundary.flow());
    let outer = TestSubscriber::new();
    flow.subscribe(outer.clone());

    source.emit(1);

    // Act
    source.error(FlowError::Timeout);

    // Assert
    let windows = open_windows(&outer);
    windows[0].assert_error_matches(|e| e.is_timeout());
    outer.assert_error_matches(|e| e.is_timeout());
}

#[test]
fn test_boundary_error_terminates_everything() {
    // Arrange
    let source = TestPublisher::<i32>::new();
    let boundary = TestPublisher::<u8>::new();
    let flow = source.flow().window_boundary(boundary.flow());
    let outer = TestSubscriber::new();
    flow.subscribe(outer.clone());

    // Act
    boundary.error(FlowError::NoSuchElement);

    // Assert
    outer.assert_error_matches(|e| matches!(e, FlowError::NoSuchElement));
    assert!(source.is_cancelled());
}

#[test]
fn test_cancel_stops_new_windows_and_tears_down_on_next_tick() {
    // Arrange
    let source = TestPublisher::<i32>::new();
    let boundary = TestPublisher::<u8>::new();
    let flow = source.flow().window_boundary(boundary.flow());
    let outer = TestSubscriber::new();
    flow.subscribe(outer.clone());

    // Act: after cancel, each tick closes a window without opening a
    // replacement; teardown lands when the count reaches zero
    outer.cancel();
    boundary.emit(0);
    assert_eq!(outer.item_count(), 1);
    boundary.emit(0);

    // Assert
    assert!(boundary.is_cancelled());
    assert!(source.is_cancelled());
}
