// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rheo_core::{Flow, FlowError};
use rheo_flow::{empty, error_flow, FlowExt};
use rheo_test_utils::{TestPublisher, TestSubscriber};

#[test]
fn test_mirrors_primary_until_other_emits() {
    // Arrange
    let primary = TestPublisher::new();
    let other = TestPublisher::<u8>::new();
    let flow = primary.flow().take_until(other.flow());
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    primary.emit(1);
    primary.emit(2);
    other.emit(0);
    primary.emit(3);

    // Assert: completion at the other's first emission, primary cancelled
    subscriber.assert_items(&[1, 2]);
    subscriber.assert_completed();
    assert!(primary.is_cancelled());
}

#[test]
fn test_other_completing_first_completes_the_result() {
    // Arrange
    let primary = TestPublisher::<i32>::new();
    let other = TestPublisher::<u8>::new();
    let flow = primary.flow().take_until(other.flow());
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    other.complete();

    // Assert
    subscriber.assert_completed();
    assert!(primary.is_cancelled());
}

#[test]
fn test_other_finishing_before_primary_subscribes_still_delivers_a_handle() {
    // Arrange: the other is synchronously empty, so it terminates while
    // the primary has not subscribed yet
    let primary = TestPublisher::<i32>::new();
    let flow = primary.flow().take_until(empty::<u8>());
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert: exactly one handle, one completion, primary never ran
    assert_eq!(subscriber.subscription_count(), 1);
    subscriber.assert_completed();
    assert!(primary.is_cancelled());
}

#[test]
fn test_other_error_propagates() {
    // Arrange
    let primary = TestPublisher::<i32>::new();
    let flow = primary.flow().take_until(error_flow::<u8>(FlowError::Timeout));
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_error_matches(|e| e.is_timeout());
}

#[test]
fn test_primary_error_propagates_and_cancels_other() {
    // Arrange
    let primary = TestPublisher::<i32>::new();
    let other = TestPublisher::<u8>::new();
    let flow = primary.flow().take_until(other.flow());
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    primary.error(FlowError::NoSuchElement);

    // Assert
    subscriber.assert_error_matches(|e| matches!(e, FlowError::NoSuchElement));
    assert!(other.is_cancelled());
}

#[test]
fn test_cancel_disposes_both_subscriptions() {
    // Arrange
    let primary = TestPublisher::<i32>::new();
    let other = TestPublisher::<u8>::new();
    let flow = primary.flow().take_until(other.flow());
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    subscriber.cancel();

    // Assert
    assert!(primary.is_cancelled());
    assert!(other.is_cancelled());
}
