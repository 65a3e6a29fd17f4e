// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rheo_core::Flow;
use rheo_flow::{empty, error_flow, from_iter, just, never, range};
use rheo_test_utils::TestSubscriber;

#[test]
fn test_from_iter_emits_all_and_completes() {
    // Arrange
    let flow = from_iter(vec![1, 2, 3, 4]);
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_items(&[1, 2, 3, 4]);
    subscriber.assert_completed();
}

#[test]
fn test_from_iter_respects_demand() {
    // Arrange
    let flow = from_iter(vec![1, 2, 3, 4]);
    let subscriber = TestSubscriber::with_request(2);

    // Act
    flow.subscribe(subscriber.clone());

    // Assert: two credits, two items, no terminal yet
    subscriber.assert_items(&[1, 2]);
    subscriber.assert_no_terminal();

    // Act: grant the rest
    subscriber.request(2);

    // Assert
    subscriber.assert_items(&[1, 2, 3, 4]);
    subscriber.assert_completed();
}

#[test]
fn test_from_iter_zero_demand_completes_only_when_empty() {
    // Arrange
    let flow = from_iter(Vec::<i32>::new());
    let subscriber = TestSubscriber::with_request(0);

    // Act
    flow.subscribe(subscriber.clone());

    // Assert: emptiness needs no credit to report
    subscriber.assert_completed();
}

#[test]
fn test_from_iter_cancel_stops_emission() {
    // Arrange
    let flow = range(0, 100);
    let subscriber = TestSubscriber::with_request(3);

    // Act
    flow.subscribe(subscriber.clone());
    subscriber.cancel();
    subscriber.request(50);

    // Assert
    assert_eq!(subscriber.item_count(), 3);
    subscriber.assert_no_terminal();
}

#[test]
fn test_each_subscription_gets_a_fresh_iteration() {
    // Arrange
    let flow = from_iter(vec![7, 8]);
    let first = TestSubscriber::new();
    let second = TestSubscriber::new();

    // Act
    flow.subscribe(first.clone());
    flow.subscribe(second.clone());

    // Assert
    first.assert_items(&[7, 8]);
    second.assert_items(&[7, 8]);
}

#[test]
fn test_just_emits_one() {
    let subscriber = TestSubscriber::new();
    just(42).subscribe(subscriber.clone());
    subscriber.assert_items(&[42]);
    subscriber.assert_completed();
}

#[test]
fn test_empty_and_never() {
    let on_empty = TestSubscriber::<i32>::new();
    empty::<i32>().subscribe(on_empty.clone());
    on_empty.assert_completed();
    assert_eq!(on_empty.item_count(), 0);

    let on_never = TestSubscriber::<i32>::new();
    never::<i32>().subscribe(on_never.clone());
    assert_eq!(on_never.subscription_count(), 1);
    on_never.assert_no_terminal();
}

#[test]
fn test_error_flow_fails_immediately() {
    let subscriber = TestSubscriber::<i32>::new();
    error_flow(rheo_core::FlowError::Timeout).subscribe(subscriber.clone());
    subscriber.assert_error_matches(|e| e.is_timeout());
}
