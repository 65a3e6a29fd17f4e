// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rheo_core::{Flow, FlowError};
use rheo_flow::{from_iter, FlowExt};
use rheo_test_utils::{TestPublisher, TestSubscriber};

#[test]
fn test_scan_emits_seed_first() {
    // Arrange
    let flow = from_iter(vec![1, 2, 3]).scan_seed(|| Ok(0), |acc, n| Ok(acc + n));
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_items(&[0, 1, 3, 6]);
    subscriber.assert_completed();
}

#[test]
fn test_scan_seed_consumes_the_first_credit() {
    // Arrange
    let flow = from_iter(vec![1, 2]).scan_seed(|| Ok(100), |acc, n| Ok(acc + n));
    let subscriber = TestSubscriber::with_request(1);

    // Act
    flow.subscribe(subscriber.clone());

    // Assert: the single credit bought the seed only
    subscriber.assert_items(&[100]);
    subscriber.assert_no_terminal();

    subscriber.request(1);
    subscriber.assert_items(&[100, 101]);

    subscriber.request(2);
    subscriber.assert_items(&[100, 101, 103]);
    subscriber.assert_completed();
}

#[test]
fn test_scan_seed_supplier_failure_fails_before_subscription() {
    // Arrange
    let flow = from_iter(vec![1]).scan_seed(
        || Err::<i32, _>(FlowError::message("no seed")),
        |acc, n| Ok(acc + n),
    );
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_error_matches(|e| e.to_string().contains("no seed"));
}

#[test]
fn test_scan_accumulator_failure_cancels_upstream() {
    // Arrange
    let publisher = TestPublisher::new();
    let flow = publisher
        .flow()
        .scan_seed(|| Ok(0), |_, _: i32| Err(FlowError::message("overflowed")));
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    publisher.emit(1);

    // Assert
    subscriber.assert_items(&[0]);
    subscriber.assert_error_matches(|e| e.to_string().contains("overflowed"));
    assert!(publisher.is_cancelled());
}
