// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rheo_core::{Flow, FlowError};
use rheo_flow::combine_latest::{combine_latest, combine_latest_delay_error};
use rheo_test_utils::{TestPublisher, TestSubscriber};

#[test]
fn test_error_short_circuits_without_delay_error() {
    // Arrange
    let first = TestPublisher::new();
    let second = TestPublisher::new();
    let flow = combine_latest(vec![first.flow(), second.flow()], |values: &[i32]| {
        Ok(values.iter().sum::<i32>())
    });
    let subscriber = TestSubscriber::with_request(0);
    flow.subscribe(subscriber.clone());

    // a snapshot is queued but cannot be delivered without demand
    first.emit(1);
    second.emit(10);

    // Act
    first.error(FlowError::Timeout);

    // Assert: the queued snapshot is thrown away
    assert_eq!(subscriber.item_count(), 0);
    subscriber.assert_error_matches(|e| e.is_timeout());
    assert!(second.is_cancelled());
}

#[test]
fn test_delay_error_drains_queued_snapshots_first() {
    // Arrange
    let first = TestPublisher::new();
    let second = TestPublisher::new();
    let flow =
        combine_latest_delay_error(vec![first.flow(), second.flow()], |values: &[i32]| {
            Ok(values.iter().sum::<i32>())
        });
    let subscriber = TestSubscriber::with_request(0);
    flow.subscribe(subscriber.clone());

    first.emit(1);
    second.emit(10);

    // Act: source fails with a snapshot still queued
    first.error(FlowError::Timeout);
    second.complete();
    subscriber.assert_no_terminal();

    // Act: demand arrives, the snapshot drains, then the error reports
    subscriber.request(1);

    // Assert
    subscriber.assert_items(&[11]);
    subscriber.assert_error_matches(|e| e.is_timeout());
}

#[test]
fn test_concurrent_failures_aggregate_into_a_composite() {
    // Arrange
    let first = TestPublisher::<i32>::new();
    let second = TestPublisher::<i32>::new();
    let flow =
        combine_latest_delay_error(vec![first.flow(), second.flow()], |values: &[i32]| {
            Ok(values.iter().sum::<i32>())
        });
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    first.error(FlowError::Timeout);
    second.error(FlowError::NoSuchElement);

    // Assert
    subscriber.assert_error_matches(FlowError::is_composite);
}

#[test]
fn test_combiner_failure_cancels_all_sources() {
    // Arrange
    let first = TestPublisher::new();
    let second = TestPublisher::new();
    let flow = combine_latest(vec![first.flow(), second.flow()], |_: &[i32]| {
        Err::<i32, _>(FlowError::message("combiner refused"))
    });
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    first.emit(1);
    second.emit(2);

    // Assert
    subscriber.assert_error_matches(|e| e.to_string().contains("combiner refused"));
    assert!(first.is_cancelled());
    assert!(second.is_cancelled());
}
