// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rheo_core::Flow;
use rheo_flow::combine_latest::combine_latest;
use rheo_test_utils::{TestPublisher, TestSubscriber};

#[test]
fn test_combine_latest_emits_nothing_until_all_sources_produced() {
    // Arrange
    let first = TestPublisher::new();
    let second = TestPublisher::new();
    let flow = combine_latest(vec![first.flow(), second.flow()], |values: &[i32]| {
        Ok(values.iter().sum::<i32>())
    });
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    first.emit(1);

    // Assert
    assert_eq!(subscriber.item_count(), 0);
    subscriber.assert_no_terminal();
}

#[test]
fn test_combine_latest_combines_on_every_arrival_once_full() {
    // Arrange
    let first = TestPublisher::new();
    let second = TestPublisher::new();
    let flow = combine_latest(vec![first.flow(), second.flow()], |values: &[i32]| {
        Ok(values.iter().sum::<i32>())
    });
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: 1 then 10 -> 11; 2 -> 12; second completes; 3 -> 13; first completes
    first.emit(1);
    second.emit(10);
    first.emit(2);
    second.complete();
    first.emit(3);
    first.complete();

    // Assert
    subscriber.assert_items(&[11, 12, 13]);
    subscriber.assert_completed();
}

#[test]
fn test_combine_latest_source_completing_without_value_ends_the_stream() {
    // Arrange
    let first = TestPublisher::new();
    let second = TestPublisher::<i32>::new();
    let flow = combine_latest(vec![first.flow(), second.flow()], |values: &[i32]| {
        Ok(values.iter().sum::<i32>())
    });
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    first.emit(1);

    // Act: no combination is ever possible once a source dies empty
    second.complete();

    // Assert
    assert_eq!(subscriber.item_count(), 0);
    subscriber.assert_completed();
}

#[test]
fn test_combine_latest_empty_source_list_completes_immediately() {
    let subscriber = TestSubscriber::new();
    combine_latest(Vec::new(), |values: &[i32]| Ok(values.iter().sum::<i32>()))
        .subscribe(subscriber.clone());
    subscriber.assert_completed();
}

#[test]
fn test_combine_latest_respects_downstream_demand() {
    // Arrange
    let first = TestPublisher::new();
    let second = TestPublisher::new();
    let flow = combine_latest(vec![first.flow(), second.flow()], |values: &[i32]| {
        Ok(values.iter().sum::<i32>())
    });
    let subscriber = TestSubscriber::with_request(1);
    flow.subscribe(subscriber.clone());

    // Act: two snapshots become available, one credit granted
    first.emit(1);
    second.emit(10);
    first.emit(2);

    // Assert
    subscriber.assert_items(&[11]);

    subscriber.request(1);
    subscriber.assert_items(&[11, 12]);
}

#[test]
fn test_combine_latest_cancel_cancels_every_source() {
    // Arrange
    let first = TestPublisher::<i32>::new();
    let second = TestPublisher::<i32>::new();
    let flow = combine_latest(vec![first.flow(), second.flow()], |values: &[i32]| {
        Ok(values.iter().sum::<i32>())
    });
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    subscriber.cancel();

    // Assert
    assert!(first.is_cancelled());
    assert!(second.is_cancelled());
}

#[test]
fn test_combine_latest_arrival_order_defines_output_order() {
    // Arrange: three sources, output tagged with the snapshot
    let a = TestPublisher::new();
    let b = TestPublisher::new();
    let c = TestPublisher::new();
    let flow = combine_latest(
        vec![a.flow(), b.flow(), c.flow()],
        |values: &[i32]| Ok(values.to_vec()),
    );
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    a.emit(1);
    b.emit(2);
    c.emit(3);
    b.emit(20);
    a.emit(10);

    // Assert
    subscriber.assert_items(&[vec![1, 2, 3], vec![1, 20, 3], vec![10, 20, 3]]);
}
