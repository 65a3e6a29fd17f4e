// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::time::Duration;

use rheo_core::{Flow, FlowError};
use rheo_flow::FlowExt;
use rheo_scheduler::SchedulerRef;
use rheo_test_utils::{ManualScheduler, TestPublisher, TestSubscriber};

const PERIOD: Duration = Duration::from_millis(500);

#[test]
fn test_sampler_emits_latest_value_per_tick() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::new();
    let flow = source
        .flow()
        .sample_timed(PERIOD, scheduler.clone() as SchedulerRef);
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: a then b inside the first period; the tick sees only b
    source.emit("a");
    source.emit("b");
    scheduler.advance_by(PERIOD);

    // c in the second period
    source.emit("c");
    scheduler.advance_by(PERIOD);

    // Assert
    subscriber.assert_items(&["b", "c"]);
    subscriber.assert_no_terminal();
}

#[test]
fn test_tick_without_a_new_value_emits_nothing() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::<i32>::new();
    let flow = source
        .flow()
        .sample_timed(PERIOD, scheduler.clone() as SchedulerRef);
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    source.emit(1);
    scheduler.advance_by(PERIOD);

    // Act: nothing arrived since the last swap
    scheduler.advance_by(PERIOD);

    // Assert
    subscriber.assert_items(&[1]);
}

#[test]
fn test_upstream_is_consumed_unboundedly() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::<i32>::new();
    let flow = source
        .flow()
        .sample_timed(PERIOD, scheduler.clone() as SchedulerRef);
    let subscriber = TestSubscriber::with_request(1);

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    assert_eq!(source.requested(), u64::MAX);
}

#[test]
fn test_tick_with_value_but_no_demand_fails_the_stream() {
    // Arrange: zero downstream demand
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::new();
    let flow = source
        .flow()
        .sample_timed(PERIOD, scheduler.clone() as SchedulerRef);
    let subscriber = TestSubscriber::with_request(0);
    flow.subscribe(subscriber.clone());

    source.emit(1);

    // Act
    scheduler.advance_by(PERIOD);

    // Assert
    subscriber.assert_error_matches(|e| matches!(e, FlowError::MissingDemand { .. }));
    assert!(source.is_cancelled());
}

#[test]
fn test_terminal_stops_the_timer() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::<i32>::new();
    let flow = source
        .flow()
        .sample_timed(PERIOD, scheduler.clone() as SchedulerRef);
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    source.emit(5);
    source.complete();
    scheduler.advance_by(PERIOD);

    // Assert: completion was immediate, the pending value is discarded
    assert_eq!(subscriber.item_count(), 0);
    subscriber.assert_completed();
}

#[test]
fn test_cancel_disposes_timer_and_upstream() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::<i32>::new();
    let flow = source
        .flow()
        .sample_timed(PERIOD, scheduler.clone() as SchedulerRef);
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    subscriber.cancel();
    source.emit(1);
    scheduler.advance_by(PERIOD);

    // Assert
    assert!(source.is_cancelled());
    assert_eq!(subscriber.item_count(), 0);
}
