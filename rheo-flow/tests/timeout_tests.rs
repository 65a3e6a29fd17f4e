// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::time::Duration;

use rheo_core::{Flow, FlowError, FlowRef};
use rheo_flow::timeout_selector::{timeout_selector, timeout_selector_with_fallback};
use rheo_flow::{just, never, FlowExt};
use rheo_scheduler::SchedulerRef;
use rheo_test_utils::{ManualScheduler, TestPublisher, TestSubscriber};

const TIMEOUT: Duration = Duration::from_millis(200);

#[test]
fn test_silent_source_times_out_with_exactly_one_error() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::<i32>::new();
    let flow = source
        .flow()
        .timeout_timed(TIMEOUT, scheduler.clone() as SchedulerRef, None);
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    scheduler.advance_by(TIMEOUT);
    scheduler.advance_by(TIMEOUT);

    // Assert
    subscriber.assert_error_matches(|e| e.is_timeout());
    assert!(source.is_cancelled());
}

#[test]
fn test_items_keep_resetting_the_deadline() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::new();
    let flow = source
        .flow()
        .timeout_timed(TIMEOUT, scheduler.clone() as SchedulerRef, None);
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: each item lands just inside the window
    scheduler.advance_by(TIMEOUT / 2);
    source.emit(1);
    scheduler.advance_by(TIMEOUT / 2);
    source.emit(2);
    scheduler.advance_by(TIMEOUT / 2);
    source.complete();

    // Assert
    subscriber.assert_items(&[1, 2]);
    subscriber.assert_completed();
}

#[test]
fn test_stale_deadline_loses_the_race_against_an_item() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::new();
    let flow = source
        .flow()
        .timeout_timed(TIMEOUT, scheduler.clone() as SchedulerRef, None);
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: the item arrives before its deadline's wakeup runs; the old
    // timer generation must discard itself
    source.emit(1);
    scheduler.advance_by(TIMEOUT / 2);
    source.emit(2);
    scheduler.advance_by(TIMEOUT - Duration::from_millis(1));

    // Assert: still alive, no timeout fired for stale generations
    subscriber.assert_items(&[1, 2]);
    subscriber.assert_no_terminal();
}

#[test]
fn test_timeout_switches_to_fallback_preserving_order() {
    // Arrange
    let scheduler = ManualScheduler::new();
    let source = TestPublisher::new();
    let flow = source.flow().timeout_timed(
        TIMEOUT,
        scheduler.clone() as SchedulerRef,
        Some(just(100)),
    );
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: one item, then silence past the deadline
    source.emit(1);
    scheduler.advance_by(TIMEOUT);

    // Assert
    subscriber.assert_items(&[1, 100]);
    subscriber.assert_completed();
    assert!(source.is_cancelled());
}

#[test]
fn test_selector_first_timeout_fires_before_any_item() {
    // Arrange: the first-timeout indicator fires immediately, the
    // fallback takes over
    let source: FlowRef<i32> = never();
    let flow = timeout_selector_with_fallback(
        source,
        Some(|| Ok(just(0u8))),
        |_item: &i32| Ok(never::<u8>()),
        just(100),
    );
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_items(&[100]);
    subscriber.assert_completed();
}

#[test]
fn test_selector_per_item_indicator_times_out_without_fallback() {
    // Arrange
    let source = TestPublisher::new();
    let indicator = TestPublisher::<u8>::new();
    let indicator_flow = indicator.clone();
    let flow = timeout_selector(
        source.flow(),
        None::<fn() -> rheo_core::Result<FlowRef<u8>>>,
        move |_item: &i32| Ok(indicator_flow.flow()),
    );
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: the item's indicator fires before the next item
    source.emit(1);
    indicator.emit(0);

    // Assert
    subscriber.assert_items(&[1]);
    subscriber.assert_error_matches(|e| e.is_timeout());
    assert!(source.is_cancelled());
}

#[test]
fn test_selector_indicator_overtaken_by_next_item_is_ignored() {
    // Arrange
    let source = TestPublisher::new();
    let first_indicator = TestPublisher::<u8>::new();
    let second_indicator = TestPublisher::<u8>::new();
    let indicators = [first_indicator.clone(), second_indicator.clone()];
    let flow = timeout_selector(
        source.flow(),
        None::<fn() -> rheo_core::Result<FlowRef<u8>>>,
        move |item: &usize| Ok(indicators[*item].flow()),
    );
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: item 1 overtakes item 0's indicator before it fires
    source.emit(0);
    source.emit(1);
    assert!(first_indicator.is_cancelled());
    first_indicator.emit(0);

    // Assert: the stale indicator changed nothing
    subscriber.assert_items(&[0, 1]);
    subscriber.assert_no_terminal();
}

#[test]
fn test_selector_failure_fails_downstream_immediately() {
    // Arrange
    let source = TestPublisher::new();
    let flow = timeout_selector(
        source.flow(),
        None::<fn() -> rheo_core::Result<FlowRef<u8>>>,
        |_item: &i32| Err::<FlowRef<u8>, _>(FlowError::message("no indicator")),
    );
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    source.emit(1);

    // Assert
    subscriber.assert_items(&[1]);
    subscriber.assert_error_matches(|e| e.to_string().contains("no indicator"));
}
