// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use rheo_core::{Flow, FlowError};
use rheo_flow::{never, FlowExt};
use rheo_test_utils::{TestPublisher, TestSubscriber};

#[test]
fn test_item_is_emitted_when_its_debouncer_fires_first() {
    // Arrange
    let source = TestPublisher::new();
    let debouncer = TestPublisher::<u8>::new();
    let debouncer_flow = debouncer.clone();
    let flow = source
        .flow()
        .debounce_selector(move |_: &i32| Ok(debouncer_flow.flow()));
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    debouncer.emit(0);

    // Assert
    subscriber.assert_items(&[1]);
}

#[test]
fn test_newer_item_supersedes_the_pending_one() {
    // Arrange: a dedicated debouncer per item
    let source = TestPublisher::new();
    let first_debouncer = TestPublisher::<u8>::new();
    let second_debouncer = TestPublisher::<u8>::new();
    let debouncers = [first_debouncer.clone(), second_debouncer.clone()];
    let flow = source
        .flow()
        .debounce_selector(move |item: &usize| Ok(debouncers[*item].flow()));
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: item 1 arrives before item 0's debouncer fires
    source.emit(0);
    source.emit(1);

    // Assert: the superseded debouncer was disposed
    assert!(first_debouncer.is_cancelled());

    // Act: a stale firing changes nothing; the current one emits
    first_debouncer.emit(0);
    second_debouncer.emit(0);

    // Assert
    subscriber.assert_items(&[1]);
}

#[test]
fn test_debouncer_completion_counts_as_a_signal() {
    // Arrange
    let source = TestPublisher::new();
    let debouncer = TestPublisher::<u8>::new();
    let debouncer_flow = debouncer.clone();
    let flow = source
        .flow()
        .debounce_selector(move |_: &i32| Ok(debouncer_flow.flow()));
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    source.emit(7);
    debouncer.complete();

    // Assert
    subscriber.assert_items(&[7]);
}

#[test]
fn test_upstream_completion_flushes_the_pending_value() {
    // Arrange
    let source = TestPublisher::new();
    let flow = source
        .flow()
        .debounce_selector(|_: &i32| Ok(never::<u8>()));
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act: the debouncer never fires, but completion flushes
    source.emit(5);
    source.complete();

    // Assert
    subscriber.assert_items(&[5]);
    subscriber.assert_completed();
}

#[test]
fn test_selector_failure_fails_the_stream() {
    // Arrange
    let source = TestPublisher::new();
    let flow = source
        .flow()
        .debounce_selector(|_: &i32| Err::<rheo_core::FlowRef<u8>, _>(FlowError::message("bad selector")));
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    source.emit(1);

    // Assert
    subscriber.assert_error_matches(|e| e.to_string().contains("bad selector"));
    assert!(source.is_cancelled());
}

#[test]
fn test_debouncer_error_fails_the_stream() {
    // Arrange
    let source = TestPublisher::new();
    let debouncer = TestPublisher::<u8>::new();
    let debouncer_flow = debouncer.clone();
    let flow = source
        .flow()
        .debounce_selector(move |_: &i32| Ok(debouncer_flow.flow()));
    let subscriber = TestSubscriber::new();
    flow.subscribe(subscriber.clone());

    // Act
    source.emit(1);
    debouncer.error(FlowError::Timeout);

    // Assert
    subscriber.assert_error_matches(|e| e.is_timeout());
    assert!(source.is_cancelled());
}
