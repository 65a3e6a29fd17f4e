// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rheo_core::FlowError;
use rheo_single::{single_error, single_just, SingleExt, SingleSource};
use rheo_test_utils::TestSingleObserver;

#[test]
fn test_just_delivers_value_after_handle() {
    // Arrange
    let single = single_just(5);
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    assert_eq!(observer.subscription_count(), 1);
    observer.assert_value(&5);
}

#[test]
fn test_map_transforms_the_success_value() {
    // Arrange
    let single = single_just(5).map(|n| Ok(n * 3));
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    observer.assert_value(&15);
}

#[test]
fn test_map_failure_becomes_the_terminal() {
    // Arrange
    let single = single_just(5).map(|_| Err::<i32, _>(FlowError::message("mapper refused")));
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    observer.assert_error_matches(|e| e.to_string().contains("mapper refused"));
}

#[test]
fn test_map_passes_errors_through_untouched() {
    // Arrange
    let single = single_error::<i32>(FlowError::Timeout).map(|n| Ok(n + 1));
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    observer.assert_error_matches(|e| e.is_timeout());
}

#[test]
fn test_do_on_success_runs_before_delivery() {
    // Arrange
    let seen = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&seen);
    let single = single_just(7).do_on_success(move |value| {
        probe.store(*value as usize, Ordering::SeqCst);
        Ok(())
    });
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    assert_eq!(seen.load(Ordering::SeqCst), 7);
    observer.assert_value(&7);
}

#[test]
fn test_do_on_success_failure_converts_to_error() {
    // Arrange
    let single =
        single_just(7).do_on_success(|_| Err(FlowError::message("side effect failed")));
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    observer.assert_error_matches(|e| e.to_string().contains("side effect failed"));
}

#[test]
fn test_do_on_error_sees_the_error_and_passes_it_on() {
    // Arrange
    let seen = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&seen);
    let single = single_error::<i32>(FlowError::Timeout).do_on_error(move |_| {
        probe.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    observer.assert_error_matches(|e| e.is_timeout());
}

#[test]
fn test_do_on_error_handler_failure_composes_both_errors() {
    // Arrange
    let single = single_error::<i32>(FlowError::Timeout)
        .do_on_error(|_| Err(FlowError::message("handler broke")));
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    observer.assert_error_matches(FlowError::is_composite);
}

#[test]
fn test_lift_splices_a_custom_observer() {
    // Arrange: a lift that doubles on the way through
    let single = single_just(21).lift::<i32>(Arc::new(|downstream| {
        struct Doubler {
            downstream: rheo_single::SingleObserverRef<i32>,
        }
        impl rheo_single::SingleObserver<i32> for Doubler {
            fn on_subscribe(&self, cancel: rheo_core::CancelRef) {
                self.downstream.on_subscribe(cancel);
            }

            fn on_success(&self, value: i32) {
                self.downstream.on_success(value * 2);
            }

            fn on_error(&self, error: FlowError) {
                self.downstream.on_error(error);
            }
        }
        Ok(Arc::new(Doubler { downstream }) as rheo_single::SingleObserverRef<i32>)
    }));
    let observer = TestSingleObserver::new();

    // Act
    single.subscribe(observer.clone());

    // Assert
    observer.assert_value(&42);
}

#[test]
fn test_to_flow_bridges_the_success_value_under_demand() {
    use rheo_core::Flow;
    use rheo_test_utils::TestSubscriber;

    // Arrange: no initial demand
    let flow = single_just(8).to_flow();
    let subscriber = TestSubscriber::with_request(0);
    flow.subscribe(subscriber.clone());

    // Assert: the value waits for a request
    subscriber.assert_no_terminal();

    // Act
    subscriber.request(1);

    // Assert
    subscriber.assert_items(&[8]);
    subscriber.assert_completed();
}

#[test]
fn test_to_flow_propagates_errors_immediately() {
    use rheo_core::Flow;
    use rheo_test_utils::TestSubscriber;

    let flow = single_error::<i32>(FlowError::Timeout).to_flow();
    let subscriber = TestSubscriber::with_request(0);
    flow.subscribe(subscriber.clone());
    subscriber.assert_error_matches(|e| e.is_timeout());
}
