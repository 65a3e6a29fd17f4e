// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! End-to-end pipelines across the workspace crates.

use std::sync::Arc;
use std::time::Duration;

use rheo::{
    concat_pair, from_iter, just, BehaviorSubject, Flow, FlowExt, FlowRef, Scheduler,
    SchedulerRef, TokioScheduler,
};
use rheo_test_utils::TestSubscriber;

#[test]
fn test_pipeline_of_map_filter_scan_to_list() {
    // Arrange
    let flow = from_iter(1..=6)
        .filter(|n| Ok(n % 2 == 0))
        .map(|n| Ok(n * 10))
        .scan_seed(|| Ok(0), |acc, n| Ok(acc + n))
        .to_list();
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_items(&[vec![0, 20, 60, 120]]);
    subscriber.assert_completed();
}

#[test]
fn test_behavior_subject_feeds_operator_chains() {
    // Arrange
    let subject = BehaviorSubject::with_default(0);
    let flow: FlowRef<i32> = Arc::new(subject.clone());
    let doubled = flow.map(|n| Ok(n * 2));
    let subscriber = TestSubscriber::new();
    doubled.subscribe(subscriber.clone());

    // Act
    subject.on_next(1);
    subject.on_next(2);
    subject.on_complete();

    // Assert: replayed default plus live items, doubled
    subscriber.assert_items(&[0, 2, 4]);
    subscriber.assert_completed();
}

#[test]
fn test_behavior_subject_late_subscriber_through_operators() {
    // Arrange
    let subject = BehaviorSubject::with_default(1);
    subject.on_next(5);

    let flow: FlowRef<i32> = Arc::new(subject.clone());
    let subscriber = TestSubscriber::new();

    // Act
    flow.take(1).subscribe(subscriber.clone());

    // Assert: the late subscriber sees the current value as its first item
    subscriber.assert_items(&[5]);
    subscriber.assert_completed();
}

#[test]
fn test_concat_then_switch_map_composition() {
    // Arrange
    let flow = concat_pair(from_iter(vec![1u64, 2]), just(3))
        .concat_map(|n| Ok(from_iter(vec![n, n * 100])));
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_items(&[1, 100, 2, 200, 3, 300]);
    subscriber.assert_completed();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_on_the_tokio_scheduler_fires_for_real() {
    // Arrange
    let scheduler: SchedulerRef = Arc::new(TokioScheduler::new());
    let silent: FlowRef<i32> = rheo::never();
    let flow = silent.timeout_timed(Duration::from_millis(20), scheduler, None);
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    assert!(subscriber.await_terminal(Duration::from_secs(2)));
    subscriber.assert_error_matches(|e| e.is_timeout());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sample_timed_on_the_tokio_scheduler() {
    // Arrange
    let scheduler: SchedulerRef = Arc::new(TokioScheduler::new());
    let subject = BehaviorSubject::with_default(0);
    let flow: FlowRef<i32> = Arc::new(subject.clone());
    let sampled = flow.sample_timed(Duration::from_millis(25), scheduler);
    let subscriber = TestSubscriber::new();
    sampled.subscribe(subscriber.clone());

    // Act: keep the latest cell busy across a few periods
    for n in 1..=5 {
        subject.on_next(n);
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    subject.on_complete();

    // Assert
    assert!(subscriber.await_terminal(Duration::from_secs(2)));
    assert!(subscriber.item_count() >= 2, "expected several samples");
    subscriber.assert_completed();
}

#[test]
fn test_default_scheduler_clock_is_monotonic_enough() {
    struct Wall;
    impl Scheduler for Wall {
        fn create_worker(&self) -> rheo::WorkerRef {
            unreachable!("clock-only scheduler")
        }
    }
    let wall = Wall;
    let first = wall.now();
    let second = wall.now();
    assert!(second >= first);
}
