// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod common;

use common::RecordingSubscriber;
use rheo_core::{BehaviorSubject, Flow, FlowError};

#[test]
fn test_default_value_is_replayed_to_first_subscriber() {
    // Arrange
    let subject = BehaviorSubject::with_default(0);
    let subscriber = RecordingSubscriber::new();

    // Act
    subject.subscribe(subscriber.clone());

    // Assert
    assert_eq!(subscriber.items(), vec![0]);
    assert_eq!(subscriber.terminal_count(), 0);
}

#[test]
fn test_late_subscriber_sees_latest_value() {
    // Arrange
    let subject = BehaviorSubject::with_default(0);
    let first = RecordingSubscriber::new();
    subject.subscribe(first.clone());

    // Act
    subject.on_next(1);
    let second = RecordingSubscriber::new();
    subject.subscribe(second.clone());

    // Assert
    assert_eq!(first.items(), vec![0, 1]);
    assert_eq!(second.items(), vec![1]);
}

#[test]
fn test_subscriber_after_complete_receives_terminal_synchronously() {
    // Arrange
    let subject = BehaviorSubject::with_default(0);
    subject.on_next(1);
    subject.on_complete();

    // Act
    let late = RecordingSubscriber::new();
    subject.subscribe(late.clone());

    // Assert: no replayed value, exactly the terminal
    assert!(late.items().is_empty());
    assert_eq!(late.completions(), 1);
}

#[test]
fn test_subscriber_after_error_receives_that_error() {
    // Arrange
    let subject: BehaviorSubject<i32> = BehaviorSubject::new();
    subject.on_error(FlowError::Timeout);

    // Act
    let late = RecordingSubscriber::new();
    subject.subscribe(late.clone());

    // Assert
    assert_eq!(late.error_count(), 1);
    assert!(late.first_error().unwrap().is_timeout());
}

#[test]
fn test_terminal_is_delivered_exactly_once_per_subscriber() {
    // Arrange
    let subject = BehaviorSubject::with_default(7);
    let subscriber = RecordingSubscriber::new();
    subject.subscribe(subscriber.clone());

    // Act
    subject.on_complete();
    subject.on_complete();
    subject.on_next(8);

    // Assert
    assert_eq!(subscriber.items(), vec![7]);
    assert_eq!(subscriber.terminal_count(), 1);
}

#[test]
fn test_cancelled_subscriber_is_removed_and_stops_receiving() {
    // Arrange
    let subject = BehaviorSubject::with_default(1);
    let subscriber = RecordingSubscriber::new();
    subject.subscribe(subscriber.clone());
    assert_eq!(subject.subscriber_count(), 1);

    // Act
    subscriber.cancel();
    subject.on_next(2);

    // Assert
    assert_eq!(subject.subscriber_count(), 0);
    assert_eq!(subscriber.items(), vec![1]);
}

#[test]
fn test_value_accessor_tracks_latest() {
    // Arrange
    let subject = BehaviorSubject::with_default(1);

    // Act
    subject.on_next(2);

    // Assert
    assert_eq!(subject.value(), Some(2));

    subject.on_complete();
    assert_eq!(subject.value(), None);
}

#[test]
fn test_empty_subject_replays_nothing_until_first_emission() {
    // Arrange
    let subject: BehaviorSubject<i32> = BehaviorSubject::new();
    let subscriber = RecordingSubscriber::new();

    // Act
    subject.subscribe(subscriber.clone());
    subject.on_next(5);

    // Assert
    assert_eq!(subscriber.items(), vec![5]);
}

#[test]
fn test_concurrent_subscribers_each_see_every_value_once() {
    // Arrange
    let subject = BehaviorSubject::with_default(0u64);
    let subscribers: Vec<_> = (0..8).map(|_| RecordingSubscriber::new()).collect();
    for subscriber in &subscribers {
        subject.subscribe(subscriber.clone());
    }

    // Act: one producer thread, subscribers attached up front
    let producer = {
        let subject = subject.clone();
        std::thread::spawn(move || {
            for i in 1..=100u64 {
                subject.on_next(i);
            }
            subject.on_complete();
        })
    };
    producer.join().unwrap();

    // Assert: strictly increasing, no duplicates, one terminal each
    for subscriber in &subscribers {
        let items = subscriber.items();
        assert_eq!(items.first(), Some(&0));
        for window in items.windows(2) {
            assert!(window[0] < window[1]);
        }
        assert_eq!(items.last(), Some(&100));
        assert_eq!(subscriber.terminal_count(), 1);
    }
}
