// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::collections::HashMap;

use rheo_core::{Flow, FlowError};
use rheo_flow::{from_iter, FlowExt};
use rheo_test_utils::TestSubscriber;

#[test]
fn test_to_list_collects_everything_in_order() {
    // Arrange
    let flow = from_iter(vec![3, 1, 2]).to_list();
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert: one emission carrying the whole list
    subscriber.assert_items(&[vec![3, 1, 2]]);
    subscriber.assert_completed();
}

#[test]
fn test_to_list_waits_for_demand() {
    // Arrange
    let flow = from_iter(vec![1, 2]).to_list();
    let subscriber = TestSubscriber::with_request(0);

    // Act
    flow.subscribe(subscriber.clone());

    // Assert: the aggregate is ready but gated on a request
    subscriber.assert_no_terminal();
    subscriber.request(1);
    subscriber.assert_items(&[vec![1, 2]]);
    subscriber.assert_completed();
}

#[test]
fn test_to_map_keys_by_selector() {
    // Arrange
    let words = vec![
        "a".to_string(),
        "bb".to_string(),
        "ccc".to_string(),
        "dddd".to_string(),
    ];
    let flow = from_iter(words).to_map(|word| Ok(word.len()));
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    let mut expected = HashMap::new();
    expected.insert(1, "a".to_string());
    expected.insert(2, "bb".to_string());
    expected.insert(3, "ccc".to_string());
    expected.insert(4, "dddd".to_string());
    subscriber.assert_items(std::slice::from_ref(&expected));
    subscriber.assert_completed();
}

#[test]
fn test_to_map_last_writer_wins_on_key_collision() {
    // Arrange
    let flow = from_iter(vec!["aa".to_string(), "bb".to_string()]).to_map(|word| Ok(word.len()));
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    let map = &subscriber.items()[0];
    assert_eq!(map.len(), 1);
    assert_eq!(map[&2], "bb");
}

#[test]
fn test_to_map_selector_failure_cancels_and_errors() {
    // Arrange
    let flow = from_iter(vec![1, 2, 3]).to_map(|n| {
        if *n == 2 {
            Err(FlowError::message("bad key"))
        } else {
            Ok(*n)
        }
    });
    let subscriber = TestSubscriber::new();

    // Act
    flow.subscribe(subscriber.clone());

    // Assert
    subscriber.assert_error_matches(|e| e.to_string().contains("bad key"));
}
