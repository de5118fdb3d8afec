//! Tests for tolerant comparison.

use super::*;
use serde_json::json;

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn test_number_equals_numeric_string() {
    assert!(values_equal(&json!(100), &json!("100")));
    assert!(values_equal(&json!("100.50"), &json!(100.5)));
    assert!(!values_equal(&json!(100), &json!("101")));
    assert!(!values_equal(&json!(100), &json!("abc")));
}

#[test]
fn test_arrays_are_order_independent() {
    assert!(values_equal(&json!(["a", "b"]), &json!(["b", "a"])));
    assert!(values_equal(&json!([1, "2", 3]), &json!(["3", 2, 1])));
    assert!(!values_equal(&json!(["a", "b"]), &json!(["a", "c"])));
    assert!(!values_equal(&json!(["a"]), &json!(["a", "a"])));
}

#[test]
fn test_nested_objects() {
    let a = json!({"maxLoss": 500, "maxTrades": "3"});
    let b = json!({"maxTrades": 3, "maxLoss": "500"});
    assert!(values_equal(&a, &b));

    let missing_key = json!({"maxLoss": 500});
    assert!(!values_equal(&a, &missing_key));
}

#[test]
fn test_bool_tolerates_string() {
    assert!(values_equal(&json!(true), &json!("true")));
    assert!(!values_equal(&json!(false), &json!("true")));
}

#[test]
fn test_field_equal_normalizes_timestamps() {
    let wrapper = json!({"seconds": 1_709_303_400, "nanoseconds": 0});
    let iso = json!("2024-03-01T14:30:00.000Z");
    assert!(field_equal(FieldKind::Timestamp, &wrapper, &iso));
    assert!(field_equal(FieldKind::Date, &json!("2024-03-01"), &wrapper));
    assert!(!field_equal(FieldKind::Date, &json!("2024-03-02"), &wrapper));
}

#[test]
fn test_diff_records_tolerates_representation() {
    let source = doc(json!({
        "symbol": "AAPL",
        "direction": "long",
        "entryPrice": "100",
        "tags": ["a", "b"],
        "entryTime": {"seconds": 1_709_303_400, "nanoseconds": 0}
    }));
    let target = doc(json!({
        "symbol": "AAPL",
        "direction": "long",
        "entry_price": 100,
        "tags": ["b", "a"],
        "entry_time": "2024-03-01T14:30:00.000Z"
    }));

    assert!(diff_records(EntityType::Trade, &source, &target).is_empty());
}

#[test]
fn test_diff_records_reports_single_field() {
    let source = doc(json!({"symbol": "AAPL", "tags": ["a", "b"]}));
    let target = doc(json!({"symbol": "AAPL", "tags": ["a", "c"]}));

    let diffs = diff_records(EntityType::Trade, &source, &target);

    assert_eq!(diffs.len(), 1);
    assert_eq!(diffs[0].field, "tags");
    assert_eq!(diffs[0].source_value, json!(["a", "b"]));
    assert_eq!(diffs[0].target_value, json!(["a", "c"]));
}

#[test]
fn test_null_equals_absent() {
    let source = doc(json!({"symbol": "AAPL", "exitPrice": null}));
    let target = doc(json!({"symbol": "AAPL"}));
    assert!(diff_records(EntityType::Trade, &source, &target).is_empty());
}

#[test]
fn test_diff_records_ignores_non_compared_fields() {
    let source = doc(json!({"title": "Day 1", "userId": "u1"}));
    let target = doc(json!({"title": "Day 1", "user_id": "someone-else"}));
    assert!(diff_records(EntityType::JournalEntry, &source, &target).is_empty());
}

#[test]
fn test_field_equal_reads_naive_iso_as_utc() {
    let wrapper = json!({"seconds": 1_709_303_400});
    assert!(field_equal(FieldKind::Timestamp, &wrapper, &json!("2024-03-01T14:30:00")));
    assert!(!field_equal(FieldKind::Timestamp, &wrapper, &json!("2024-03-01T14:31:00")));
}

#[test]
fn test_arrays_of_objects_with_mixed_number_spelling() {
    let source = json!([{"price": "100"}, {"price": 99}]);
    let target = json!([{"price": 100}, {"price": "99"}]);
    assert!(values_equal(&source, &target));

    let levels = json!([{"label": "R1", "price": "101.5"}, {"label": "S1", "price": 98}]);
    let swapped = json!([{"label": "S1", "price": "98"}, {"label": "R1", "price": 101.5}]);
    assert!(values_equal(&levels, &swapped));

    let changed = json!([{"price": 100}, {"price": "98"}]);
    assert!(!values_equal(&source, &changed));
}
