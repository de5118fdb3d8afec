//! Type-tolerant comparison of field values across the two stores.
//!
//! The stores disagree on representation more often than on content: a price
//! saved as `"100"` in one and `100` in the other, tags in a different order,
//! timestamps as wrappers on one side and ISO strings on the other. These
//! rules decide when two values mean the same thing:
//!
//! - numbers and numeric strings compare as `f64`;
//! - arrays must have equal length and are compared after sorting each side;
//! - objects must have the same key set and equal values per key;
//! - timestamps are normalized by field kind before comparison;
//! - `null` and an absent field are the same.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::entity::{EntityType, FieldKind};
use crate::record::Document;
use crate::timestamp;

const FLOAT_TOLERANCE: f64 = 1e-9;

/// One mismatching field between a source and a target record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDifference {
    /// Target field name.
    pub field: String,
    /// Value on the source side (normalized for timestamps).
    pub source_value: Value,
    /// Value on the target side (normalized for timestamps).
    pub target_value: Value,
}

/// Compares two values using the tolerant rules.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Number(_) | Value::String(_), Value::Number(_) | Value::String(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => numbers_equal(x, y),
                _ => a == b,
            }
        }
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            s.trim().eq_ignore_ascii_case(if *x { "true" } else { "false" })
        }
        (Value::Array(xs), Value::Array(ys)) => arrays_equal(xs, ys),
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Compares two values of a schema field, normalizing timestamps first.
#[must_use]
pub fn field_equal(kind: FieldKind, a: &Value, b: &Value) -> bool {
    match kind {
        FieldKind::Timestamp | FieldKind::Date => {
            let date_only = kind == FieldKind::Date;
            values_equal(
                &timestamp::normalize(a, date_only),
                &timestamp::normalize(b, date_only),
            )
        }
        _ => values_equal(a, b),
    }
}

/// Compares the entity's validation fields of a source document (source
/// naming) against a target document (target naming).
#[must_use]
pub fn diff_records(entity: EntityType, source: &Document, target: &Document) -> Vec<FieldDifference> {
    let schema = entity.schema();
    schema
        .compare_fields
        .iter()
        .filter_map(|name| schema.by_target(name))
        .filter_map(|spec| {
            let a = source.get(spec.source).unwrap_or(&Value::Null);
            let b = target.get(spec.target).unwrap_or(&Value::Null);
            difference(spec.kind, spec.target, a, b)
        })
        .collect()
}

/// Compares every schema field of two documents in source naming.
#[must_use]
pub fn diff_source_documents(
    entity: EntityType,
    before: &Document,
    after: &Document,
) -> Vec<FieldDifference> {
    entity
        .schema()
        .fields
        .iter()
        .filter_map(|spec| {
            let a = before.get(spec.source).unwrap_or(&Value::Null);
            let b = after.get(spec.source).unwrap_or(&Value::Null);
            difference(spec.kind, spec.source, a, b)
        })
        .collect()
}

fn difference(kind: FieldKind, field: &str, a: &Value, b: &Value) -> Option<FieldDifference> {
    if field_equal(kind, a, b) {
        return None;
    }
    let (source_value, target_value) = match kind {
        FieldKind::Timestamp | FieldKind::Date => {
            let date_only = kind == FieldKind::Date;
            (
                timestamp::normalize(a, date_only),
                timestamp::normalize(b, date_only),
            )
        }
        _ => (a.clone(), b.clone()),
    };
    Some(FieldDifference {
        field: field.to_string(),
        source_value,
        target_value,
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn numbers_equal(x: f64, y: f64) -> bool {
    let scale = x.abs().max(y.abs()).max(1.0);
    (x - y).abs() <= FLOAT_TOLERANCE * scale
}

fn arrays_equal(xs: &[Value], ys: &[Value]) -> bool {
    if xs.len() != ys.len() {
        return false;
    }
    let mut xs: Vec<&Value> = xs.iter().collect();
    let mut ys: Vec<&Value> = ys.iter().collect();
    xs.sort_by(|a, b| sort_order(a, b));
    ys.sort_by(|a, b| sort_order(a, b));
    if xs.iter().zip(&ys).all(|(x, y)| values_equal(x, y)) {
        return true;
    }
    // Sorting cannot line up elements whose nested numbers are spelled
    // differently, so fall back to pairing each element with an unused equal.
    let mut used = vec![false; ys.len()];
    xs.iter().all(|x| {
        let partner = ys
            .iter()
            .enumerate()
            .position(|(i, y)| !used[i] && values_equal(x, y));
        match partner {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Total order used to line up array elements before comparing them.
/// Numbers and numeric strings sort together so `[1, "2"]` lines up with
/// `["1", 2]`. Nested values sort by a text form with numeric strings written
/// as numbers.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => canonical(a).cmp(&canonical(b)),
    }
}

fn canonical(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => number_blind(other).to_string(),
    }
}

fn number_blind(value: &Value) -> Value {
    match value {
        Value::String(_) | Value::Number(_) => match as_number(value) {
            Some(n) => serde_json::Number::from_f64(n).map_or_else(|| value.clone(), Value::Number),
            None => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(number_blind).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), number_blind(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "compare_tests.rs"]
mod tests;
