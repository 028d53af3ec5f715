//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

/// Generate a JSON scalar.
pub fn json_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| Number::from_f64(f).map_or(Value::Null, Value::Number)),
        ".{0,16}".prop_map(Value::String),
    ]
}

/// Generate an arbitrary JSON value up to a small depth.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_scalar().prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(".{0,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Generate a partition name that is already a valid storage key.
pub fn partition_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,23}".prop_map(String::from)
}

/// Generate any non-empty partition name, including characters that
/// sanitization rewrites.
pub fn raw_partition_name() -> impl Strategy<Value = String> {
    ".{1,24}".prop_map(String::from)
}

/// Generate a batch of payloads.
pub fn payloads(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(json_value(), 0..=max_len)
}
