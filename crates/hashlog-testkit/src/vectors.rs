//! Golden test vectors for deterministic verification.
//!
//! Expected hashes were produced by an independent encoder that sorts keys,
//! uses compact separators and escapes all non-ASCII. Any implementation
//! writing compatible partitions must reproduce them exactly.

use hashlog_core::{Entry, EntryBuilder, GENESIS_HASH};
use serde_json::Value;

const TS: &str = "2024-06-15T12:30:45.123456+00:00";

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub seq: u64,
    pub timestamp: &'static str,
    pub partition: &'static str,
    pub prev_hash: &'static str,
    /// Payload as JSON text.
    pub data: &'static str,
    /// Expected entry hash (hex).
    pub expected_hash: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "genesis entry",
            seq: 0,
            timestamp: "2024-01-01T00:00:00.000000+00:00",
            partition: "p",
            prev_hash: GENESIS_HASH,
            data: r#"{"a":1}"#,
            expected_hash: "ed6cb7947ba67614a6e5175e887ea51d8abc8d72aa3bc364f5c6a7823d96e77a",
        },
        GoldenVector {
            name: "second entry chained to genesis",
            seq: 1,
            timestamp: "2024-01-01T00:00:01.000000+00:00",
            partition: "p",
            prev_hash: "ed6cb7947ba67614a6e5175e887ea51d8abc8d72aa3bc364f5c6a7823d96e77a",
            data: r#"{"b":2}"#,
            expected_hash: "15d3ffc0694cff9e526201fe8282d16ce7d8ffa32e600ac77ba22eb6f5d1efbb",
        },
        GoldenVector {
            name: "nested object with unsorted keys",
            seq: 0,
            timestamp: TS,
            partition: "users",
            prev_hash: GENESIS_HASH,
            data: r#"{"user":"alice","action":"login","tags":["a","b"],"nested":{"z":null,"y":true,"x":false}}"#,
            expected_hash: "0105203f3cb41faadc54d9dd0573b39681a449886f03f0805423d64649ed7f79",
        },
        GoldenVector {
            name: "float formatting",
            seq: 7,
            timestamp: TS,
            partition: "orders",
            prev_hash: GENESIS_HASH,
            data: r#"{"order_id":123,"total":99.99,"tiny":1e-05,"big":1e16,"neg":-0.0,"whole":1.0,"small":0.0001,"e":1.5e300}"#,
            expected_hash: "20718cdb704ee9ee93e24085e04ea59c30df5091807bf50ef3675f50bc7e3176",
        },
        GoldenVector {
            name: "string escapes and non-ascii partition",
            seq: 2,
            timestamp: TS,
            partition: "café",
            prev_hash: GENESIS_HASH,
            data: r#"{"msg":"héllo \"q\" \\ \n\t\u0001 😀 \u007f"}"#,
            expected_hash: "29ea9fa7c7d4d504c675f77f669037af2663e50f739021e86b7869151994ad7a",
        },
        GoldenVector {
            name: "array payload",
            seq: 3,
            timestamp: TS,
            partition: "p",
            prev_hash: GENESIS_HASH,
            data: r#"[1,"two",null,[],{}]"#,
            expected_hash: "18a1b16318485d348117b39e5b34540788835a1c6d30a0f0833f7982083be08a",
        },
        GoldenVector {
            name: "string payload",
            seq: 4,
            timestamp: TS,
            partition: "p",
            prev_hash: GENESIS_HASH,
            data: r#""just a string""#,
            expected_hash: "fa02dd48320209b96b6cbbd922d3b276339d991ded4a4f8c599cf1ffcba823cd",
        },
        GoldenVector {
            name: "negative integer payload",
            seq: 5,
            timestamp: TS,
            partition: "p",
            prev_hash: GENESIS_HASH,
            data: "-42",
            expected_hash: "8f56444a76ee4c7faeacc609a755e6c9e05d80ac6da478d37335bcf067d573b9",
        },
        GoldenVector {
            name: "integers beyond 64 bits",
            seq: 6,
            timestamp: TS,
            partition: "ledger",
            prev_hash: GENESIS_HASH,
            data: r#"{"big":18446744073709551616,"neg":-9223372036854775809,"max":18446744073709551615,"huge":100000000000000000000,"neg_zero":-0,"ratio":0.5}"#,
            expected_hash: "4af34493952ecd65ea3350b542f53832022bd31a7b41ef094569d9b5375e020c",
        },
    ]
}

/// Build the entry a vector describes.
///
/// # Panics
///
/// Panics if the vector's payload is not valid JSON.
pub fn entry_from_vector(vector: &GoldenVector) -> Entry {
    let data: Value = serde_json::from_str(vector.data)
        .unwrap_or_else(|e| panic!("vector '{}' has invalid JSON: {}", vector.name, e));
    EntryBuilder::new(vector.seq, vector.partition, vector.prev_hash)
        .timestamp(vector.timestamp)
        .data(data)
        .build()
}

/// Check every vector, returning `(name, matches, computed_hash)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hash = entry_from_vector(v).hash;
            (v.name.to_string(), hash == v.expected_hash, hash)
        })
        .collect()
}
