//! Ready-made decode functions for the two payload shapes.
//!
//! A decode function maps the parsed JSON payload to `Some(value)` or to
//! `None` on a shape mismatch. A mismatch on a 2xx response is "no data",
//! never an error.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode a single object.
pub fn object<T: DeserializeOwned>(json: Value) -> Option<T> {
    serde_json::from_value(json).ok()
}

/// Decode an array of objects. Any element that fails to decode fails the
/// whole array.
pub fn array<T: DeserializeOwned>(json: Value) -> Option<Vec<T>> {
    match json {
        Value::Array(_) => serde_json::from_value(json).ok(),
        _ => None,
    }
}

/// Ignore the payload entirely.
pub fn nothing(_json: Value) -> Option<()> {
    None
}
