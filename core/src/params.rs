//! Call parameters and their three wire encodings.
//!
//! A `Parameters` map is rendered as a URL query string for GET, as a JSON
//! object body for every other method, or as `multipart/form-data` when it
//! holds at least one `Blob` and the method is not GET.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};
use url::form_urlencoded;

pub const DEFAULT_BLOB_FILE_NAME: &str = "image.jpeg";
pub const DEFAULT_BLOB_MIME_TYPE: &str = "image/jpeg";

/// Binary parameter, uploaded as a multipart file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl Blob {
    /// A JPEG image blob named `image.jpeg`.
    pub fn jpeg(data: impl Into<Vec<u8>>) -> Self {
        Blob {
            data: data.into(),
            file_name: DEFAULT_BLOB_FILE_NAME.to_string(),
            mime_type: DEFAULT_BLOB_MIME_TYPE.to_string(),
        }
    }

    pub fn new(data: impl Into<Vec<u8>>, file_name: &str, mime_type: &str) -> Self {
        Blob {
            data: data.into(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
        }
    }
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Number(Number),
    Bool(bool),
    Blob(Blob),
}

impl ParamValue {
    /// Textual rendering used in query strings and multipart text fields.
    ///
    /// Booleans render as `1`/`0`. Blobs have no textual form.
    fn as_text(&self) -> Option<String> {
        match self {
            ParamValue::Text(s) => Some(s.clone()),
            ParamValue::Number(n) => Some(n.to_string()),
            ParamValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            ParamValue::Blob(_) => None,
        }
    }

    fn as_json(&self) -> Option<Value> {
        match self {
            ParamValue::Text(s) => Some(Value::String(s.clone())),
            ParamValue::Number(n) => Some(Value::Number(n.clone())),
            ParamValue::Bool(b) => Some(Value::Bool(*b)),
            ParamValue::Blob(_) => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<Blob> for ParamValue {
    fn from(value: Blob) -> Self {
        ParamValue::Blob(value)
    }
}

/// Ordered parameter mapping. Keys iterate in sorted order so every encoding
/// is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(BTreeMap<String, ParamValue>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn has_blob(&self) -> bool {
        self.0.values().any(|v| matches!(v, ParamValue::Blob(_)))
    }

    /// `application/x-www-form-urlencoded` query string. Blobs are skipped.
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.0 {
            if let Some(text) = value.as_text() {
                serializer.append_pair(key, &text);
            }
        }
        serializer.finish()
    }

    /// JSON object body. Blobs are skipped.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .filter_map(|(key, value)| value.as_json().map(|json| (key.clone(), json)))
            .collect();
        Value::Object(map)
    }

    /// Encode as `multipart/form-data` with the given boundary.
    ///
    /// Returns the content-type header value and the body.
    pub fn to_multipart(&self, boundary: &str) -> (String, Vec<u8>) {
        let mut buf = Vec::new();
        for (key, value) in &self.0 {
            buf.extend_from_slice(b"--");
            buf.extend_from_slice(boundary.as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(b"Content-Disposition: form-data; name=\"");
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(b"\"");
            match value {
                ParamValue::Blob(blob) => {
                    buf.extend_from_slice(b"; filename=\"");
                    buf.extend_from_slice(blob.file_name.as_bytes());
                    buf.extend_from_slice(b"\"\r\nContent-Type: ");
                    buf.extend_from_slice(blob.mime_type.as_bytes());
                    buf.extend_from_slice(b"\r\n\r\n");
                    buf.extend_from_slice(&blob.data);
                }
                other => {
                    buf.extend_from_slice(b"\r\n\r\n");
                    if let Some(text) = other.as_text() {
                        buf.extend_from_slice(text.as_bytes());
                    }
                }
            }
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"--");
        buf.extend_from_slice(boundary.as_bytes());
        buf.extend_from_slice(b"--\r\n");

        (format!("multipart/form-data; boundary={boundary}"), buf)
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Parameters(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Boundary for a new multipart body.
pub(crate) fn generate_boundary() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    format!("----PrivacyCoreBoundary{timestamp:x}")
}
