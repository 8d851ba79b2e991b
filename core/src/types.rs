//! Response DTOs.
//!
//! Fields are optional so a partially matching payload still decodes; the
//! caller decides what a missing field means.

use serde::{Deserialize, Serialize};

/// Payload of `GET help/privacy`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Privacy {
    #[serde(rename = "status_code", default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub body: Option<String>,
}

impl Privacy {
    /// The HTML fragment, only when the payload reports status 200.
    pub fn html(&self) -> Option<&str> {
        match self.status {
            Some(200) => self.body.as_deref(),
            _ => None,
        }
    }
}

/// Error payload shape: `{"error": {"message": "..."}}`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorPayload {
    pub fn message(self) -> Option<String> {
        self.error.and_then(|e| e.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_decodes_status_code_and_body() {
        let privacy: Privacy =
            serde_json::from_str(r#"{"status_code":200,"body":"<p>hi</p>"}"#).unwrap();
        assert_eq!(privacy.status, Some(200));
        assert_eq!(privacy.body.as_deref(), Some("<p>hi</p>"));
        assert_eq!(privacy.html(), Some("<p>hi</p>"));
    }

    #[test]
    fn privacy_html_requires_status_200() {
        let privacy = Privacy {
            status: Some(500),
            body: Some("<p>oops</p>".to_string()),
        };
        assert_eq!(privacy.html(), None);
        assert_eq!(Privacy::default().html(), None);
    }

    #[test]
    fn error_payload_message() {
        let payload: ErrorPayload =
            serde_json::from_str(r#"{"error":{"message":"Not Found"}}"#).unwrap();
        assert_eq!(payload.message().as_deref(), Some("Not Found"));

        let payload: ErrorPayload = serde_json::from_str(r#"{"detail":"nope"}"#).unwrap();
        assert_eq!(payload.message(), None);
    }
}
