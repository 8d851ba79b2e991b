//! Error types for the typed HTTP client.
//!
//! # Design
//! Errors are split by when they can happen:
//! - `ConfigError` once, while building the client at startup.
//! - `RequestError` synchronously, while building one request.
//! - `NetworkError` asynchronously, as the failure half of an `Outcome`.
//!
//! Only `NetworkError` ever crosses the async boundary, and it is delivered as
//! a value through the normal completion path.

use std::error::Error as StdError;

use thiserror::Error;

/// Invalid client configuration, detected once at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base URL `{0}` cannot have relative paths resolved against it")]
    NotHierarchical(String),

    #[error("no Tokio runtime available to deliver responses on")]
    NoRuntime,
}

/// A request that could not be built.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("path `{path}` does not form a valid URL with the base URL: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("parameters could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by a `Transport` or while reading what it returned.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, TLS, IO, timeout).
    #[error("{0}")]
    Connection(#[source] Box<dyn StdError + Send + Sync>),

    /// The status line arrived but the body could not be read.
    #[error("failed to read response body (status {status}): {source}")]
    Body {
        status: u16,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A response arrived but its body is not JSON.
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The background worker running the transport went away.
    #[error("transport worker failed: {0}")]
    Task(String),
}

impl TransportError {
    pub fn connection(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        TransportError::Connection(error.into())
    }

    /// Status code of the response, when one was received before the failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Body { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Message used when a non-2xx response carries no usable error payload.
pub const GENERIC_ERROR_MESSAGE: &str = "Error";

/// The normalized failure of one network call.
///
/// `status` is set whenever a response was received. `underlying` keeps the
/// transport-level cause for logging and is absent for plain HTTP errors.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct NetworkError {
    pub message: String,
    pub status: Option<u16>,
    #[source]
    pub underlying: Option<TransportError>,
}

impl NetworkError {
    /// A non-2xx response, with the server's message or the generic one.
    pub fn http(status: u16, message: Option<String>) -> Self {
        NetworkError {
            message: message.unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
            status: Some(status),
            underlying: None,
        }
    }

    /// A transport-level failure; `status` is kept when a response arrived.
    pub fn transport(error: TransportError, status: Option<u16>) -> Self {
        NetworkError {
            message: error.to_string(),
            status,
            underlying: Some(error),
        }
    }

    pub fn is_transport(&self) -> bool {
        self.underlying.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_falls_back_to_generic_message() {
        let err = NetworkError::http(500, None);
        assert_eq!(err.message, "Error");
        assert_eq!(err.status, Some(500));
        assert!(!err.is_transport());
        assert_eq!(err.to_string(), "Error");
    }

    #[test]
    fn transport_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = NetworkError::transport(TransportError::connection(io), None);
        assert_eq!(err.message, "connection refused");
        assert!(err.status.is_none());
        assert!(err.is_transport());
        assert!(StdError::source(&err).is_some());
    }
}
