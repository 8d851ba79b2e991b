//! Typed HTTP client core for the privacy-policy API.
//!
//! # Overview
//! Issues one JSON request per call and delivers exactly one `Outcome`: a
//! decoded value, an empty success, or a normalized `NetworkError`. Delivery
//! is either a callback (`TypedClient::send_with`) or a future
//! (`TypedClient::send`), and every in-flight request can be aborted.
//!
//! # Design
//! - `ClientConfig` is validated once and shared read-only.
//! - The pipeline is split into `build_request` and `classify`, both pure,
//!   with the `Transport` trait in between.
//! - `UreqTransport` is the default transport; tests swap in scripted ones.
//! - Response DTOs use optional fields, so decoding partial payloads works and
//!   shape mismatches surface as `None` rather than errors.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod handle;
pub mod http;
pub mod params;
pub mod transport;
pub mod types;

pub use client::{Outcome, TypedClient, PRIVACY_PATH};
pub use config::ClientConfig;
pub use error::{ConfigError, NetworkError, RequestError, TransportError};
pub use handle::{PendingRequest, RequestHandle};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use params::{Blob, ParamValue, Parameters};
pub use transport::{Transport, UreqTransport};
pub use types::{ErrorPayload, Privacy};
