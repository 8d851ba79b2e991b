//! Typed request/response pipeline.
//!
//! # Design
//! `TypedClient` holds an immutable `ClientConfig`, a shared `Transport` and
//! the Tokio runtime that completions are delivered on. One call goes through
//! three steps:
//! - `build_request` turns method, path and parameters into an `HttpRequest`
//!   (synchronous, may fail with `RequestError`).
//! - the transport executes it on a background worker.
//! - `classify` turns the transport result into exactly one `Outcome`.
//!
//! The build and classify steps are pure and public, so a host that does its
//! own I/O can reuse them without the transport.

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::decode;
use crate::error::{ConfigError, NetworkError, RequestError, TransportError};
use crate::handle::{PendingRequest, RequestHandle};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::params::{generate_boundary, Parameters};
use crate::transport::{Transport, UreqTransport};
use crate::types::{ErrorPayload, Privacy};

/// Result of one call: `Ok(Some(value))`, `Ok(None)` when the response had no
/// usable payload, or the normalized failure.
pub type Outcome<T> = Result<Option<T>, NetworkError>;

pub const PRIVACY_PATH: &str = "help/privacy";

/// Client for typed JSON calls against one base URL.
#[derive(Clone)]
pub struct TypedClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    runtime: Handle,
}

impl TypedClient {
    /// Client using the `ureq` transport and the current Tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = UreqTransport::new(&config);
        Self::with_transport(config, transport)
    }

    /// Client using a caller-supplied transport and the current Tokio runtime.
    pub fn with_transport(
        config: ClientConfig,
        transport: impl Transport,
    ) -> Result<Self, ConfigError> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            runtime,
        })
    }

    /// Deliver completions on `runtime` instead of the one captured at
    /// construction.
    pub fn on_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the request for one call.
    ///
    /// GET parameters go to the query string. Other methods send a JSON
    /// object, or a multipart body when any parameter is a `Blob`.
    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Parameters,
    ) -> Result<HttpRequest, RequestError> {
        let mut url = self.config.resolve(path)?;
        let mut headers = self.config.default_headers().to_vec();

        let body = match method {
            HttpMethod::Get => {
                if params.has_blob() {
                    warn!(%url, "binary parameters are not sent with GET requests");
                }
                let encoded = params.to_query();
                if !encoded.is_empty() {
                    let query = match url.query() {
                        Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
                        _ => encoded,
                    };
                    url.set_query(Some(&query));
                }
                None
            }
            _ if params.has_blob() => {
                let (content_type, body) = params.to_multipart(&generate_boundary());
                headers.push(("content-type".to_string(), content_type));
                Some(body)
            }
            _ if params.is_empty() => None,
            _ => {
                let body = serde_json::to_vec(&params.to_json())?;
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(body)
            }
        };

        Ok(HttpRequest {
            method,
            url: url.into(),
            headers,
            body,
        })
    }

    /// Turn a transport result into an `Outcome`.
    ///
    /// - 2xx with JSON: `decode` decides between `Some` and `None`.
    /// - 2xx with an empty body: `Ok(None)`.
    /// - 2xx with a body that is not JSON: transport failure.
    /// - other statuses: the payload's `error.message`, else `"Error"`, also
    ///   when the body could not be read.
    pub fn classify<T, D>(result: Result<HttpResponse, TransportError>, decode: D) -> Outcome<T>
    where
        D: FnOnce(Value) -> Option<T>,
    {
        let response = match result {
            Ok(response) => response,
            Err(error) => {
                return match error.status() {
                    Some(status) if !(200..300).contains(&status) => {
                        Err(NetworkError::http(status, None))
                    }
                    status => Err(NetworkError::transport(error, status)),
                };
            }
        };

        if !response.is_success() {
            let message = serde_json::from_str::<ErrorPayload>(&response.body)
                .ok()
                .and_then(ErrorPayload::message);
            return Err(NetworkError::http(response.status, message));
        }

        if response.body.is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(json) => Ok(decode(json)),
            Err(e) => Err(NetworkError::transport(
                TransportError::InvalidJson(e),
                Some(response.status),
            )),
        }
    }

    /// Issue one request and pass its outcome to `done`.
    ///
    /// `done` runs on the client's runtime, at most once, and never after the
    /// returned handle has been aborted. Aborting before the spawned task first
    /// runs keeps the request from being sent; later aborts only drop the
    /// outcome.
    pub fn send_with<T, D, F>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Parameters,
        decode: D,
        done: F,
    ) -> Result<RequestHandle, RequestError>
    where
        T: Send + 'static,
        D: FnOnce(Value) -> Option<T> + Send + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let request = self.build_request(method, path, params)?;
        debug!(
            url = %request.url,
            %method,
            params = ?params.keys().collect::<Vec<_>>(),
            "sending request"
        );

        let handle = RequestHandle::new();
        let state = handle.clone();
        let transport = Arc::clone(&self.transport);

        let task = self.runtime.spawn(async move {
            if !state.is_pending() {
                debug!(url = %request.url, "request aborted before dispatch");
                return;
            }
            let url = request.url.clone();
            let result = transport.execute(request).await;
            match &result {
                Ok(response) => debug!(
                    %url,
                    status = response.status,
                    bytes = response.body.len(),
                    "received response"
                ),
                Err(error) => warn!(%url, %error, "transport failure"),
            }

            let outcome = Self::classify(result, decode);
            if state.claim() {
                done(outcome);
            } else {
                debug!(%url, "dropping outcome of aborted request");
            }
        });
        handle.attach(task.abort_handle());

        Ok(handle)
    }

    /// Issue one request and return a future-style handle for its outcome.
    pub fn send<T, D>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Parameters,
        decode: D,
    ) -> Result<PendingRequest<T>, RequestError>
    where
        T: Send + 'static,
        D: FnOnce(Value) -> Option<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = self.send_with(method, path, params, decode, move |outcome| {
            let _ = tx.send(outcome);
        })?;
        Ok(PendingRequest::new(handle, rx))
    }

    /// Issue a request whose payload is ignored; only success matters.
    pub fn send_empty_with<F>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Parameters,
        done: F,
    ) -> Result<RequestHandle, RequestError>
    where
        F: FnOnce(Result<(), NetworkError>) + Send + 'static,
    {
        self.send_with(method, path, params, decode::nothing, move |outcome| {
            done(outcome.map(|_| ()))
        })
    }

    /// Future-style `send_empty_with`. Success is always `Ok(None)`.
    pub fn send_empty(
        &self,
        method: HttpMethod,
        path: &str,
        params: &Parameters,
    ) -> Result<PendingRequest<()>, RequestError> {
        self.send(method, path, params, decode::nothing)
    }

    /// Fetch the privacy policy.
    pub fn privacy(&self) -> Result<PendingRequest<Privacy>, RequestError> {
        self.send(
            HttpMethod::Get,
            PRIVACY_PATH,
            &Parameters::new(),
            decode::object::<Privacy>,
        )
    }
}

impl std::fmt::Debug for TypedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CONSUMER_KEY_HEADER, CONSUMER_SECRET_HEADER};
    use crate::params::Blob;
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Task("unreachable".to_string()))
        }
    }

    fn client() -> TypedClient {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        let config = ClientConfig::new("http://localhost:3000/api/rest/").unwrap();
        TypedClient::with_transport(config, Unreachable).unwrap()
    }

    fn response(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }

    #[test]
    fn new_without_runtime_fails() {
        let config = ClientConfig::new("http://localhost:3000/").unwrap();
        let err = TypedClient::with_transport(config, Unreachable).unwrap_err();
        assert!(matches!(err, ConfigError::NoRuntime));
    }

    #[test]
    fn get_without_params_has_no_query_or_body() {
        let req = client()
            .build_request(HttpMethod::Get, PRIVACY_PATH, &Parameters::new())
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/api/rest/help/privacy");
        assert!(req.body.is_none());
        assert_eq!(req.header(CONSUMER_KEY_HEADER), Some(""));
        assert_eq!(req.header(CONSUMER_SECRET_HEADER), Some(""));
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn get_params_are_url_encoded() {
        let params = Parameters::new().with("page", 2).with("q", "a b");
        let req = client()
            .build_request(HttpMethod::Get, "posts", &params)
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/rest/posts?page=2&q=a+b");
        assert!(req.body.is_none());
    }

    #[test]
    fn get_params_extend_existing_query() {
        let params = Parameters::new().with("page", 2);
        let req = client()
            .build_request(HttpMethod::Get, "posts?sort=new", &params)
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/rest/posts?sort=new&page=2");
    }

    #[test]
    fn post_params_are_json_encoded() {
        let params = Parameters::new().with("title", "Hello");
        let req = client()
            .build_request(HttpMethod::Post, "posts", &params)
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"title": "Hello"}));
    }

    #[test]
    fn post_without_params_has_no_body() {
        let req = client()
            .build_request(HttpMethod::Post, "posts", &Parameters::new())
            .unwrap();
        assert!(req.body.is_none());
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn blob_switches_to_multipart() {
        let params = Parameters::new()
            .with("caption", "hi")
            .with("photo", Blob::jpeg(vec![1, 2, 3]));
        let req = client()
            .build_request(HttpMethod::Post, "pictures", &params)
            .unwrap();
        let content_type = req.header("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = req.body.unwrap();
        let needle = b"filename=\"image.jpeg\"";
        assert!(body.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn blob_with_get_stays_in_query_path() {
        let params = Parameters::new().with("photo", Blob::jpeg(vec![1]));
        let req = client()
            .build_request(HttpMethod::Get, "pictures", &params)
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/api/rest/pictures");
        assert!(req.body.is_none());
    }

    #[test]
    fn invalid_path_is_a_request_error() {
        let err = client()
            .build_request(HttpMethod::Get, "http://[::1", &Parameters::new())
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidPath { .. }));
    }

    #[test]
    fn classify_success_decodes_payload() {
        let outcome = TypedClient::classify(
            response(200, r#"{"status_code":200,"body":"<h1>Privacy</h1>"}"#),
            decode::object::<Privacy>,
        );
        let privacy = outcome.unwrap().unwrap();
        assert_eq!(privacy.status, Some(200));
        assert_eq!(privacy.body.as_deref(), Some("<h1>Privacy</h1>"));
    }

    #[test]
    fn classify_decode_mismatch_is_empty_success() {
        let outcome = TypedClient::classify(
            response(200, r#"{"status_code":"x"}"#),
            decode::object::<Privacy>,
        );
        assert!(outcome.unwrap().is_none());
    }

    #[test]
    fn classify_error_payload_message() {
        let err = TypedClient::classify(
            response(404, r#"{"error":{"message":"Not Found"}}"#),
            decode::object::<Privacy>,
        )
        .unwrap_err();
        assert_eq!(err.message, "Not Found");
        assert_eq!(err.status, Some(404));
        assert!(err.underlying.is_none());
    }

    #[test]
    fn classify_unmatched_error_payload_is_generic() {
        for body in [r#"{"detail":"x"}"#, "internal error", ""] {
            let err = TypedClient::classify(response(500, body), decode::object::<Privacy>)
                .unwrap_err();
            assert_eq!(err.message, "Error", "body: {body:?}");
            assert_eq!(err.status, Some(500));
        }
    }

    #[test]
    fn classify_empty_2xx_is_empty_success() {
        let outcome = TypedClient::classify(response(204, ""), decode::object::<Privacy>);
        assert!(outcome.unwrap().is_none());
    }

    #[test]
    fn classify_non_json_2xx_is_transport_failure() {
        let err = TypedClient::classify(response(200, "<html>"), decode::object::<Privacy>)
            .unwrap_err();
        assert_eq!(err.status, Some(200));
        assert!(matches!(err.underlying, Some(TransportError::InvalidJson(_))));
    }

    #[test]
    fn classify_unreadable_error_body_is_generic() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "truncated body");
        let err = TypedClient::classify(
            Err(TransportError::Body {
                status: 404,
                source: io.into(),
            }),
            decode::object::<Privacy>,
        )
        .unwrap_err();
        assert_eq!(err.message, "Error");
        assert_eq!(err.status, Some(404));
    }

    #[test]
    fn classify_unreadable_success_body_keeps_status() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "body over limit");
        let err = TypedClient::classify(
            Err(TransportError::Body {
                status: 200,
                source: io.into(),
            }),
            decode::object::<Privacy>,
        )
        .unwrap_err();
        assert_eq!(err.status, Some(200));
        assert!(matches!(err.underlying, Some(TransportError::Body { .. })));
    }

    #[test]
    fn classify_connection_failure_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = TypedClient::classify(
            Err(TransportError::connection(io)),
            decode::object::<Privacy>,
        )
        .unwrap_err();
        assert_eq!(err.message, "connection refused");
        assert!(err.status.is_none());
        assert!(matches!(err.underlying, Some(TransportError::Connection(_))));
    }
}
