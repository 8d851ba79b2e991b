//! The HTTP transport seam and its default `ureq` implementation.

use async_trait::async_trait;
use ureq::{Agent, RequestBuilder};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Largest response body read into memory.
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Executes one `HttpRequest`.
///
/// Implementations must return every received response as `Ok`, whatever its
/// status code. `Err` is reserved for requests that produced no response, and
/// for bodies that could not be read, which report the status through
/// `TransportError::Body`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking `ureq` agent driven from Tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout())
            .build()
            .new_agent();
        Self { agent }
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| TransportError::Task(e.to_string()))?
    }
}

fn execute_blocking(agent: &Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
    } = request;

    let result = match (method, body) {
        (HttpMethod::Get, _) => with_headers(agent.get(&url), &headers).call(),
        (HttpMethod::Delete, None) => with_headers(agent.delete(&url), &headers).call(),
        (HttpMethod::Delete, Some(body)) => with_headers(agent.delete(&url), &headers)
            .force_send_body()
            .send(&body[..]),
        (HttpMethod::Post, Some(body)) => with_headers(agent.post(&url), &headers).send(&body[..]),
        (HttpMethod::Post, None) => with_headers(agent.post(&url), &headers).send_empty(),
        (HttpMethod::Put, Some(body)) => with_headers(agent.put(&url), &headers).send(&body[..]),
        (HttpMethod::Put, None) => with_headers(agent.put(&url), &headers).send_empty(),
        (HttpMethod::Patch, Some(body)) => {
            with_headers(agent.patch(&url), &headers).send(&body[..])
        }
        (HttpMethod::Patch, None) => with_headers(agent.patch(&url), &headers).send_empty(),
    };

    let mut response = result.map_err(TransportError::connection)?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let bytes = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()
        .map_err(|e| TransportError::Body {
            status,
            source: e.into(),
        })?;
    let body = String::from_utf8_lossy(&bytes).into_owned();

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

fn with_headers<B>(
    mut builder: RequestBuilder<B>,
    headers: &[(String, String)],
) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
