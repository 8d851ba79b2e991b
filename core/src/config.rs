//! Immutable client configuration, validated once at startup.

use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, RequestError};

pub const CONSUMER_KEY_HEADER: &str = "oauth_consumer_key";
pub const CONSUMER_SECRET_HEADER: &str = "oauth_consumer_secret";

/// Base URL, headers sent on every request, and the transport timeout.
///
/// Built once and shared read-only by every request of a `TypedClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: Url,
    default_headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Parse and validate `base_url`.
    ///
    /// A trailing `/` is added when missing so that relative paths extend the
    /// base path instead of replacing its last segment. The two consumer
    /// credential headers start out empty.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let mut url = Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::NotHierarchical(base_url.to_string()));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            default_headers: vec![
                (CONSUMER_SECRET_HEADER.to_string(), String::new()),
                (CONSUMER_KEY_HEADER.to_string(), String::new()),
            ],
            timeout: None,
        })
    }

    /// Set a default header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers
            .retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.default_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    /// Fill in the consumer key/secret credential headers.
    pub fn with_consumer_credentials(self, key: &str, secret: &str) -> Self {
        self.with_header(CONSUMER_KEY_HEADER, key)
            .with_header(CONSUMER_SECRET_HEADER, secret)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolve `path` against the base URL with relative-reference rules.
    pub fn resolve(&self, path: &str) -> Result<Url, RequestError> {
        self.base_url
            .join(path)
            .map_err(|source| RequestError::InvalidPath {
                path: path.to_string(),
                source,
            })
    }

    /// Location of an uploaded picture, or `None` when there is no id.
    pub fn picture_url(&self, image_id: &str) -> Option<Url> {
        if image_id.is_empty() {
            return None;
        }
        self.resolve(&format!("pictures/{image_id}")).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_added() {
        let config = ClientConfig::new("http://localhost:3000/api/rest").unwrap();
        assert_eq!(config.base_url().as_str(), "http://localhost:3000/api/rest/");
        assert_eq!(
            config.resolve("help/privacy").unwrap().as_str(),
            "http://localhost:3000/api/rest/help/privacy"
        );
    }

    #[test]
    fn rejects_unparsable_base() {
        let err = ClientConfig::new("not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn rejects_opaque_base() {
        let err = ClientConfig::new("mailto:someone@example.com").unwrap_err();
        assert!(matches!(err, ConfigError::NotHierarchical(_)));
    }

    #[test]
    fn default_headers_hold_empty_credentials() {
        let config = ClientConfig::new("https://example.com/api/rest/").unwrap();
        let names: Vec<&str> = config
            .default_headers()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert!(names.contains(&CONSUMER_KEY_HEADER));
        assert!(names.contains(&CONSUMER_SECRET_HEADER));
        assert!(config.default_headers().iter().all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn with_header_replaces_case_insensitively() {
        let config = ClientConfig::new("https://example.com/")
            .unwrap()
            .with_header("Accept", "text/html")
            .with_header("accept", "application/json");
        let accepts: Vec<_> = config
            .default_headers()
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("accept"))
            .collect();
        assert_eq!(accepts.len(), 1);
        assert_eq!(accepts[0].1, "application/json");
    }

    #[test]
    fn consumer_credentials_fill_both_headers() {
        let config = ClientConfig::new("https://example.com/")
            .unwrap()
            .with_consumer_credentials("key-1", "secret-1");
        let lookup = |name: &str| {
            config
                .default_headers()
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(lookup(CONSUMER_KEY_HEADER).as_deref(), Some("key-1"));
        assert_eq!(lookup(CONSUMER_SECRET_HEADER).as_deref(), Some("secret-1"));
        assert_eq!(config.default_headers().len(), 2);
    }

    #[test]
    fn invalid_path_is_reported() {
        let config = ClientConfig::new("https://example.com/").unwrap();
        let err = config.resolve("http://[::1").unwrap_err();
        assert!(matches!(err, RequestError::InvalidPath { .. }));
    }

    #[test]
    fn picture_url_requires_an_id() {
        let config = ClientConfig::new("https://example.com/api/rest/").unwrap();
        assert!(config.picture_url("").is_none());
        assert_eq!(
            config.picture_url("42").unwrap().as_str(),
            "https://example.com/api/rest/pictures/42"
        );
    }
}
