//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for pages and image assets
//! - Classifying failures into a closed set of error kinds at the point they occur

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Maximum redirect hops followed before giving up
const MAX_REDIRECTS: usize = 10;

/// Why a fetch failed
///
/// Produced directly by the fetcher so nothing downstream needs to inspect
/// collaborator-specific error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Connection refused, reset, DNS failure, or a broken body stream
    Transport,

    /// The request or connection timed out
    Timeout,

    /// TLS handshake or certificate failure
    Tls,

    /// The URL or request could not be built
    MalformedRequest,

    /// The redirect chain was too long or looped
    TooManyRedirects,

    /// The server answered with a non-success status
    Status(u16),

    /// Anything else
    Unexpected,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => f.write_str("A connection error occurred."),
            Self::Timeout => f.write_str("The request timed out."),
            Self::Tls => f.write_str("A TLS error occurred."),
            Self::MalformedRequest => f.write_str("The URL provided was somehow invalid."),
            Self::TooManyRedirects => f.write_str("Too many redirects."),
            Self::Status(code) => write!(f, "The server answered with HTTP status {}.", code),
            Self::Unexpected => f.write_str("An unexpected error occurred."),
        }
    }
}

/// A failed fetch of one URL
#[derive(Debug, Clone, Error)]
#[error("{url}: {kind}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    /// Underlying error text, for debug logging only
    pub detail: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            detail: detail.into(),
        }
    }
}

/// Retrieves raw bytes for a URL
///
/// Used both for page documents and for image assets.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use strip_harvester::config::UserAgentConfig;
/// use strip_harvester::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the default client settings
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(build_http_client(config)?))
    }

    /// Wraps an already configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| FetchError::new(FetchErrorKind::MalformedRequest, url, e.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::new(classify_error(&e), url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::Status(status.as_u16()),
                url,
                format!("HTTP {}", status),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::new(classify_error(&e), url, e.to_string()))?;

        Ok(body.to_vec())
    }
}

/// Maps a reqwest error onto a [`FetchErrorKind`]
pub fn classify_error(error: &reqwest::Error) -> FetchErrorKind {
    if error.is_timeout() {
        FetchErrorKind::Timeout
    } else if error.is_redirect() {
        FetchErrorKind::TooManyRedirects
    } else if error.is_builder() {
        FetchErrorKind::MalformedRequest
    } else if let Some(status) = error.status() {
        FetchErrorKind::Status(status.as_u16())
    } else if error.is_connect() || error.is_request() || error.is_body() || error.is_decode() {
        if mentions_tls(error) {
            FetchErrorKind::Tls
        } else {
            FetchErrorKind::Transport
        }
    } else {
        FetchErrorKind::Unexpected
    }
}

/// reqwest has no TLS predicate, so look through the source chain
///
/// The walk starts below `error` itself: reqwest's own message embeds the
/// request URL, which says nothing about the failure.
fn mentions_tls(error: &(dyn StdError + 'static)) -> bool {
    let mut current = error.source();
    while let Some(err) = current {
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return true;
        }
        current = err.source();
    }
    false
}
