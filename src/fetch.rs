//! Fetch Value Objects
//!
//! Requests and responses as they cross the engine: the request-handling
//! entry point takes a [`FetchRequest`], every strategy resolves to a
//! [`FetchResponse`], and store backends persist responses verbatim.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How a fetch is issued relative to the requesting origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequestMode {
    /// Same-origin request with default semantics
    #[default]
    SameOrigin,
    /// Cross-origin request (external tile servers)
    CrossOrigin,
}

/// Whether ambient credentials (cookies, auth headers) accompany a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CredentialsPolicy {
    /// Send credentials for same-origin requests
    #[default]
    SameOrigin,
    /// Never send credentials
    Omit,
}

/// Options applied to an outgoing fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub mode: RequestMode,
    pub credentials: CredentialsPolicy,
}

impl FetchOptions {
    /// Options for tile fetches: cross-origin with credentials omitted
    pub fn cross_origin_no_credentials() -> Self {
        Self {
            mode: RequestMode::CrossOrigin,
            credentials: CredentialsPolicy::Omit,
        }
    }
}

/// An intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Full request URL, also the cache key
    url: String,
    /// True for top-level document loads
    navigation: bool,
}

impl FetchRequest {
    /// Create a non-navigation request
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            navigation: false,
        }
    }

    /// Create a navigation (top-level document) request
    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            navigation: true,
        }
    }

    /// Get the request URL
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether this is a top-level document load
    #[inline]
    pub fn is_navigation(&self) -> bool {
        self.navigation
    }
}

/// Distinguishes real responses from the synthesized error sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    /// A response carrying real status, headers and body
    Normal,
    /// Opaque error sentinel: resolves the request without exposing
    /// status or body. Strategies return it where the original contract
    /// forbids a thrown failure.
    OpaqueError,
}

/// A response: fetched from the network, replayed from a cache namespace,
/// or synthesized as the opaque error sentinel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    kind: ResponseKind,
}

impl FetchResponse {
    /// Create a normal response
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            kind: ResponseKind::Normal,
        }
    }

    /// Create a 200 response with the given body and no headers
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, Vec::new(), body.into())
    }

    /// The opaque error sentinel (status 0, empty body)
    pub fn error() -> Self {
        Self {
            status: 0,
            headers: Vec::new(),
            body: Bytes::new(),
            kind: ResponseKind::OpaqueError,
        }
    }

    /// Append a header, consuming and returning self
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Get the HTTP status code (0 for the error sentinel)
    #[inline]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get all headers in arrival order
    #[inline]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Look up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get the body (zero-copy)
    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the response kind
    #[inline]
    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Whether this is the opaque error sentinel
    #[inline]
    pub fn is_error(&self) -> bool {
        self.kind == ResponseKind::OpaqueError
    }
}

// =============================================================================
// Tests
// =============================================================================
