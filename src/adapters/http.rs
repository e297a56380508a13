//! HTTP Transport Adapter
//!
//! Implements the `Transport` port with a reqwest client. The client
//! carries no cookie store, so the credentials-omit policy holds for
//! every request; transport-level failures map to `Error::Network` and
//! a response of any status is a successful fetch.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::domain::ports::Transport;
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, FetchRequest, FetchResponse, RequestMode};

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// User-Agent header sent with every fetch
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("tilevault/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport from the configuration.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn network_error(url: &str, err: reqwest::Error) -> Error {
    Error::Network {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self), fields(url = %request.url()))]
    async fn fetch(&self, request: &FetchRequest, options: FetchOptions) -> Result<FetchResponse> {
        let response = self
            .client
            .get(request.url())
            .send()
            .await
            .map_err(|e| network_error(request.url(), e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| network_error(request.url(), e))?;

        debug!(
            status,
            bytes = body.len(),
            cross_origin = options.mode == RequestMode::CrossOrigin,
            "fetched"
        );
        Ok(FetchResponse::new(status, headers, body))
    }
}
