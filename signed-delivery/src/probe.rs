//! Authenticated fetch used to self-test freshly signed cookies

use async_trait::async_trait;
use cdn_signer::SignedCookieSet;
use reqwest::header::COOKIE;
use thiserror::Error;
use tracing::instrument;

/// Errors raised while probing a signed resource
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Request could not be sent or the body could not be read
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// Probed URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },
}

/// Response of a probe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status code
    pub status: u16,
    /// Full response body
    pub body: String,
}

/// Fetches a resource while presenting signed cookies
#[async_trait]
pub trait AccessProbe: Send + Sync {
    /// Issues a GET for `url` carrying the name/value pairs of `cookies`
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Transport` on network failure. Non-2xx responses are not errors.
    async fn fetch(&self, url: &str, cookies: &SignedCookieSet) -> Result<ProbeResponse, ProbeError>;
}

/// [`AccessProbe`] backed by a reqwest client
#[derive(Debug, Clone, Default)]
pub struct HttpCookieProbe {
    client: reqwest::Client,
}

impl HttpCookieProbe {
    /// Creates a probe with a default client
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a probe using `client`
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccessProbe for HttpCookieProbe {
    #[instrument(skip(self, cookies))]
    async fn fetch(&self, url: &str, cookies: &SignedCookieSet) -> Result<ProbeResponse, ProbeError> {
        let transport = |source: reqwest::Error| ProbeError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(COOKIE, cookies.to_cookie_header())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        tracing::debug!(status, bytes = body.len(), "probe response received");

        Ok(ProbeResponse { status, body })
    }
}
