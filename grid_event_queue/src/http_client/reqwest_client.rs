//! [`reqwest`]-backed [`HttpClient`] tuned for long polls.

use core::time::Duration;

use futures::{FutureExt, future::BoxFuture};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use super::{HttpClient, HttpResponse};

/// Request timeout used by [`ReqwestHttpClient::new`].
///
/// Simulators hold an event-queue request for up to a minute before
/// answering empty, so this sits comfortably above that.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Bound on establishing the connection, separate from the hold time.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure of the reqwest-based client.
#[derive(Debug, thiserror::Error)]
pub enum ReqwestHttpError {
    /// The client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request outlived its timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// The capability URL.
        url: Url,
    },

    /// The server could not be reached.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// The capability URL.
        url: Url,
        /// The underlying failure.
        source: reqwest::Error,
    },

    /// Any other transport failure.
    #[error("request to {url} failed: {source}")]
    Request {
        /// The capability URL.
        url: Url,
        /// The underlying failure.
        source: reqwest::Error,
    },
}

impl ReqwestHttpError {
    fn classify(url: &Url, source: reqwest::Error) -> Self {
        let url = url.clone();
        if source.is_timeout() {
            Self::Timeout { url }
        } else if source.is_connect() {
            Self::Connect { url, source }
        } else {
            Self::Request { url, source }
        }
    }
}

/// A [`reqwest`]-backed [`HttpClient`].
///
/// Cloning shares the connection pool, so one client can serve every
/// capability of a session.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    inner: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a client with [`DEFAULT_REQUEST_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`ReqwestHttpError::Build`] if the TLS backend cannot be
    /// initialised.
    pub fn new() -> Result<Self, ReqwestHttpError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`.
    ///
    /// Long-poll servers hold requests open, so this should exceed the
    /// server's hold time.
    ///
    /// # Errors
    ///
    /// Returns [`ReqwestHttpError::Build`] if the TLS backend cannot be
    /// initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ReqwestHttpError> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ReqwestHttpError::Build)?;
        Ok(Self { inner })
    }
}

impl HttpClient for ReqwestHttpClient {
    type Error = ReqwestHttpError;

    fn post(
        &self,
        url: &Url,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> BoxFuture<'_, Result<HttpResponse, Self::Error>> {
        let url = url.clone();
        let request = self
            .inner
            .post(url.clone())
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, content_type)
            .body(body);

        async move {
            let resp = request
                .send()
                .await
                .map_err(|e| ReqwestHttpError::classify(&url, e))?;
            let status = resp.status().as_u16();
            let body = resp
                .bytes()
                .await
                .map_err(|e| ReqwestHttpError::classify(&url, e))?;

            Ok(HttpResponse {
                status,
                body: body.to_vec(),
            })
        }
        .boxed()
    }
}
