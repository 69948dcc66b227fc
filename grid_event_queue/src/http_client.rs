//! The HTTP seam under [`Capability`](crate::Capability).
//!
//! Capabilities only ever POST an encoded payload to their URL and read the
//! status and body back. Tests substitute scripted clients; production uses
//! the `reqwest` implementation.

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest_client;

#[cfg(feature = "reqwest")]
pub use reqwest_client::{ReqwestHttpClient, ReqwestHttpError};

use futures::future::BoxFuture;
use url::Url;

/// Posts capability payloads.
pub trait HttpClient: Clone + Send + Sync + 'static {
    /// The error type for HTTP operations.
    type Error: core::error::Error + Send + Sync + 'static;

    /// POST `body` to `url`, sent and accepted as `content_type`.
    fn post(
        &self,
        url: &Url,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> BoxFuture<'_, Result<HttpResponse, Self::Error>>;
}

/// Status and body of a capability reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,

    /// The response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether a gateway gave up on the request (502 or 504).
    ///
    /// Long-poll proxies answer this way when their hold expires with
    /// nothing to deliver.
    #[must_use]
    pub const fn is_gateway_timeout(&self) -> bool {
        matches!(self.status, 502 | 504)
    }

    /// Whether the body carries nothing but whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }
}
