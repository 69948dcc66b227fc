//! Capabilities: named, URL-bound permissions to make one kind of request.
//!
//! The event queue consumes a capability only through [`CapabilityPost`]:
//! post a structured payload, get back a structured reply, no reply, or an
//! error. [`Capability`] implements it over any [`HttpClient`].

use std::sync::Arc;

use futures::{FutureExt, future::BoxFuture};
use serde_json::Value;
use url::Url;

use crate::{
    error::CapabilityError,
    http_client::{HttpClient, HttpResponse},
};

/// Content type used for capability payloads.
pub const PAYLOAD_CONTENT_TYPE: &str = "application/llsd+json";

/// A capability that accepts structured POSTs.
pub trait CapabilityPost: Send + Sync {
    /// The capability's name, e.g. `EventQueueGet`.
    fn name(&self) -> &str;

    /// POST `payload` and decode the reply.
    ///
    /// `Ok(None)` means the server answered without a body, which long-poll
    /// endpoints do when their hold time expires with nothing to deliver.
    fn post(&self, payload: Value) -> BoxFuture<'_, Result<Option<Value>, CapabilityError>>;
}

impl<C: CapabilityPost + ?Sized> CapabilityPost for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn post(&self, payload: Value) -> BoxFuture<'_, Result<Option<Value>, CapabilityError>> {
        (**self).post(payload)
    }
}

/// A capability reachable over HTTP.
#[derive(Debug, Clone)]
pub struct Capability<H> {
    name: String,
    url: Url,
    http: H,
}

impl<H> Capability<H> {
    /// Bind `name` to `url`.
    pub fn new(name: impl Into<String>, url: Url, http: H) -> Self {
        Self {
            name: name.into(),
            url,
            http,
        }
    }

    /// The capability URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl<H: HttpClient> CapabilityPost for Capability<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, payload: Value) -> BoxFuture<'_, Result<Option<Value>, CapabilityError>> {
        async move {
            let body = serde_json::to_vec(&payload).map_err(CapabilityError::Encode)?;
            let resp = self
                .http
                .post(&self.url, PAYLOAD_CONTENT_TYPE, body)
                .await
                .map_err(|e| CapabilityError::Request(e.to_string()))?;

            decode_reply(resp)
        }
        .boxed()
    }
}

/// Interpret a capability reply.
///
/// 502 and 504 are how long-poll proxies report an expired hold with no
/// events; they are treated like an empty reply rather than an error.
fn decode_reply(resp: HttpResponse) -> Result<Option<Value>, CapabilityError> {
    if resp.is_gateway_timeout() {
        return Ok(None);
    }

    if !resp.is_success() {
        return Err(CapabilityError::UnexpectedStatus {
            status: resp.status,
            body: String::from_utf8_lossy(&resp.body).into_owned(),
        });
    }

    if resp.is_blank() {
        return Ok(None);
    }

    serde_json::from_slice(&resp.body)
        .map(Some)
        .map_err(CapabilityError::Decode)
}
