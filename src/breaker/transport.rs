//! Outbound interception: accounting around every upstream exchange.
//!
//! [`SaneTransport::round_trip`] is the only path requests take to a
//! backend. It counts the request against the target host, buffers the
//! request body, hands the exchange to an [`Upstream`], and counts an error
//! for every 5xx or failed step. It never gates: whether a backend should
//! be used at all is decided by the router through the ban query.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::header::HOST;
use hyper::{Request, Response};

use super::registry::{canonical_host, BackendRegistry};
use crate::error::{BoxError, TransportError};
use crate::server::HttpClient;

pub type UpstreamBody = UnsyncBoxBody<Bytes, BoxError>;

/// The network exchange the interceptor delegates to.
// async_trait keeps the trait object-safe so tests can swap the client out.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<UpstreamBody>, BoxError>;
}

/// Pooled hyper client with a per-request deadline.
pub struct HyperUpstream {
    client: HttpClient,
    timeout: Duration,
}

impl HyperUpstream {
    #[must_use]
    pub const fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Upstream for HyperUpstream {
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response<UpstreamBody>, BoxError> {
        let response = tokio::time::timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| -> BoxError {
                format!("request timed out after {}ms", self.timeout.as_millis()).into()
            })??;

        Ok(response.map(|body| {
            body.map_err(|e| Box::new(e) as BoxError)
                .boxed_unsync()
        }))
    }
}

pub struct SaneTransport {
    registry: Arc<BackendRegistry>,
    upstream: Arc<dyn Upstream>,
}

impl SaneTransport {
    #[must_use]
    pub fn new(registry: Arc<BackendRegistry>, upstream: Arc<dyn Upstream>) -> Self {
        Self { registry, upstream }
    }

    /// Forward `request` and return the fully buffered upstream response.
    ///
    /// A 5xx response is returned as `Ok` but still counts as an error for
    /// the target host. Every `Err` has already been counted.
    pub async fn round_trip<B>(&self, request: Request<B>) -> Result<Response<Bytes>, TransportError>
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let host = target_host(&request).unwrap_or_default();
        let state = self.registry.state(&host).map(Arc::as_ref);

        match state {
            Some(state) => state.record_request(),
            None => tracing::debug!(host = %host, "request to untracked host"),
        }
        let record_error = || {
            if let Some(state) = state {
                state.record_error();
            }
        };

        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                record_error();
                return Err(TransportError::BodyRead {
                    host,
                    source: e.into(),
                });
            }
        };

        let response = match self
            .upstream
            .send(Request::from_parts(parts, Full::new(body)))
            .await
        {
            Ok(response) => response,
            Err(source) => {
                record_error();
                return Err(TransportError::Upstream { host, source });
            }
        };

        if response.status().is_server_error() {
            record_error();
            tracing::debug!(host = %host, status = response.status().as_u16(), "upstream server error");
        }

        let (parts, body) = response.into_parts();
        match body.collect().await {
            Ok(collected) => Ok(Response::from_parts(parts, collected.to_bytes())),
            Err(source) => {
                record_error();
                Err(TransportError::ResponseRead { host, source })
            }
        }
    }

    #[must_use]
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }
}

/// Host key for an outbound request: the URI authority, or the `Host`
/// header for origin-form URIs, normalised the same way as configured
/// backends.
fn target_host<B>(request: &Request<B>) -> Option<String> {
    let uri = request.uri();
    if uri.authority().is_some() {
        return Some(canonical_host(&uri.to_string()));
    }

    let host = request.headers().get(HOST)?.to_str().ok()?;
    let scheme = uri.scheme_str().unwrap_or("http");
    Some(canonical_host(&format!("{scheme}://{host}")))
}
