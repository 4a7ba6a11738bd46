//! Core HTTP forwarding handler.
//!
//! The [`forward_handler`] function is the Axum fallback that receives
//! every request not served by `/health` or `/metrics`. It matches the path against the route
//! table ([`routing`]), skips backends the circuit breaker has banned,
//! builds the outbound request ([`headers`]) and sends it through the
//! breaker's intercepting transport.

pub mod headers;
pub mod routing;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::error::TransportError;
use crate::server::AppState;
use routing::{Backend, Pick};

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path();
    let correlation_id = parts
        .headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let Some(route) = state.routes.match_route(path) else {
        tracing::warn!(
            correlation_id = %correlation_id,
            method = %parts.method,
            path = %path,
            "no route matched"
        );
        return StatusCode::NOT_FOUND.into_response();
    };

    let backend = match route.pick(|alias| state.proxy.banned(alias)) {
        Pick::Backend(backend) => backend,
        Pick::AllBanned => {
            tracing::warn!(
                correlation_id = %correlation_id,
                route = %route.prefix,
                "all backends banned"
            );
            state.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let uri = match upstream_uri(backend, &parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(
                correlation_id = %correlation_id,
                backend = %backend.alias,
                error = %e,
                "failed to build upstream URI"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    tracing::info!(
        correlation_id = %correlation_id,
        method = %parts.method,
        path = %path,
        backend = %backend.alias,
        "proxying request"
    );

    let mut headers = headers::build_forwarded_headers(
        &parts.headers,
        &addr.ip().to_string(),
        &backend.host,
        backend.url.scheme(),
        &state.custom_headers,
    );
    if let Ok(val) = correlation_id.parse() {
        headers.insert("x-correlation-id", val);
    }

    let mut outbound = hyper::Request::new(body);
    *outbound.method_mut() = parts.method;
    *outbound.uri_mut() = uri;
    *outbound.headers_mut() = headers;

    match state.proxy.round_trip(outbound).await {
        Ok(response) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            let (mut resp_parts, bytes) = response.into_parts();
            headers::strip_response_hop_by_hop(&mut resp_parts.headers);
            if let Ok(val) = correlation_id.parse() {
                resp_parts.headers.insert("x-correlation-id", val);
            }
            Response::from_parts(resp_parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                backend = %backend.alias,
                host = %e.host(),
                error = %e,
                "proxy request failed"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            failure_status(&e).into_response()
        }
    }
}

/// Status returned to the client when an exchange fails.
///
/// A request body cut off by the body size limit is a 413; any other body
/// read failure is the client's fault (400). Upstream failures are 502.
#[must_use]
pub fn failure_status(error: &TransportError) -> StatusCode {
    match error {
        TransportError::BodyRead { source, .. } if exceeds_length_limit(source.as_ref()) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        TransportError::BodyRead { .. } => StatusCode::BAD_REQUEST,
        TransportError::Upstream { .. } | TransportError::ResponseRead { .. } => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn exceeds_length_limit(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Join the backend base URL with the incoming request path and query.
///
/// Paths are joined with exactly one slash; when both sides carry a query
/// string they are concatenated with `&`.
pub fn upstream_uri(backend: &Backend, incoming: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
    let path = join_paths(backend.url.path(), incoming.path());
    let query = match (backend.url.query(), incoming.query()) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => format!("?{a}&{b}"),
        (Some(q), _) | (_, Some(q)) if !q.is_empty() => format!("?{q}"),
        _ => String::new(),
    };
    format!("{}://{}{path}{query}", backend.url.scheme(), backend.host).parse()
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full, Limited};
    use url::Url;

    use super::*;

    fn backend_from_alias(alias: &str) -> Option<Backend> {
        Url::parse(alias).ok().map(|url| Backend {
            alias: alias.to_string(),
            host: crate::breaker::canonical_host(alias),
            url,
        })
    }

    fn uri(backend: &str, incoming: &str) -> String {
        let backend = backend_from_alias(backend).unwrap();
        upstream_uri(&backend, &incoming.parse().unwrap())
            .unwrap()
            .to_string()
    }

    #[test]
    fn joins_root_backend() {
        assert_eq!(uri("http://b1:9000", "/api/users"), "http://b1:9000/api/users");
    }

    #[test]
    fn joins_backend_base_path_with_single_slash() {
        assert_eq!(uri("http://b1/base/", "/x"), "http://b1/base/x");
        assert_eq!(uri("http://b1/base", "/x"), "http://b1/base/x");
    }

    #[test]
    fn preserves_and_merges_query() {
        assert_eq!(uri("http://b1", "/x?a=1"), "http://b1/x?a=1");
        assert_eq!(uri("http://b1/?k=v", "/x?a=1"), "http://b1/x?k=v&a=1");
        assert_eq!(uri("http://b1/?k=v", "/x"), "http://b1/x?k=v");
    }

    #[test]
    fn default_port_is_dropped_from_authority() {
        assert_eq!(uri("http://b1:80", "/"), "http://b1/");
    }

    fn body_read(source: crate::error::BoxError) -> TransportError {
        TransportError::BodyRead {
            host: "b1".into(),
            source,
        }
    }

    async fn length_limit_error() -> crate::error::BoxError {
        let body = Limited::new(Full::new(Bytes::from_static(b"too long")), 2);
        body.collect().await.unwrap_err()
    }

    #[tokio::test]
    async fn oversized_body_maps_to_413() {
        let err = body_read(length_limit_error().await);
        assert_eq!(failure_status(&err), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn wrapped_length_limit_is_found_in_the_source_chain() {
        let err = body_read(Box::new(axum::Error::new(length_limit_error().await)));
        assert_eq!(failure_status(&err), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn other_failures_keep_their_status() {
        let err = body_read("connection reset".into());
        assert_eq!(failure_status(&err), StatusCode::BAD_REQUEST);

        let err = TransportError::Upstream {
            host: "b1".into(),
            source: "refused".into(),
        };
        assert_eq!(failure_status(&err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn join_paths_cases() {
        assert_eq!(join_paths("/", "/a"), "/a");
        assert_eq!(join_paths("/a", "b"), "/a/b");
        assert_eq!(join_paths("/a/", "b"), "/a/b");
    }
}
