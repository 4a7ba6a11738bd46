//! Header construction, forwarding, and hop-by-hop stripping.
//!
//! [`build_forwarded_headers`] clones the client headers, strips hop-by-hop
//! headers, rewrites `Host` to the backend, appends the `X-Forwarded-*`
//! set and finally applies the configured custom headers.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
        "proxy-connection",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Strip hop-by-hop headers and `content-length` from an upstream response.
///
/// The interceptor has already buffered the body, so the origin's framing
/// headers no longer apply. Axum sets `content-length` from the bytes.
pub fn strip_response_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(hyper::header::CONTENT_LENGTH);
}

/// Parse configured custom headers once at startup. Invalid entries are
/// rejected by validation; any that slip through are skipped.
#[must_use]
pub fn parse_custom_headers(custom: &BTreeMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in custom {
        match (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
            (Ok(name), Ok(val)) => {
                headers.insert(name, val);
            }
            _ => {
                tracing::warn!(header = %key, "invalid custom header, skipping");
            }
        }
    }
    headers
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: &str,
    backend_host: &str,
    backend_scheme: &str,
    custom: &HeaderMap,
) -> HeaderMap {
    let mut headers = original.clone();

    for header_name in HOP_BY_HOP.iter() {
        headers.remove(header_name);
    }

    if let Ok(val) = HeaderValue::from_str(backend_host) {
        headers.insert("host", val);
    }

    // X-Forwarded-For: append to chain
    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.to_string(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    if let Some(original_host) = original.get("host") {
        headers.insert("x-forwarded-host", original_host.clone());
    }

    let proto = if backend_scheme == "https" {
        "https"
    } else {
        "http"
    };
    headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));

    for (name, value) in custom {
        headers.insert(name.clone(), value.clone());
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward(original: &HeaderMap, custom: &HeaderMap) -> HeaderMap {
        build_forwarded_headers(original, "10.0.0.1", "backend:9090", "http", custom)
    }

    #[test]
    fn strips_hop_by_hop() {
        let mut original = HeaderMap::new();
        original.insert("connection", "keep-alive".parse().unwrap());
        original.insert("content-type", "application/json".parse().unwrap());

        let result = forward(&original, &HeaderMap::new());

        assert!(result.get("connection").is_none());
        assert!(result.get("content-type").is_some());
    }

    #[test]
    fn rewrites_host_and_records_original() {
        let mut original = HeaderMap::new();
        original.insert("host", "proxy.example".parse().unwrap());

        let result = forward(&original, &HeaderMap::new());

        assert_eq!(result.get("host").unwrap(), "backend:9090");
        assert_eq!(result.get("x-forwarded-host").unwrap(), "proxy.example");
        assert_eq!(result.get("x-forwarded-proto").unwrap(), "http");
    }

    #[test]
    fn appends_x_forwarded_for() {
        let mut original = HeaderMap::new();
        original.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());

        let result = forward(&original, &HeaderMap::new());

        assert_eq!(result.get("x-forwarded-for").unwrap(), "1.2.3.4, 10.0.0.1");
    }

    #[test]
    fn custom_headers_override_client_headers() {
        let mut original = HeaderMap::new();
        original.insert("x-env", "client".parse().unwrap());

        let mut custom = BTreeMap::new();
        custom.insert("X-Env".to_string(), "prod".to_string());
        let result = forward(&original, &parse_custom_headers(&custom));

        assert_eq!(result.get("x-env").unwrap(), "prod");
    }

    #[test]
    fn invalid_custom_headers_are_skipped() {
        let mut custom = BTreeMap::new();
        custom.insert("bad header".to_string(), "x".to_string());
        custom.insert("x-ok".to_string(), "1".to_string());
        let parsed = parse_custom_headers(&custom);
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn response_framing_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert("content-length", "10".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("content-type", "text/plain".parse().unwrap());

        strip_response_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
    }
}
