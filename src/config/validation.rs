//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors: no routes, route keys that are not paths, empty backend lists,
//! and custom headers that cannot be sent on the wire. All problems are
//! returned together.
//!
//! Backends that are not `http`/`https` URLs are not fatal: the breaker
//! tracks them under their raw string and the router skips them.
//! [`backend_warnings`] reports them so they can be logged or printed.

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use super::model::Config;
use crate::breaker::registry::split_backends;
use crate::error::ValidationError;

/// Validate a single route path prefix.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path cannot be empty".into());
    }
    if !path.starts_with('/') {
        return Err(format!("path must start with '/' (did you mean '/{path}'?)"));
    }
    Ok(())
}

/// Validate a single backend URL.
pub fn validate_backend_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{url}' has no host"))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

pub fn validate(config: &Config, separator: &str) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if separator.is_empty() {
        errors.push(ValidationError {
            route: "(root)".into(),
            field: "lb-separator".into(),
            message: "load-balancer separator cannot be empty".into(),
            suggestion: Some("the default is a single space".into()),
        });
        return Err(errors);
    }

    if config.url_proxy.is_empty() {
        errors.push(ValidationError {
            route: "(root)".into(),
            field: "url-proxy".into(),
            message: "at least one route must be defined".into(),
            suggestion: Some(r#"e.g. "url-proxy": {"/": "http://127.0.0.1:3000"}"#.into()),
        });
    }

    for (path, backends) in &config.url_proxy {
        if let Err(msg) = validate_path(path) {
            errors.push(ValidationError {
                route: path.clone(),
                field: "path".into(),
                message: msg,
                suggestion: None,
            });
        }

        if split_backends(backends, separator).next().is_none() {
            errors.push(ValidationError {
                route: path.clone(),
                field: "backend".into(),
                message: "at least one backend must be defined".into(),
                suggestion: None,
            });
        }
    }

    for (name, value) in &config.custom_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError {
                route: "(root)".into(),
                field: "custom-headers".into(),
                message: format!("'{name}' is not a valid header name"),
                suggestion: None,
            });
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError {
                route: "(root)".into(),
                field: "custom-headers".into(),
                message: format!("value of '{name}' is not a valid header value"),
                suggestion: None,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Backends that cannot be proxied to. Each one is tolerated at startup.
#[must_use]
pub fn backend_warnings(config: &Config, separator: &str) -> Vec<ValidationError> {
    let mut warnings = Vec::new();
    for (path, backends) in &config.url_proxy {
        for backend in split_backends(backends, separator) {
            if let Err(msg) = validate_backend_url(backend) {
                warnings.push(ValidationError {
                    route: path.clone(),
                    field: "backend".into(),
                    message: msg,
                    suggestion: (!backend.contains("://"))
                        .then(|| format!("did you mean 'http://{backend}'?")),
                });
            }
        }
    }
    warnings
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config, separator: &str) -> String {
    use std::fmt::Write;

    let thresholds = config.thresholds();
    let mut report = format!(
        "{path} is valid\n\n  {} routes, {} backends\n  limits: {} req/s, {} err/s per backend\n",
        config.url_proxy.len(),
        config.total_backends(separator),
        thresholds.max_req_per_sec,
        thresholds.max_err_per_sec,
    );

    for (route, backends) in &config.url_proxy {
        let list: Vec<&str> = split_backends(backends, separator).collect();
        let _ = writeln!(report, "\n  {route}");
        for backend in list {
            let _ = writeln!(report, "    \u{2192} {backend}");
        }
    }

    report
}
