//! Unified error types for weeproxy.
//!
//! [`WeeproxyError`] covers process-level failures (config loading,
//! binding, CLI commands). [`TransportError`] is what a single proxied
//! exchange can fail with; every variant has already been counted against
//! the target host by the time it is returned. [`ValidationError`] carries
//! one config problem with an optional hint.

use std::path::PathBuf;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub route: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.route, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WeeproxyError {
    #[error("Config file not found: {}\n\n  Set WEEPROXY_CONFIG or pass --config <file>.", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Invalid listen address '{addr}': {source}")]
    AddressParse {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: BoxError,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: BoxError,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}

/// Failure of one intercepted upstream exchange.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("reading request body for {host} failed: {source}")]
    BodyRead {
        host: String,
        #[source]
        source: BoxError,
    },

    #[error("upstream {host} failed: {source}")]
    Upstream {
        host: String,
        #[source]
        source: BoxError,
    },

    #[error("reading response body from {host} failed: {source}")]
    ResponseRead {
        host: String,
        #[source]
        source: BoxError,
    },
}

impl TransportError {
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            Self::BodyRead { host, .. } | Self::Upstream { host, .. } | Self::ResponseRead { host, .. } => {
                host
            }
        }
    }
}
