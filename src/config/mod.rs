//! Configuration loading and validation.
//!
//! The config is a single JSON file read once at startup; backends are
//! fixed for the life of the process. [`load_file`] reads, parses and
//! validates it and stamps it with a [`ConfigVersion`] so `/health` can
//! report which file contents are running.

pub mod model;
pub mod validation;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::WeeproxyError;
use model::Config;
use validation::{backend_warnings, validate};

/// SHA-256 of the config file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigVersion(pub String);

impl ConfigVersion {
    #[must_use]
    pub fn from_content(content: &[u8]) -> Self {
        Self(sha256_hex(content))
    }

    /// First 8 hex characters, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

pub fn parse_config_str(content: &str, path_display: &str) -> Result<Config, WeeproxyError> {
    serde_json::from_str(content).map_err(|source| WeeproxyError::ConfigParse {
        path: path_display.to_string(),
        source,
    })
}

async fn read_content(path: &Path) -> Result<String, WeeproxyError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            WeeproxyError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            WeeproxyError::Io(e)
        }
    })
}

/// Read, parse and validate the config file at `path`.
///
/// Backends that are not proxyable URLs are logged at WARN and kept.
pub async fn load_file(
    path: &Path,
    separator: &str,
) -> Result<(Config, ConfigVersion), WeeproxyError> {
    let content = read_content(path).await?;
    let config = parse_config_str(&content, &path.display().to_string())?;

    if let Err(errors) = validate(&config, separator) {
        return Err(WeeproxyError::ConfigValidation { errors });
    }

    for warning in backend_warnings(&config, separator) {
        tracing::warn!(
            route = %warning.route,
            problem = %warning.message,
            "backend is not a proxyable URL, keeping it under its raw name"
        );
    }

    Ok((config, ConfigVersion::from_content(content.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_version_truncates() {
        let v = ConfigVersion::from_content(b"{}");
        assert_eq!(v.short().len(), 8);
        assert_eq!(ConfigVersion("abc".into()).short(), "abc");
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = parse_config_str("{not json", "weeproxy.json").unwrap_err();
        assert!(err.to_string().contains("weeproxy.json"));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_file(Path::new("/definitely/not/here.json"), " ")
            .await
            .unwrap_err();
        assert!(matches!(err, WeeproxyError::ConfigFileNotFound { .. }));
    }

    #[tokio::test]
    async fn unparsable_backend_does_not_stop_loading() {
        let path = std::env::temp_dir().join(format!("weeproxy-raw-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{"url-proxy": {"/": "http://good b1"}}"#)
            .await
            .unwrap();

        let (config, _) = load_file(&path, " ").await.unwrap();
        assert_eq!(config.total_backends(" "), 2);
        assert_eq!(backend_warnings(&config, " ").len(), 1);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
