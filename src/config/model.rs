//! Serde data structures for the weeproxy configuration file.
//!
//! The file is a JSON object of string maps: `server` settings,
//! `url-proxy` (path prefix to separator-delimited backend list) and
//! `custom-headers` added to every proxied request. Numeric settings are
//! strings and fall back to their defaults when missing or unparsable.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::breaker::registry::split_backends;
use crate::breaker::traffic::{Thresholds, DEFAULT_MAX_ERR_PER_SEC, DEFAULT_MAX_REQ_PER_SEC};
use crate::error::WeeproxyError;

pub const DEFAULT_LISTEN_AT: &str = "0.0.0.0:8080";
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(rename = "url-proxy", default)]
    pub url_proxy: BTreeMap<String, String>,

    #[serde(
        rename = "custom-headers",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub custom_headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_req_per_sec: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_err_per_sec: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_timeout_ms: Option<String>,
}

impl Config {
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds::new(
            parse_setting(
                "max-req-per-sec",
                self.server.max_req_per_sec.as_deref(),
                DEFAULT_MAX_REQ_PER_SEC,
            ),
            parse_setting(
                "max-err-per-sec",
                self.server.max_err_per_sec.as_deref(),
                DEFAULT_MAX_ERR_PER_SEC,
            ),
        )
    }

    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(parse_setting(
            "upstream-timeout-ms",
            self.server.upstream_timeout_ms.as_deref(),
            DEFAULT_UPSTREAM_TIMEOUT_MS,
        ))
    }

    /// Resolve the listen address. `override_addr` (from the CLI) wins over
    /// the file; a bare `:port` binds every interface.
    pub fn listen_addr(&self, override_addr: Option<&str>) -> Result<SocketAddr, WeeproxyError> {
        let raw = override_addr
            .or(self.server.listen_at.as_deref())
            .unwrap_or(DEFAULT_LISTEN_AT);
        let normalized = if raw.starts_with(':') {
            format!("0.0.0.0{raw}")
        } else {
            raw.to_string()
        };
        normalized
            .parse()
            .map_err(|source| WeeproxyError::AddressParse {
                addr: raw.to_string(),
                source,
            })
    }

    #[must_use]
    pub fn total_backends(&self, separator: &str) -> usize {
        self.url_proxy
            .values()
            .map(|backends| split_backends(backends, separator).count())
            .sum()
    }
}

fn parse_setting(name: &str, raw: Option<&str>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(setting = name, value = %raw, default, "unparsable setting, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> Config {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn thresholds_default_when_absent() {
        let c = config(r#"{"url-proxy": {"/": "http://a"}}"#);
        assert_eq!(c.thresholds(), Thresholds::new(7000, 100));
    }

    #[test]
    fn thresholds_default_when_unparsable() {
        let c = config(
            r#"{"server": {"max-req-per-sec": "lots", "max-err-per-sec": "-1"}, "url-proxy": {}}"#,
        );
        assert_eq!(c.thresholds(), Thresholds::new(7000, 100));
    }

    #[test]
    fn thresholds_parse_from_strings() {
        let c = config(r#"{"server": {"max-req-per-sec": " 5 ", "max-err-per-sec": "0"}}"#);
        assert_eq!(c.thresholds(), Thresholds::new(5, 0));
    }

    #[test]
    fn bare_port_listen_address_binds_all_interfaces() {
        let c = config(r#"{"server": {"listen-at": ":9090"}}"#);
        assert_eq!(
            c.listen_addr(None).unwrap(),
            "0.0.0.0:9090".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn cli_listen_address_overrides_file() {
        let c = config(r#"{"server": {"listen-at": ":9090"}}"#);
        assert_eq!(c.listen_addr(Some("127.0.0.1:1234")).unwrap().port(), 1234);
    }

    #[test]
    fn bad_listen_address_is_an_error() {
        let c = config(r#"{"server": {"listen-at": "nowhere"}}"#);
        assert!(matches!(
            c.listen_addr(None),
            Err(WeeproxyError::AddressParse { .. })
        ));
    }

    #[test]
    fn unknown_server_keys_are_ignored() {
        let c = config(r#"{"server": {"listen-at": ":1", "workers": "4"}}"#);
        assert_eq!(c.server.listen_at.as_deref(), Some(":1"));
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{"routes": {}}"#).is_err());
    }

    #[test]
    fn total_backends_splits_on_separator() {
        let c = config(r#"{"url-proxy": {"/a": "http://a http://b", "/b": "http://c"}}"#);
        assert_eq!(c.total_backends(" "), 3);
        assert_eq!(c.total_backends(","), 2);
    }
}
