//! Backend alias to canonical host resolution.
//!
//! [`BackendRegistry`] is built once from the configured backend groups and
//! never changes afterwards: every alias maps to the host key derived by
//! [`canonical_host`], and every distinct host owns one [`TrafficState`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use url::Url;

use super::traffic::{TrafficSnapshot, TrafficState};

/// Derive the accounting key for a configured backend.
///
/// Parseable URLs with a host collapse to `host[:port]`. Anything else,
/// including scheme-less `host:port` strings, is used verbatim.
#[must_use]
pub fn canonical_host(backend: &str) -> String {
    match Url::parse(backend) {
        Ok(url) => match url.host_str() {
            Some(host) => url
                .port()
                .map_or_else(|| host.to_string(), |port| format!("{host}:{port}")),
            None => backend.to_string(),
        },
        Err(_) => backend.to_string(),
    }
}

/// Split a separator-delimited backend list, skipping empty fragments.
pub fn split_backends<'a>(backends: &'a str, separator: &'a str) -> impl Iterator<Item = &'a str> {
    backends
        .split(separator)
        .map(str::trim)
        .filter(|b| !b.is_empty())
}

#[derive(Debug, Default)]
pub struct BackendRegistry {
    aliases: HashMap<String, String>,
    hosts: BTreeMap<String, Arc<TrafficState>>,
}

impl BackendRegistry {
    /// Build the registry from `group -> "backend<sep>backend..."` entries.
    pub fn new<'a, I>(groups: I, separator: &str) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut registry = Self::default();
        for backends in groups {
            for alias in split_backends(backends, separator) {
                registry.insert(alias);
            }
        }
        registry
    }

    fn insert(&mut self, alias: &str) {
        let host = canonical_host(alias);
        if host == alias {
            tracing::debug!(backend = %alias, "backend is not a URL, tracking it verbatim");
        }
        self.hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(TrafficState::new()));
        self.aliases.insert(alias.to_string(), host);
    }

    #[must_use]
    pub fn host_of(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// State for a host key (not an alias).
    #[must_use]
    pub fn state(&self, host: &str) -> Option<&Arc<TrafficState>> {
        self.hosts.get(host)
    }

    #[must_use]
    pub fn state_for_alias(&self, alias: &str) -> Option<&Arc<TrafficState>> {
        self.host_of(alias).and_then(|host| self.state(host))
    }

    /// Unknown aliases have no state and are never banned.
    #[must_use]
    pub fn banned(&self, alias: &str) -> bool {
        self.state_for_alias(alias)
            .is_some_and(|state| state.is_banned())
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, &Arc<TrafficState>)> {
        self.hosts.iter().map(|(host, state)| (host.as_str(), state))
    }

    #[must_use]
    pub fn snapshots(&self) -> Vec<(String, TrafficSnapshot)> {
        self.hosts()
            .map(|(host, state)| (host.to_string(), state.snapshot()))
            .collect()
    }

    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    #[must_use]
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }
}
