//! Path-prefix route table with round-robin backend selection.
//!
//! [`RouteTable::match_route`] picks the longest configured prefix that
//! covers the request path on a segment boundary. [`Route::pick`] walks the
//! route's backends round-robin and skips any the caller reports as banned.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use url::Url;

use crate::breaker::registry::{canonical_host, split_backends};

#[derive(Debug)]
pub struct Backend {
    /// As written in the config; the key the ban query understands.
    pub alias: String,
    pub url: Url,
    pub host: String,
}

#[derive(Debug)]
pub struct Route {
    pub prefix: String,
    pub backends: Vec<Backend>,
    cursor: AtomicUsize,
}

#[derive(Debug)]
pub enum Pick<'a> {
    Backend(&'a Backend),
    AllBanned,
}

impl Route {
    fn new(prefix: &str, backends: &str, separator: &str) -> Self {
        let backends = split_backends(backends, separator)
            .filter_map(|alias| match Url::parse(alias) {
                Ok(url) => Some(Backend {
                    alias: alias.to_string(),
                    host: canonical_host(alias),
                    url,
                }),
                Err(e) => {
                    tracing::warn!(route = %prefix, backend = %alias, error = %e, "skipping unparsable backend");
                    None
                }
            })
            .collect();

        Self {
            prefix: prefix.to_string(),
            backends,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next backend in rotation that `banned` does not reject.
    pub fn pick(&self, banned: impl Fn(&str) -> bool) -> Pick<'_> {
        let len = self.backends.len();
        if len == 0 {
            return Pick::AllBanned;
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        (0..len)
            .map(|offset| &self.backends[(start + offset) % len])
            .find(|backend| !banned(&backend.alias))
            .map_or(Pick::AllBanned, Pick::Backend)
    }

    fn covers(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.ends_with('/'),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    #[must_use]
    pub fn new(url_proxy: &BTreeMap<String, String>, separator: &str) -> Self {
        let mut routes: Vec<Route> = url_proxy
            .iter()
            .map(|(prefix, backends)| Route::new(prefix, backends, separator))
            .collect();
        routes.sort_by_key(|r| std::cmp::Reverse(r.prefix.len()));
        Self { routes }
    }

    #[must_use]
    pub fn match_route(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.covers(path))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
