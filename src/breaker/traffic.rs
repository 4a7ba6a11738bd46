//! Per-host request and error accounting.
//!
//! A [`TrafficState`] holds the two counters for one canonical host behind
//! a single mutex, plus the ban flag as an atomic so the router can read it
//! without contending with request paths. Counters only ever grow through
//! [`TrafficState::record_request`] / [`TrafficState::record_error`] and
//! only shrink through [`TrafficState::evaluate_and_decay`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_REQ_PER_SEC: u64 = 7000;
pub const DEFAULT_MAX_ERR_PER_SEC: u64 = 100;

/// Process-wide per-epoch limits. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub max_req_per_sec: u64,
    pub max_err_per_sec: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_req_per_sec: DEFAULT_MAX_REQ_PER_SEC,
            max_err_per_sec: DEFAULT_MAX_ERR_PER_SEC,
        }
    }
}

impl Thresholds {
    #[must_use]
    pub const fn new(max_req_per_sec: u64, max_err_per_sec: u64) -> Self {
        Self {
            max_req_per_sec,
            max_err_per_sec,
        }
    }
}

/// Point-in-time copy of a host's accounting state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub banned: bool,
}

/// Result of one epoch evaluation for a single host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochOutcome {
    pub was_banned: bool,
    pub banned: bool,
    /// Counter values the ban decision was made on.
    pub requests: u64,
    pub errors: u64,
}

impl EpochOutcome {
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.was_banned != self.banned
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: u64,
    errors: u64,
}

#[derive(Debug, Default)]
pub struct TrafficState {
    counters: Mutex<Counters>,
    banned: AtomicBool,
}

impl TrafficState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Counters stay consistent even if a holder panicked: every critical
    // section is a plain arithmetic update.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_request(&self) {
        let mut counters = self.lock();
        counters.requests = counters.requests.saturating_add(1);
    }

    pub fn record_error(&self) {
        let mut counters = self.lock();
        counters.errors = counters.errors.saturating_add(1);
    }

    #[must_use]
    pub fn is_banned(&self) -> bool {
        self.banned.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn snapshot(&self) -> TrafficSnapshot {
        let counters = self.lock();
        TrafficSnapshot {
            requests: counters.requests,
            errors: counters.errors,
            banned: self.is_banned(),
        }
    }

    /// Decide the ban flag from the current counters, then pay down one
    /// epoch's worth of each counter.
    ///
    /// Both steps run under the host lock, so an increment racing with the
    /// sanitizer lands either before the decision or after the decay.
    pub fn evaluate_and_decay(&self, thresholds: &Thresholds) -> EpochOutcome {
        let mut counters = self.lock();

        let banned = counters.requests > thresholds.max_req_per_sec
            || counters.errors > thresholds.max_err_per_sec;
        let was_banned = self.banned.swap(banned, Ordering::AcqRel);

        let outcome = EpochOutcome {
            was_banned,
            banned,
            requests: counters.requests,
            errors: counters.errors,
        };

        counters.requests = decay(counters.requests, thresholds.max_req_per_sec);
        counters.errors = decay(counters.errors, thresholds.max_err_per_sec);

        outcome
    }
}

/// At or below the threshold the counter clears; above it, the surplus is
/// carried into the next epoch as debt.
#[must_use]
pub const fn decay(count: u64, threshold: u64) -> u64 {
    if count <= threshold {
        0
    } else {
        count - threshold
    }
}
