//! Periodic ban evaluation and counter decay.
//!
//! One task owns the epoch clock. Each tick runs [`run_epoch`] to completion
//! before the next tick is awaited, and ticks missed while an epoch was still
//! running are skipped rather than bunched up, so two evaluations never
//! overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::registry::BackendRegistry;
use super::traffic::Thresholds;

pub const EPOCH: Duration = Duration::from_secs(1);

/// Evaluate and decay every known host once. Returns the number of hosts
/// whose ban state changed.
pub fn run_epoch(registry: &BackendRegistry, thresholds: &Thresholds) -> usize {
    let mut transitions = 0;

    for (host, state) in registry.hosts() {
        let outcome = state.evaluate_and_decay(thresholds);
        if !outcome.changed() {
            continue;
        }
        transitions += 1;

        if outcome.banned {
            tracing::warn!(
                host = %host,
                requests = outcome.requests,
                errors = outcome.errors,
                max_req_per_sec = thresholds.max_req_per_sec,
                max_err_per_sec = thresholds.max_err_per_sec,
                "backend banned"
            );
        } else {
            tracing::info!(host = %host, "backend recovered");
        }
    }

    transitions
}

pub fn spawn(
    registry: Arc<BackendRegistry>,
    thresholds: Thresholds,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await; // Skip first immediate tick

        tracing::debug!(
            hosts = registry.host_count(),
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "epoch sanitizer started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    tracing::debug!("epoch sanitizer shutting down");
                    return;
                }
            }

            run_epoch(&registry, &thresholds);
        }
    })
}
