//! End-to-end circuit breaker behaviour through `SaneProxy`, driven by
//! tokio's paused clock so epoch boundaries are exact.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use weeproxy::breaker::transport::UpstreamBody;
use weeproxy::breaker::{SaneProxy, Thresholds, Upstream, EPOCH};
use weeproxy::error::BoxError;

/// Answers every request with the currently configured status.
struct StatusUpstream {
    status: AtomicU16,
}

impl StatusUpstream {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status: AtomicU16::new(status),
        })
    }
}

#[async_trait]
impl Upstream for StatusUpstream {
    async fn send(&self, _request: Request<Full<Bytes>>) -> Result<Response<UpstreamBody>, BoxError> {
        let status = StatusCode::from_u16(self.status.load(Ordering::Relaxed))?;
        let body = Full::new(Bytes::from_static(b"ok"))
            .map_err(|never| -> BoxError { match never {} })
            .boxed_unsync();
        Ok(Response::builder().status(status).body(body)?)
    }
}

fn proxy(thresholds: Thresholds, groups: &[&str], upstream: Arc<StatusUpstream>) -> SaneProxy {
    let groups: Vec<String> = groups.iter().map(|s| (*s).to_string()).collect();
    SaneProxy::new(thresholds, &groups, " ", upstream)
}

async fn send(proxy: &SaneProxy, uri: &str, times: usize) {
    for _ in 0..times {
        let request = Request::builder()
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap();
        proxy.round_trip(request).await.unwrap();
    }
}

/// Sleep past the next epoch tick.
async fn next_epoch() {
    tokio::time::sleep(EPOCH).await;
}

#[tokio::test(start_paused = true)]
async fn request_overload_bans_for_one_epoch() {
    let proxy = proxy(Thresholds::new(5, 1), &["http://b1"], StatusUpstream::new(200));

    send(&proxy, "http://b1/x", 7).await;
    assert!(!proxy.banned("http://b1"));

    tokio::time::sleep(EPOCH + Duration::from_millis(10)).await;
    assert!(proxy.banned("http://b1"));
    assert_eq!(proxy.traffic("http://b1").unwrap().requests, 2);

    next_epoch().await;
    assert!(!proxy.banned("http://b1"));
    assert_eq!(proxy.traffic("http://b1").unwrap().requests, 0);

    proxy.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn traffic_at_threshold_is_allowed() {
    let proxy = proxy(Thresholds::new(5, 1), &["http://b1"], StatusUpstream::new(200));

    send(&proxy, "http://b1/", 5).await;
    tokio::time::sleep(EPOCH + Duration::from_millis(10)).await;

    assert!(!proxy.banned("http://b1"));
    assert_eq!(proxy.traffic("http://b1").unwrap().requests, 0);

    proxy.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn single_server_error_with_zero_budget_bans() {
    let proxy = proxy(Thresholds::new(100, 0), &["http://b1"], StatusUpstream::new(500));

    send(&proxy, "http://b1/", 1).await;
    assert_eq!(proxy.traffic("http://b1").unwrap().errors, 1);

    tokio::time::sleep(EPOCH + Duration::from_millis(10)).await;
    assert!(proxy.banned("http://b1"));

    proxy.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn large_debt_is_paid_down_over_several_epochs() {
    // 23 requests against R=5: debt 18 after the first tick. Ticks on 18, 13
    // and 8 stay banned; the tick on 3 allows.
    let proxy = proxy(Thresholds::new(5, 100), &["http://b1"], StatusUpstream::new(200));

    send(&proxy, "http://b1/", 23).await;
    tokio::time::sleep(EPOCH + Duration::from_millis(10)).await;
    assert!(proxy.banned("http://b1"));

    for _ in 0..3 {
        next_epoch().await;
        assert!(proxy.banned("http://b1"));
    }
    next_epoch().await;
    assert!(!proxy.banned("http://b1"));

    proxy.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn aliases_sharing_an_authority_share_state() {
    let upstream = StatusUpstream::new(200);
    let proxy = proxy(
        Thresholds::new(2, 100),
        &["http://shared:80 http://other", "http://shared/base"],
        upstream,
    );

    send(&proxy, "http://shared/a", 3).await;
    tokio::time::sleep(EPOCH + Duration::from_millis(10)).await;

    assert!(proxy.banned("http://shared:80"));
    assert!(proxy.banned("http://shared/base"));
    assert!(!proxy.banned("http://other"));
    assert_eq!(proxy.registry().host_count(), 2);

    proxy.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn recovery_follows_upstream_healing() {
    let upstream = StatusUpstream::new(503);
    let proxy = proxy(Thresholds::new(100, 1), &["http://b1"], upstream.clone());

    send(&proxy, "http://b1/", 3).await;
    tokio::time::sleep(EPOCH + Duration::from_millis(10)).await;
    assert!(proxy.banned("http://b1"));

    upstream.status.store(200, Ordering::Relaxed);
    send(&proxy, "http://b1/", 3).await;

    // Errors 3 -> debt 2 -> still over at the next tick, then clear.
    next_epoch().await;
    assert!(proxy.banned("http://b1"));
    next_epoch().await;
    assert!(!proxy.banned("http://b1"));

    proxy.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn unknown_alias_is_never_banned() {
    let proxy = proxy(Thresholds::default(), &["http://b1"], StatusUpstream::new(200));
    assert!(!proxy.banned("http://nowhere"));
    assert!(proxy.traffic("http://nowhere").is_none());
    proxy.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let proxy = proxy(Thresholds::default(), &["http://b1"], StatusUpstream::new(200));
    proxy.shutdown().await;
    proxy.shutdown().await;
}
