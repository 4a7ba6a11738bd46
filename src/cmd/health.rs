//! `weeproxy health`: check the health of a running instance.
//!
//! Sends a `GET /health` request to the specified URL and displays
//! the response as formatted text or raw JSON.

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::cli::HealthArgs;
use crate::error::WeeproxyError;
use crate::health::HealthResponse;

pub async fn execute(args: HealthArgs) -> Result<(), WeeproxyError> {
    let url = format!("{}/health", args.url.trim_end_matches('/'));
    let uri: hyper::Uri = url
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| WeeproxyError::UriParse {
            source: Box::new(e),
        })?;

    let connector = hyper_util::client::legacy::connect::HttpConnector::new();
    let client = Client::builder(TokioExecutor::new()).build(connector);

    let req = hyper::Request::builder()
        .uri(uri)
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| WeeproxyError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| WeeproxyError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| WeeproxyError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| WeeproxyError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();

    if !status.is_success() {
        return Err(WeeproxyError::HealthCheckFailed(status));
    }

    if args.json {
        println!("{}", String::from_utf8_lossy(&body));
        return Ok(());
    }

    match serde_json::from_slice::<HealthResponse>(&body) {
        Ok(health) => print_report(&args.url, &health),
        Err(e) => {
            eprintln!("Failed to parse health response: {e}");
            println!("{}", String::from_utf8_lossy(&body));
        }
    }

    Ok(())
}

fn print_report(url: &str, health: &HealthResponse) {
    let mark = if health.status == "healthy" {
        "\u{2713}"
    } else {
        "!"
    };
    println!("{mark} weeproxy is {} ({url})", health.status);
    println!("  version:        {} ({})", health.version, health.commit);
    println!("  uptime:         {}", format_uptime(health.uptime_seconds));
    println!("  config source:  {}", health.config.source);
    println!(
        "  config version: {} (loaded {}s ago)",
        health.config.version, health.config.loaded_ago_seconds
    );
    println!(
        "  routes:         {} routes, {} backends",
        health.config.routes, health.config.backends
    );
    println!(
        "  limits:         {} req/s, {} err/s per backend",
        health.thresholds.max_req_per_sec, health.thresholds.max_err_per_sec
    );
    println!(
        "  requests:       {} forwarded, {} failed, {} rejected",
        health.stats.requests_forwarded,
        health.stats.requests_failed,
        health.stats.requests_rejected
    );
    for backend in &health.backends {
        let state = if backend.banned { "BANNED" } else { "ok" };
        println!(
            "    {:<30} {state:<6} req={} err={}",
            backend.host, backend.requests, backend.errors
        );
    }
}

fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
