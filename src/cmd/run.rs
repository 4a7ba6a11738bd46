//! `weeproxy run`: start the proxy server.
//!
//! Loads the JSON config once, builds the circuit breaker around a pooled
//! hyper client, and serves until SIGTERM / Ctrl+C. On the way out the
//! epoch sanitizer is stopped and awaited.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::breaker::HyperUpstream;
use crate::cli::RunArgs;
use crate::config;
use crate::error::WeeproxyError;
use crate::logging;
use crate::server::{self, AppState, LoadedConfig};

pub async fn execute(args: RunArgs) -> Result<(), WeeproxyError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let (config, version) = config::load_file(&args.config, &args.lb_separator).await?;
    let addr = config.listen_addr(args.listen.as_deref())?;

    tracing::info!(
        path = %args.config.display(),
        version = %version.short(),
        "config loaded"
    );

    let upstream = Arc::new(HyperUpstream::new(
        server::build_http_client(),
        config.upstream_timeout(),
    ));

    let loaded = LoadedConfig {
        version,
        source: args.config.display().to_string(),
        loaded_at: Instant::now(),
    };
    let state = Arc::new(AppState::new(&config, loaded, &args.lb_separator, upstream));

    let route_count = state.routes.len();
    let host_count = state.proxy.registry().host_count();
    let thresholds = state.proxy.thresholds();

    let router = server::build_router(Arc::clone(&state), args.max_body);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        routes = route_count,
        backends = host_count,
        max_req_per_sec = thresholds.max_req_per_sec,
        max_err_per_sec = thresholds.max_err_per_sec,
        "weeproxy started"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    state.proxy.shutdown().await;

    tracing::info!("weeproxy stopped");
    Ok(())
}
