use admission_gate::{
    config::GatewayConfig,
    gateway::{GatewayState, create_gateway_router},
    observability,
};
use tokio::net::TcpListener;

/// main
///
/// Entry point of the API gateway. The gateway forwards by path prefix and performs
/// no identity checks; each backend runs its own admission chain.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = GatewayConfig::load();

    observability::init_tracing(&config.env, "gateway=debug,admission_gate=debug,tower_http=info");

    for route in &config.routes {
        tracing::info!(prefix = %route.prefix, upstream = %route.base_url, "route registered");
    }
    tracing::info!(
        max_body_bytes = config.max_body_bytes,
        upstream_timeout_secs = config.upstream_timeout.as_secs(),
        "forwarding limits"
    );
    if config.routes.is_empty() {
        tracing::warn!("GATEWAY_ROUTES is empty; every request will answer 404");
    }

    let state = GatewayState::new(config.routes.clone(), config.upstream_timeout)
        .expect("FATAL: Failed to build the upstream HTTP client.");
    let app = create_gateway_router(state, &config);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {addr}: {e}"));
    tracing::info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(observability::shutdown_signal())
        .await
        .expect("FATAL: Gateway server terminated unexpectedly.");
}
