use admission_gate::{
    AppState,
    authority::{AuthorityState, HttpAuthorityClient},
    config::AppConfig,
    create_router, observability,
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// main
///
/// Entry point of the protected service: configuration, logging, the Authority
/// client, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging
    observability::init_tracing(
        &config.env,
        "admission_gate=debug,tower_http=info,axum=info",
    );
    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Authority client, shared by every request for the life of the process.
    let client = HttpAuthorityClient::new(&config.authority_url, config.authority_timeout)
        .expect("FATAL: Failed to build the Authority HTTP client.");
    tracing::info!(
        endpoint = client.endpoint(),
        timeout_secs = config.authority_timeout.as_secs(),
        failure_mode = ?config.failure_mode,
        "Authority configured"
    );
    let authority = Arc::new(client) as AuthorityState;

    // 4. Router and server
    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState { authority, config });

    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {addr}: {e}"));
    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://{addr}/swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(observability::shutdown_signal())
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
