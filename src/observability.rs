use std::time::Duration;

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::Env, models::ApiEnvelope};

/// Header used for request correlation across the gateway and the services.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// wrap
///
/// Applies the layers every router in the system shares: request deadline, request-id
/// generation and propagation, request tracing and CORS. An incoming `x-request-id`
/// (set by the gateway) is kept, so one id follows a request across services.
///
/// The deadline sits inside the tracing layer; when it fires, the in-flight handler
/// future is dropped, which cancels any outbound Authority call it was awaiting. The
/// bare 408 it produces is rewritten into the standard envelope.
pub fn wrap(router: Router, cors_origins: &[String], request_timeout: Option<Duration>) -> Router {
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let router = match request_timeout {
        Some(timeout) => router
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ))
            .layer(middleware::map_response(deadline_envelope)),
        None => router,
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors_layer(cors_origins))
}

/// deadline_envelope
///
/// Handlers never answer 408 themselves, so a 408 here always comes from the deadline.
async fn deadline_envelope(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    tracing::warn!("request deadline exceeded");
    let body = ApiEnvelope::failure(i32::from(StatusCode::REQUEST_TIMEOUT.as_u16()), "请求超时");
    (StatusCode::REQUEST_TIMEOUT, Json(body)).into_response()
}

/// cors_layer
///
/// Any origin when none are configured, otherwise the configured allow-list.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// trace_span_logger
///
/// Builds the per-request span carrying method, uri and the correlation id. Request
/// headers other than the id are never recorded.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

/// init_tracing
///
/// Installs the global subscriber. `RUST_LOG` wins over `default_filter`. Local runs
/// get human-readable output, production gets one JSON object per line for the log
/// aggregator.
pub fn init_tracing(env: &Env, default_filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// shutdown_signal
///
/// Resolves on Ctrl-C or SIGTERM so in-flight requests can finish before exit.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
