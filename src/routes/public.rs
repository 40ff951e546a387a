use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints that never consult the Authority.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Used by the gateway and the load balancer; must keep answering while the
        // Authority is down.
        .route("/health", get(handlers::health))
}
