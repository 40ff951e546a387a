use crate::{AppState, admission::AdmissionChain, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every route here runs behind the verification stage only: the request's
/// credential is checked by the Authority, and any verified caller is admitted.
pub fn authenticated_routes(state: AppState) -> Router<AppState> {
    let routes = Router::<AppState>::new()
        // GET /api/me
        // The caller's identity exactly as the Authority reported it.
        .route("/api/me", get(handlers::get_me));

    AdmissionChain::verified().protect(routes, state)
}
