use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// --- Module Structure ---

// Admission core: identity resolution, role gates and their composition.
pub mod admission;
pub mod auth;
pub mod authority;
pub mod error;
pub mod roles;

// Service plumbing.
pub mod config;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod observability;

// Route groups, segregated by required admission.
pub mod routes;
use routes::{authenticated, gated, public};

// --- Public Re-exports ---

pub use admission::AdmissionChain;
pub use authority::{Authority, AuthorityState, HttpAuthorityClient, MockAuthority};
pub use config::AppConfig;
pub use error::AdmissionError;
pub use models::Identity;
pub use roles::{RoleClass, RoleGate, RoleSet};

/// ApiDoc
///
/// OpenAPI document for the service's own endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::health, handlers::get_me, handlers::access_probe),
    components(schemas(models::Identity, models::AdmissionReport, models::HealthStatus)),
    tags((name = "admission-gate", description = "Authority-delegated admission"))
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable state for every request: the Authority handle and the loaded
/// configuration. Nothing in it is mutated after startup, so it needs no locking.
#[derive(Clone)]
pub struct AppState {
    /// Verification backend, consulted once per protected request.
    pub authority: AuthorityState,
    /// The loaded environment configuration.
    pub config: AppConfig,
}

/// create_router
///
/// Assembles the service: public routes, verified routes, gated routes, API docs,
/// then the shared observability and deadline layers.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes(state.clone()))
        .merge(gated::gated_routes(state.clone()))
        .with_state(state);

    observability::wrap(router, &config.cors_origins, Some(config.request_timeout))
}
