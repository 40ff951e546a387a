use axum::{Extension, Json, extract::State};

use crate::{
    AppState,
    admission::AdmittedBy,
    auth::AuthUser,
    models::{AdmissionReport, ApiEnvelope, HealthStatus, Identity},
};

// --- Handlers ---

/// health
///
/// [Public Route] Liveness probe for the load balancer and the gateway.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthStatus))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        service: state.config.service_name.clone(),
    })
}

/// get_me
///
/// [Verified Route] Returns the identity the Authority resolved for this request.
/// No role gate applies; any verified caller is admitted.
///
/// The `AuthUser` extractor reads the identity bound by the admission chain, so this
/// handler never sees the raw credential and never calls the Authority itself. The
/// identity is echoed unchanged, `role` included when the Authority sent one.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Resolved identity", body = ApiEnvelope<Identity>),
        (status = 401, description = "Missing or rejected credential")
    )
)]
pub async fn get_me(AuthUser(identity): AuthUser) -> Json<ApiEnvelope<Identity>> {
    Json(ApiEnvelope::success(identity))
}

/// access_probe
///
/// [Gated Route] Reports which gate admitted the caller. Mounted once per gate under
/// `/api/access/*`, so each gate can be checked end to end through the gateway.
///
/// By the time this runs:
/// 1. Verification: the Authority accepted the credential and the identity is bound.
/// 2. Gate: the route's gate admitted the identity's role class and left `AdmittedBy`
///    in the request extensions.
///
/// A request that failed either step never reaches this handler; it was answered
/// with a 401 or 403 envelope by the chain.
#[utoipa::path(
    get,
    path = "/api/access/{gate}",
    params(("gate" = String, Path, description = "admin-only, student-or-admin, student-teacher-or-admin or teacher-or-admin")),
    responses(
        (status = 200, description = "Admitted", body = ApiEnvelope<AdmissionReport>),
        (status = 401, description = "Missing or rejected credential"),
        (status = 403, description = "Role class not allowed by this gate")
    )
)]
pub async fn access_probe(
    AuthUser(identity): AuthUser,
    Extension(AdmittedBy(gate)): Extension<AdmittedBy>,
) -> Json<ApiEnvelope<AdmissionReport>> {
    Json(ApiEnvelope::success(AdmissionReport {
        gate: gate.name().to_string(),
        allowed_roles: gate
            .allowed()
            .iter()
            .map(|class| class.as_str().to_string())
            .collect(),
        identity,
    }))
}
