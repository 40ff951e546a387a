use crate::{AppState, admission::AdmissionChain, handlers, roles::RoleGate};
use axum::{Router, routing::get};

/// Gated Router Module
///
/// One sub-router per role gate. Each is protected by its own chain (verification,
/// then the gate), and the sub-routers are merged afterwards so no gate leaks onto
/// a neighbour's routes.
pub fn gated_routes(state: AppState) -> Router<AppState> {
    [
        ("/api/access/admin-only", RoleGate::ADMIN_ONLY),
        ("/api/access/student-or-admin", RoleGate::STUDENT_OR_ADMIN),
        (
            "/api/access/student-teacher-or-admin",
            RoleGate::STUDENT_TEACHER_OR_ADMIN,
        ),
        ("/api/access/teacher-or-admin", RoleGate::TEACHER_OR_ADMIN),
    ]
    .into_iter()
    .fold(Router::new(), |router, (path, gate)| {
        let group = Router::<AppState>::new().route(path, get(handlers::access_probe));
        router.merge(AdmissionChain::gated(gate).protect(group, state.clone()))
    })
}
