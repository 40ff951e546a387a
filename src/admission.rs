use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};

use crate::{
    AppState,
    auth::IdentityContext,
    authority,
    config::FailureMode,
    error::AdmissionError,
    roles::RoleGate,
};

/// AdmissionState
///
/// Where a request stands in the chain. Logged at each transition; `Rejected` is
/// terminal and always carries the error that was rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionState {
    Unverified,
    Verified,
    Admitted,
    Rejected(AdmissionError),
}

/// AdmittedBy
///
/// Left in the request extensions by a gate that allowed the request, so handlers
/// can report which gate admitted them.
#[derive(Debug, Clone)]
pub struct AdmittedBy(pub RoleGate);

/// AdmissionChain
///
/// Verification first, then at most one role gate, then the handler. `protect` is the
/// only place the two middleware stages are layered, which keeps their order fixed.
#[derive(Debug, Clone, Default)]
pub struct AdmissionChain {
    gate: Option<RoleGate>,
}

impl AdmissionChain {
    /// Verification only; a verified request is admitted.
    pub fn verified() -> Self {
        Self { gate: None }
    }

    pub fn gated(gate: RoleGate) -> Self {
        Self { gate: Some(gate) }
    }

    pub fn gate(&self) -> Option<&RoleGate> {
        self.gate.as_ref()
    }

    /// protect
    ///
    /// Wraps every route of `router` in the chain. Axum runs the last `route_layer`
    /// first, so verification is added after the gate.
    pub fn protect<S>(self, router: Router<S>, state: AppState) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = match self.gate {
            Some(gate) => router.route_layer(middleware::from_fn_with_state(
                (state.clone(), gate),
                enforce_role_gate,
            )),
            None => router,
        };
        router.route_layer(middleware::from_fn_with_state(state, verify_identity))
    }
}

/// verify_identity
///
/// Stage one. Sends the caller's credential to the Authority and binds the resulting
/// identity to the request. Any failure ends the request here.
pub async fn verify_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mode = state.config.failure_mode;
    tracing::debug!(state = ?AdmissionState::Unverified, "admission started");

    let verified = match authority::credential(request.headers()) {
        Ok(credential) => state.authority.validate(credential).await,
        Err(err) => Err(err),
    };

    let identity = match verified {
        Ok(identity) => identity,
        Err(err) => return reject(err, mode),
    };

    let user_id = identity.user_id.clone();
    if let Err(err) = IdentityContext::bind(request.extensions_mut(), identity) {
        return reject(err, mode);
    }
    tracing::debug!(state = ?AdmissionState::Verified, %user_id, "identity bound");

    next.run(request).await
}

/// enforce_role_gate
///
/// Stage two. Reads the identity bound by `verify_identity`; without one the request
/// is unauthenticated, whatever the gate.
pub async fn enforce_role_gate(
    State((state, gate)): State<(AppState, RoleGate)>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Err(err) = gate.check(IdentityContext::current(request.extensions())) {
        return reject(err, state.config.failure_mode);
    }

    tracing::debug!(state = ?AdmissionState::Admitted, gate = gate.name(), "request admitted");
    request.extensions_mut().insert(AdmittedBy(gate));
    next.run(request).await
}

fn reject(err: AdmissionError, mode: FailureMode) -> Response {
    let response = err.render(mode);
    if err.is_infrastructure() {
        tracing::error!(status = response.status().as_u16(), error = %err, "authority unavailable");
    } else {
        tracing::warn!(status = response.status().as_u16(), error = %err, "request rejected");
    }
    tracing::debug!(state = ?AdmissionState::Rejected(err), "admission ended");
    response
}
