use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{Extensions, request::Parts},
};

use crate::{error::AdmissionError, models::Identity};

/// IdentityContext
///
/// Request-scoped carrier for the identity resolved by the Authority. It lives in the
/// request's extensions, so it is dropped with the request and never shared across
/// requests. Only the verification stage can bind one, and only once.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    identity: Arc<Identity>,
}

impl IdentityContext {
    /// bind
    ///
    /// Writes the identity into the request scope. A second bind for the same request
    /// is refused rather than silently replacing the first identity.
    pub(crate) fn bind(extensions: &mut Extensions, identity: Identity) -> Result<(), AdmissionError> {
        if extensions.get::<IdentityContext>().is_some() {
            return Err(AdmissionError::IdentityRebound);
        }
        extensions.insert(IdentityContext {
            identity: Arc::new(identity),
        });
        Ok(())
    }

    /// Reads the identity bound to a request, if verification has run.
    pub fn current(extensions: &Extensions) -> Option<&Identity> {
        extensions
            .get::<IdentityContext>()
            .map(|context| context.identity.as_ref())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// AuthUser Extractor Result
///
/// The verified identity, as seen by a handler. Handlers take `AuthUser` as an argument
/// instead of re-reading headers or calling the Authority again.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

/// AuthUser Extractor Implementation
///
/// Reads the `IdentityContext` written by the admission chain. A handler mounted
/// without the chain gets a 401 instead of running with no identity.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AdmissionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        IdentityContext::current(&parts.extensions)
            .cloned()
            .map(AuthUser)
            .ok_or(AdmissionError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher() -> Identity {
        Identity {
            user_id: "t-9".to_string(),
            username: "tchen".to_string(),
            user_type: "teacher".to_string(),
            role: Some("head_teacher".to_string()),
            status: "active".to_string(),
            real_name: "T. Chen".to_string(),
        }
    }

    #[test]
    fn bind_is_write_once() {
        let mut extensions = Extensions::new();
        IdentityContext::bind(&mut extensions, teacher()).unwrap();

        let mut impostor = teacher();
        impostor.user_type = "admin".to_string();
        assert_eq!(
            IdentityContext::bind(&mut extensions, impostor),
            Err(AdmissionError::IdentityRebound)
        );
        assert_eq!(
            IdentityContext::current(&extensions).map(|i| i.user_type.as_str()),
            Some("teacher")
        );
    }

    #[test]
    fn bound_context_exposes_identity() {
        let mut extensions = Extensions::new();
        IdentityContext::bind(&mut extensions, teacher()).unwrap();

        let context = extensions.get::<IdentityContext>().unwrap();
        assert_eq!(context.identity(), &teacher());
    }

    #[test]
    fn empty_scope_has_no_identity() {
        assert!(IdentityContext::current(&Extensions::new()).is_none());
    }
}
