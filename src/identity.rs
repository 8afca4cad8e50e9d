// src/identity.rs

use crate::claims::AccessTokenClaims;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::error;

/// The verified caller, attached to the request by the authentication middleware.
///
/// Downstream handlers receive it through request extensions, keyed by this
/// type, or by taking it as an axum extractor argument.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    identity: String,
    claims: Arc<AccessTokenClaims>,
}

impl AuthenticatedIdentity {
    pub fn new(identity: impl Into<String>, claims: AccessTokenClaims) -> Self {
        Self {
            identity: identity.into(),
            claims: Arc::new(claims),
        }
    }

    /// The identity attribute, e.g. the caller's email address.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The full verified claim set.
    pub fn claims(&self) -> &AccessTokenClaims {
        &self.claims
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.claims.scopes().any(|s| s == scope)
    }
}

impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or_else(|| {
                error!("AuthenticatedIdentity requested but the auth middleware is not installed");
                StatusCode::INTERNAL_SERVER_ERROR
            })
    }
}
