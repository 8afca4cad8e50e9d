// src/lib.rs

//! An OAuth 2.1 resource server gate.
//!
//! Bearer access tokens are verified against the authorization server's
//! published signing keys (found through OpenID Connect discovery), checked
//! for audience, issuer, expiry and scope, and turned into an
//! [`AuthenticatedIdentity`](identity::AuthenticatedIdentity) that downstream
//! handlers receive explicitly. Unauthenticated clients are pointed at the
//! RFC 9728 protected resource metadata document.

pub mod claims;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod model;
pub mod validator;

/// The public prelude for the `nila-oidc-rs` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::claims::{AccessTokenClaims, Audience, ClaimCheck};
    pub use crate::client::JwksClient;
    pub use crate::config::{ConfigBuilder, ResourceServerConfig};
    pub use crate::discovery::{ProtectedResourceMetadata, PROTECTED_RESOURCE_PATH};
    pub use crate::error::NilaOidcError;
    pub use crate::identity::AuthenticatedIdentity;
    pub use crate::middleware::{AuthLayer, AuthService};
    pub use crate::validator::Validator;
    pub use jsonwebtoken::Algorithm;
}
