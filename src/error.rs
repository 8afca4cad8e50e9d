// src/error.rs

use crate::claims::ClaimCheck;
use jsonwebtoken::Algorithm;
use thiserror::Error;

/// The primary error type for the `nila-oidc-rs` library.
///
/// Startup failures (configuration, discovery, the first key set fetch) are
/// fatal to the resource server. Everything else is a per-request rejection
/// that the middleware turns into a uniform `401`.
#[derive(Debug, Error)]
pub enum NilaOidcError {
    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The OpenID Connect discovery document could not be fetched or parsed.
    #[error("Failed to fetch discovery document from {url}")]
    DiscoveryFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The discovery document was fetched but its contents are unusable.
    #[error("Invalid discovery document from {url}: {reason}")]
    InvalidDiscoveryDocument { url: String, reason: String },

    /// The JSON Web Key Set could not be fetched or parsed.
    #[error("Failed to fetch JWKS from {url}")]
    KeySetFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// No key with the given 'kid' exists, even after refreshing the key set.
    #[error("Key not found for kid: {0}")]
    UnknownKey(String),

    /// A JWK could not be turned into a verification key.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The bearer token is not a structurally valid JWT, or its claims could not be decoded.
    #[error("Malformed token: {0}")]
    MalformedToken(#[source] jsonwebtoken::errors::Error),

    /// The JWT header is missing the required 'kid' (Key ID) field.
    #[error("The JWT header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    /// The token was signed with an algorithm other than the permitted one.
    #[error("Unsupported algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    /// The token signature did not verify against the resolved key.
    #[error("Signature verification failed: {0}")]
    InvalidSignature(#[source] jsonwebtoken::errors::Error),

    /// One of the claim policy checks failed.
    #[error("Claim validation failed: {0}")]
    ClaimValidation(ClaimCheck),
}

impl NilaOidcError {
    /// Returns `true` for errors that reject a single request, as opposed to
    /// errors that prevent the resource server from starting.
    pub fn is_request_rejection(&self) -> bool {
        matches!(
            self,
            NilaOidcError::UnknownKey(_)
                | NilaOidcError::MalformedToken(_)
                | NilaOidcError::MissingKeyId
                | NilaOidcError::UnsupportedAlgorithm(_)
                | NilaOidcError::InvalidSignature(_)
                | NilaOidcError::ClaimValidation(_)
        )
    }
}
