// src/validator.rs

use crate::claims::{check_claims, AccessTokenClaims, ClaimCheck};
use crate::client::JwksClient;
use crate::config::ResourceServerConfig;
use crate::error::NilaOidcError;
use crate::identity::AuthenticatedIdentity;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, get_current_timestamp, Validation};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The bearer token validator.
///
/// This struct is initialized with a `ResourceServerConfig` and should be
/// created once and reused for all requests. It owns the JWKS client and
/// performs every step between "here is a token" and "here is who sent it".
#[derive(Clone)]
pub struct Validator {
    config: Arc<ResourceServerConfig>,
    jwks_client: JwksClient,
    // Signature-only settings; the claim policy lives in `crate::claims`.
    signature_validation: Arc<Validation>,
}

impl Validator {
    /// Creates a `Validator` around an already initialized JWKS client.
    pub fn new(config: ResourceServerConfig, jwks_client: JwksClient) -> Self {
        let mut validation = Validation::new(config.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            config: Arc::new(config),
            jwks_client,
            signature_validation: Arc::new(validation),
        }
    }

    /// Performs discovery, loads the key set, and returns a ready validator.
    ///
    /// # Errors
    ///
    /// Any error here is a startup failure; see [`JwksClient::initialize`].
    pub async fn initialize(config: ResourceServerConfig) -> Result<Self, NilaOidcError> {
        let jwks_client = JwksClient::initialize(&config).await?;
        Ok(Self::new(config, jwks_client))
    }

    pub fn config(&self) -> &ResourceServerConfig {
        &self.config
    }

    pub fn jwks_client(&self) -> &JwksClient {
        &self.jwks_client
    }

    /// Validates a bearer access token against the current time.
    ///
    /// This method performs a full validation of the token, including:
    /// 1. Header decoding and the permitted-algorithm check.
    /// 2. Key resolution by `kid` (refreshing the key set once on a miss).
    /// 3. Signature verification and claim decoding.
    /// 4. Audience, issuer, expiration and scope checks, in that order.
    /// 5. Extraction of the identity attribute.
    pub async fn validate(&self, token: &str) -> Result<AuthenticatedIdentity, NilaOidcError> {
        self.validate_at(token, get_current_timestamp()).await
    }

    /// Same as [`Validator::validate`], with `now` in seconds since the epoch.
    #[instrument(name = "validate_token", skip_all)]
    pub async fn validate_at(
        &self,
        token: &str,
        now: u64,
    ) -> Result<AuthenticatedIdentity, NilaOidcError> {
        let header = decode_header(token).map_err(NilaOidcError::MalformedToken)?;

        if header.alg != self.config.algorithm {
            return Err(NilaOidcError::UnsupportedAlgorithm(header.alg));
        }

        let kid = header.kid.ok_or(NilaOidcError::MissingKeyId)?;
        let key = self.jwks_client.resolve(&kid).await?;

        // A key published for a different family or a pinned algorithm cannot verify this token.
        if !key.family.supports(header.alg) || key.algorithm.is_some_and(|alg| alg != header.alg) {
            return Err(NilaOidcError::UnsupportedAlgorithm(header.alg));
        }

        let claims = decode::<AccessTokenClaims>(token, &key.key, &self.signature_validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => NilaOidcError::InvalidSignature(e),
                _ => NilaOidcError::MalformedToken(e),
            })?
            .claims;
        debug!(kid = %kid, ?claims, "Decoded access token claims");

        check_claims(&claims, &self.config, now).map_err(NilaOidcError::ClaimValidation)?;

        let identity = claims
            .identity(&self.config.identity_claim)
            .map(str::to_owned)
            .ok_or(NilaOidcError::ClaimValidation(ClaimCheck::Identity))?;

        Ok(AuthenticatedIdentity::new(identity, claims))
    }
}
