// src/config.rs

use crate::discovery::PROTECTED_RESOURCE_PATH;
use crate::error::NilaOidcError;
use jsonwebtoken::Algorithm;
use std::time::Duration;
use url::Url;

const DISCOVERY_SUFFIX: &str = "/.well-known/openid-configuration";

/// The main configuration for the `nila-oidc-rs` resource server.
///
/// This struct holds everything needed to reach the authorization server and
/// to decide whether an access token was meant for this resource. It should be
/// constructed using the `ConfigBuilder` and is shared read-only afterwards.
///
/// The issuer and audience are kept exactly as configured: the `iss` and `aud`
/// claims are compared by plain string equality.
#[derive(Clone, Debug)]
pub struct ResourceServerConfig {
    /// The issuer URL of the authorization server.
    pub issuer_url: String,
    /// This resource server's identifier, expected in the token's `aud` claim.
    pub audience: String,
    /// The scope every access token must carry.
    pub required_scope: String,
    /// Where the OpenID Connect discovery document lives.
    pub discovery_url: Url,
    /// Optional override for the JWKS endpoint. When `None`, the `jwks_uri`
    /// from the discovery document is used.
    pub jwks_uri: Option<Url>,
    /// Timeout applied to every request sent to the authorization server.
    pub http_timeout: Duration,
    /// Scopes advertised in the `WWW-Authenticate` challenge.
    pub challenge_scope: String,
    /// The claim that carries the caller's identity. Falls back to `sub`.
    pub identity_claim: String,
    /// The single signing algorithm tokens may use.
    pub algorithm: Algorithm,
}

impl ResourceServerConfig {
    /// The URL of this resource's protected-resource metadata document.
    pub fn resource_metadata_url(&self) -> String {
        format!(
            "{}{}",
            self.audience.trim_end_matches('/'),
            PROTECTED_RESOURCE_PATH
        )
    }
}

/// A builder for creating a `ResourceServerConfig` instance.
///
/// This builder provides a fluent API to ensure that the configuration is
/// constructed correctly and with all required fields.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    issuer_url: Option<String>,
    audience: Option<String>,
    required_scope: Option<String>,
    discovery_url: Option<Url>,
    jwks_uri: Option<Url>,
    http_timeout: Option<Duration>,
    challenge_scope: Option<String>,
    identity_claim: Option<String>,
    algorithm: Option<Algorithm>,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the configuration from the process environment.
    ///
    /// `ISSUER_URL`, `MCP_SERVER_URL` and `SCOPE` are required.
    /// `OPENID_CONFIG_URL` and `HTTP_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self, NilaOidcError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConfigBuilder::from_env`], with a caller-supplied lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, NilaOidcError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &str| {
            optional(key).ok_or_else(|| NilaOidcError::MissingConfiguration(key.to_string()))
        };

        let mut builder = Self::new()
            .issuer_url(&required("ISSUER_URL")?)?
            .audience(&required("MCP_SERVER_URL")?)?
            .required_scope(required("SCOPE")?);

        if let Some(url) = optional("OPENID_CONFIG_URL") {
            builder = builder.discovery_url(&url)?;
        }
        if let Some(secs) = optional("HTTP_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|e| {
                NilaOidcError::InvalidConfiguration(format!("HTTP_TIMEOUT_SECS: {e}"))
            })?;
            builder = builder.http_timeout(Duration::from_secs(secs));
        }
        Ok(builder)
    }

    /// Sets the issuer URL of the authorization server. This is a required field.
    ///
    /// # Arguments
    ///
    /// * `url` - The issuer URL, e.g., "https://auth.example.com".
    pub fn issuer_url(mut self, url: &str) -> Result<Self, NilaOidcError> {
        Url::parse(url).map_err(|e| NilaOidcError::InvalidUrl(e.to_string()))?;
        self.issuer_url = Some(url.to_string());
        Ok(self)
    }

    /// Sets this resource server's audience URL. This is a required field.
    pub fn audience(mut self, url: &str) -> Result<Self, NilaOidcError> {
        Url::parse(url).map_err(|e| NilaOidcError::InvalidUrl(e.to_string()))?;
        self.audience = Some(url.to_string());
        Ok(self)
    }

    /// Sets the scope every token must carry. This is a required field.
    pub fn required_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scope = Some(scope.into());
        self
    }

    /// Sets an explicit discovery document URL instead of deriving it from the issuer.
    pub fn discovery_url(mut self, url: &str) -> Result<Self, NilaOidcError> {
        let parsed_url = Url::parse(url).map_err(|e| NilaOidcError::InvalidUrl(e.to_string()))?;
        self.discovery_url = Some(parsed_url);
        Ok(self)
    }

    /// Sets an explicit JWKS URI, ignoring the one advertised by discovery. This is optional.
    pub fn jwks_uri(mut self, url: &str) -> Result<Self, NilaOidcError> {
        let parsed_url = Url::parse(url).map_err(|e| NilaOidcError::InvalidUrl(e.to_string()))?;
        self.jwks_uri = Some(parsed_url);
        Ok(self)
    }

    /// Sets the timeout for requests to the authorization server.
    /// Defaults to 10 seconds.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Sets the scopes advertised in the `WWW-Authenticate` challenge.
    /// Defaults to `"openid profile email"`.
    pub fn challenge_scope(mut self, scope: impl Into<String>) -> Self {
        self.challenge_scope = Some(scope.into());
        self
    }

    /// Sets the claim used as the caller's identity. Defaults to `email`.
    pub fn identity_claim(mut self, claim: impl Into<String>) -> Self {
        self.identity_claim = Some(claim.into());
        self
    }

    /// Sets the permitted signing algorithm. Defaults to `RS256`.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Consumes the builder and returns a `ResourceServerConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or empty, or if the
    /// algorithm is a symmetric one (keys come from a public key set).
    pub fn build(self) -> Result<ResourceServerConfig, NilaOidcError> {
        let issuer_url = self
            .issuer_url
            .filter(|s| !s.is_empty())
            .ok_or(NilaOidcError::MissingConfiguration("issuer_url".to_string()))?;
        let audience = self
            .audience
            .filter(|s| !s.is_empty())
            .ok_or(NilaOidcError::MissingConfiguration("audience".to_string()))?;
        let required_scope = self
            .required_scope
            .filter(|s| !s.trim().is_empty())
            .ok_or(NilaOidcError::MissingConfiguration("required_scope".to_string()))?;

        let algorithm = self.algorithm.unwrap_or(Algorithm::RS256);
        if matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(NilaOidcError::InvalidConfiguration(format!(
                "{algorithm:?} cannot be verified with a public key set"
            )));
        }

        let discovery_url = match self.discovery_url {
            Some(url) => url,
            None => {
                let derived = format!("{}{}", issuer_url.trim_end_matches('/'), DISCOVERY_SUFFIX);
                Url::parse(&derived).map_err(|e| NilaOidcError::InvalidUrl(e.to_string()))?
            }
        };

        Ok(ResourceServerConfig {
            issuer_url,
            audience,
            required_scope,
            discovery_url,
            jwks_uri: self.jwks_uri,
            http_timeout: self.http_timeout.unwrap_or(Duration::from_secs(10)),
            challenge_scope: self
                .challenge_scope
                .unwrap_or_else(|| "openid profile email".to_string()),
            identity_claim: self.identity_claim.unwrap_or_else(|| "email".to_string()),
            algorithm,
        })
    }
}
