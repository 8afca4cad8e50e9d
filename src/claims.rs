// src/claims.rs

//! Access token claims and the resource server's claim policy.
//!
//! The checks here are pure: they read a decoded claim set plus the expected
//! values and answer yes or no. The validator applies them in a fixed order
//! (audience, issuer, expiration, scope) so rejections log deterministically.

use crate::config::ResourceServerConfig;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Allowance for clock drift between the authorization server and this service.
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 60;

/// The `aud` claim, which RFC 7519 allows to be a single string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(BTreeSet<String>),
}

impl Audience {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == value,
            Audience::Multiple(auds) => auds.contains(value),
        }
    }
}

/// The claims decoded from a verified access token.
///
/// Shapes are checked once, at decode time: an `aud` that is neither a string
/// nor an array of strings, or a `scope` that is not a string, fails decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub aud: Option<Audience>,
    /// Expiration time as seconds since the epoch.
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<u64>,
    /// Space-separated scope list.
    #[serde(default)]
    pub scope: Option<String>,
    /// Every other claim, e.g. `email`.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// NumericDate may legally carry a fractional part.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|secs| secs.max(0.0) as u64))
}

impl AccessTokenClaims {
    /// The individual scopes granted by the token.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or("").split_whitespace()
    }

    /// Looks up a string claim by name, covering both typed and extra claims.
    pub fn string_claim(&self, name: &str) -> Option<&str> {
        match name {
            "iss" => self.iss.as_deref(),
            "sub" => self.sub.as_deref(),
            "scope" => self.scope.as_deref(),
            other => self.extra.get(other).and_then(|v| v.as_str()),
        }
    }

    /// The caller's identity: the given claim if present, otherwise `sub`.
    pub fn identity(&self, identity_claim: &str) -> Option<&str> {
        self.string_claim(identity_claim)
            .or(self.sub.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Which policy check rejected a token. Recorded in logs, never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimCheck {
    Audience,
    Issuer,
    Expiration,
    Scope,
    Identity,
}

impl fmt::Display for ClaimCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClaimCheck::Audience => "audience",
            ClaimCheck::Issuer => "issuer",
            ClaimCheck::Expiration => "expiration",
            ClaimCheck::Scope => "scope",
            ClaimCheck::Identity => "identity",
        };
        f.write_str(name)
    }
}

/// True iff the token's audience is, or includes, `expected_audience`.
pub fn validate_audience(claims: &AccessTokenClaims, expected_audience: &str) -> bool {
    claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(expected_audience))
}

/// True iff the issuer claim equals `expected_issuer` exactly.
pub fn validate_issuer(claims: &AccessTokenClaims, expected_issuer: &str) -> bool {
    claims.iss.as_deref() == Some(expected_issuer)
}

/// True iff `now` (seconds since the epoch) is before `exp` plus the skew leeway.
pub fn validate_expiration(claims: &AccessTokenClaims, now: u64) -> bool {
    claims
        .exp
        .is_some_and(|exp| now < exp.saturating_add(CLOCK_SKEW_LEEWAY_SECS))
}

/// True iff `required_scope` is one of the whitespace-separated scope tokens.
pub fn validate_scope(claims: &AccessTokenClaims, required_scope: &str) -> bool {
    claims.scope.is_some() && claims.scopes().any(|scope| scope == required_scope)
}

/// Runs the four policy checks in order and reports the first one that fails.
pub fn check_claims(
    claims: &AccessTokenClaims,
    config: &ResourceServerConfig,
    now: u64,
) -> Result<(), ClaimCheck> {
    if !validate_audience(claims, &config.audience) {
        return Err(ClaimCheck::Audience);
    }
    if !validate_issuer(claims, &config.issuer_url) {
        return Err(ClaimCheck::Issuer);
    }
    if !validate_expiration(claims, now) {
        return Err(ClaimCheck::Expiration);
    }
    if !validate_scope(claims, &config.required_scope) {
        return Err(ClaimCheck::Scope);
    }
    Ok(())
}
