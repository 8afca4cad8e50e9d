// src/model.rs

use serde::Deserialize;

/// Represents the parts of an OIDC provider's discovery document this crate uses.
/// Found at the `.well-known/openid-configuration` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcDiscoveryDocument {
    #[serde(default)]
    pub issuer: Option<String>,
    pub jwks_uri: String,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
///
/// Every field is optional here so that one odd key cannot fail the whole set;
/// `KeySet::from_jwks` decides which keys are usable.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKey {
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use")]
    pub use_purpose: Option<String>,
    pub alg: Option<String>,
    // RSA
    pub n: Option<String>,
    pub e: Option<String>,
    // EC
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_document_only_needs_jwks_uri() {
        let doc: OidcDiscoveryDocument =
            serde_json::from_str(r#"{"jwks_uri": "https://auth.example.com/jwks"}"#).unwrap();
        assert_eq!(doc.jwks_uri, "https://auth.example.com/jwks");
        assert!(doc.issuer.is_none());
        assert!(doc.scopes_supported.is_empty());

        let missing: Result<OidcDiscoveryDocument, _> =
            serde_json::from_str(r#"{"issuer": "https://auth.example.com"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn key_set_tolerates_mixed_key_types() {
        let jwks: JsonWebKeySet = serde_json::from_value(serde_json::json!({
            "keys": [
                {"kty": "RSA", "kid": "r1", "n": "AQAB", "e": "AQAB", "use": "sig", "alg": "RS256"},
                {"kty": "EC", "kid": "e1", "crv": "P-256", "x": "AA", "y": "AA"},
                {"kty": "oct", "k": "c2VjcmV0"}
            ]
        }))
        .unwrap();
        assert_eq!(jwks.keys.len(), 3);
        assert_eq!(jwks.keys[0].use_purpose.as_deref(), Some("sig"));
        assert_eq!(jwks.keys[1].crv.as_deref(), Some("P-256"));
        assert!(jwks.keys[2].kid.is_none());
    }
}
