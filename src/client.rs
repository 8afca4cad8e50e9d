// src/client.rs

use crate::config::ResourceServerConfig;
use crate::error::NilaOidcError;
use crate::model::{JsonWebKey, JsonWebKeySet, OidcDiscoveryDocument};
use arc_swap::ArcSwap;
use jsonwebtoken::{Algorithm, DecodingKey};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// The asymmetric key family a verification key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec,
}

impl KeyFamily {
    /// Whether a key of this family can verify signatures made with `alg`.
    pub fn supports(&self, alg: Algorithm) -> bool {
        match self {
            KeyFamily::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            KeyFamily::Ec => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
        }
    }
}

/// A public key fetched from the authorization server, ready to verify signatures.
///
/// Never mutated after construction; a refresh builds new keys instead.
#[derive(Clone)]
pub struct VerificationKey {
    pub kid: String,
    pub family: KeyFamily,
    /// The algorithm pinned by the JWK's `alg` member, if any.
    pub algorithm: Option<Algorithm>,
    pub key: DecodingKey,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TryFrom<&JsonWebKey> for VerificationKey {
    type Error = NilaOidcError;

    fn try_from(jwk: &JsonWebKey) -> Result<Self, Self::Error> {
        let kid = jwk
            .kid
            .clone()
            .ok_or_else(|| NilaOidcError::InvalidKeyFormat("key has no 'kid'".to_string()))?;
        let algorithm = jwk.alg.as_deref().and_then(|a| Algorithm::from_str(a).ok());

        let (family, key) = match jwk.kty.as_str() {
            "RSA" => {
                let n = jwk.n.as_deref().ok_or_else(|| {
                    NilaOidcError::InvalidKeyFormat(format!("RSA key '{kid}' missing 'n' component"))
                })?;
                let e = jwk.e.as_deref().ok_or_else(|| {
                    NilaOidcError::InvalidKeyFormat(format!("RSA key '{kid}' missing 'e' component"))
                })?;
                let key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| NilaOidcError::InvalidKeyFormat(format!("RSA key '{kid}': {e}")))?;
                (KeyFamily::Rsa, key)
            }
            "EC" => {
                match jwk.crv.as_deref() {
                    Some("P-256") | Some("P-384") => {}
                    other => {
                        return Err(NilaOidcError::InvalidKeyFormat(format!(
                            "EC key '{kid}' has unsupported curve {other:?}"
                        )))
                    }
                }
                let (Some(x), Some(y)) = (jwk.x.as_deref(), jwk.y.as_deref()) else {
                    return Err(NilaOidcError::InvalidKeyFormat(format!(
                        "EC key '{kid}' missing 'x' or 'y' coordinate"
                    )));
                };
                let key = DecodingKey::from_ec_components(x, y)
                    .map_err(|e| NilaOidcError::InvalidKeyFormat(format!("EC key '{kid}': {e}")))?;
                (KeyFamily::Ec, key)
            }
            other => {
                return Err(NilaOidcError::InvalidKeyFormat(format!(
                    "key '{kid}' has unsupported type '{other}'"
                )))
            }
        };

        Ok(Self { kid, family, algorithm, key })
    }
}

/// An immutable snapshot of the authorization server's signing keys, by `kid`.
#[derive(Debug, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<VerificationKey>>,
}

impl KeySet {
    /// Builds a key set from a fetched JWKS document.
    ///
    /// Encryption keys, keys without a `kid` and keys that cannot be decoded are
    /// skipped. When two keys share a `kid`, the later one wins.
    pub fn from_jwks(jwks: JsonWebKeySet) -> Self {
        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            if jwk.use_purpose.as_deref() == Some("enc") {
                debug!("Skipping encryption key {:?}", jwk.kid);
                continue;
            }
            match VerificationKey::try_from(jwk) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), Arc::new(key));
                }
                Err(e) => warn!("Skipping unusable JWK: {}", e),
            }
        }
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<Arc<VerificationKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

/// Resolves key identifiers to verification keys published by the authorization server.
///
/// The discovery document is fetched once, at initialization. The key set is
/// fetched at initialization and again whenever a `kid` is not in the cache.
/// Readers always see a complete snapshot: a refresh builds a new `KeySet` and
/// swaps it in whole.
#[derive(Clone)]
pub struct JwksClient {
    // The client is internally ref-counted to allow for cheap cloning.
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    discovery: OidcDiscoveryDocument,
    jwks_uri: Url,
    keys: ArcSwap<KeySet>,
    // Serialises refreshes so concurrent misses do not stampede the JWKS endpoint.
    refresh_lock: Mutex<()>,
}

impl JwksClient {
    /// Fetches the discovery document and the key set, and builds the client.
    ///
    /// # Errors
    ///
    /// Fails with `MissingConfiguration` when no issuer is configured,
    /// `DiscoveryFetch` when the discovery document cannot be fetched or parsed,
    /// and `KeySetFetch` when the key set cannot be fetched or parsed. All of
    /// these are fatal: the resource server cannot verify anything without keys.
    #[instrument(skip(config), fields(discovery_url = %config.discovery_url), err)]
    pub async fn initialize(config: &ResourceServerConfig) -> Result<Self, NilaOidcError> {
        if config.issuer_url.is_empty() {
            return Err(NilaOidcError::MissingConfiguration("issuer_url".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| NilaOidcError::InvalidConfiguration(e.to_string()))?;

        let discovery = fetch_discovery_document(&http_client, &config.discovery_url).await?;

        let jwks_uri = match &config.jwks_uri {
            Some(uri) => {
                debug!("Using JWKS URI from config override: {}", uri);
                uri.clone()
            }
            None => Url::parse(&discovery.jwks_uri).map_err(|e| {
                NilaOidcError::InvalidDiscoveryDocument {
                    url: config.discovery_url.to_string(),
                    reason: format!("jwks_uri {:?}: {e}", discovery.jwks_uri),
                }
            })?,
        };
        debug!("Discovered JWKS URI: {}", jwks_uri);

        let key_set = fetch_key_set(&http_client, &jwks_uri).await?;
        info!("Loaded {} signing keys from {}", key_set.len(), jwks_uri);

        Ok(Self {
            inner: Arc::new(Inner {
                http_client,
                discovery,
                jwks_uri,
                keys: ArcSwap::from_pointee(key_set),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    /// Retrieves the verification key for the given Key ID (`kid`).
    ///
    /// It first checks the in-memory snapshot. On a miss it refetches the key
    /// set once, swaps it in, and looks again. A failed refetch is reported as
    /// `UnknownKey`; the previous snapshot stays in place.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<VerificationKey>, NilaOidcError> {
        if let Some(key) = self.inner.keys.load().get(kid) {
            debug!("JWK cache hit for kid: {}", kid);
            return Ok(key);
        }

        debug!("JWK cache miss for kid: {}. Refreshing key set.", kid);
        let _guard = self.inner.refresh_lock.lock().await;

        // Someone else may have refreshed while we waited for the lock.
        if let Some(key) = self.inner.keys.load().get(kid) {
            debug!("kid {} arrived with a concurrent refresh", kid);
            return Ok(key);
        }

        let refreshed = match self.swap_in_fresh_keys().await {
            Ok(key_set) => key_set,
            Err(e) => {
                warn!("JWKS refresh failed while resolving kid {}: {}", kid, e);
                return Err(NilaOidcError::UnknownKey(kid.to_string()));
            }
        };

        refreshed
            .get(kid)
            .ok_or_else(|| NilaOidcError::UnknownKey(kid.to_string()))
    }

    /// Refetches the key set and replaces the cached snapshot.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, NilaOidcError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.swap_in_fresh_keys().await
    }

    async fn swap_in_fresh_keys(&self) -> Result<Arc<KeySet>, NilaOidcError> {
        let key_set = Arc::new(fetch_key_set(&self.inner.http_client, &self.inner.jwks_uri).await?);
        self.inner.keys.store(Arc::clone(&key_set));
        Ok(key_set)
    }

    /// The key set snapshot currently in use.
    pub fn keys(&self) -> Arc<KeySet> {
        self.inner.keys.load_full()
    }

    pub fn jwks_uri(&self) -> &Url {
        &self.inner.jwks_uri
    }

    pub fn discovery_document(&self) -> &OidcDiscoveryDocument {
        &self.inner.discovery
    }
}

async fn fetch_discovery_document(
    http_client: &reqwest::Client,
    url: &Url,
) -> Result<OidcDiscoveryDocument, NilaOidcError> {
    debug!("Performing OIDC discovery at: {}", url);
    let to_error = |source| NilaOidcError::DiscoveryFetch {
        url: url.to_string(),
        source,
    };
    http_client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(to_error)?
        .json()
        .await
        .map_err(to_error)
}

#[instrument(skip(http_client), fields(jwks_uri = %url), err)]
async fn fetch_key_set(http_client: &reqwest::Client, url: &Url) -> Result<KeySet, NilaOidcError> {
    let to_error = |source| NilaOidcError::KeySetFetch {
        url: url.to_string(),
        source,
    };
    let jwks: JsonWebKeySet = http_client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(to_error)?
        .json()
        .await
        .map_err(to_error)?;

    debug!("Successfully fetched {} keys", jwks.keys.len());
    Ok(KeySet::from_jwks(jwks))
}
