// src/middleware.rs

//! Bearer token authentication as a tower middleware.
//!
//! [`AuthLayer`] wraps any service that speaks `Request<Body>` and answers
//! with an axum `Response`. Every request, except those for the protected
//! resource metadata document, must carry a valid `Authorization: Bearer`
//! token. Rejections are uniform: `401`, a `WWW-Authenticate` challenge
//! pointing at the metadata document, and a plain `Unauthorized` body.

use crate::discovery::{self, ProtectedResourceMetadata, PROTECTED_RESOURCE_PATH};
use crate::validator::Validator;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, warn};

const BEARER_PREFIX: &str = "Bearer ";

/// Tower layer that puts bearer token validation in front of a service.
///
/// # Example
///
/// ```rust,no_run
/// use axum::{routing::post, Router};
/// use nila_oidc_rs::prelude::*;
/// use tower::Layer;
///
/// # async fn run() -> Result<(), NilaOidcError> {
/// let config = ConfigBuilder::from_env()?.build()?;
/// let validator = Validator::initialize(config).await?;
///
/// let router = Router::<()>::new().route("/mcp", post(|| async { "ok" }));
/// let app = AuthLayer::new(validator).layer(router);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthLayer {
    validator: Validator,
    metadata: Arc<ProtectedResourceMetadata>,
    challenge: HeaderValue,
}

impl AuthLayer {
    pub fn new(validator: Validator) -> Self {
        let config = validator.config();
        let metadata = Arc::new(ProtectedResourceMetadata::from_config(config));
        let challenge = challenge_header(&config.resource_metadata_url(), &config.challenge_scope);
        Self {
            validator,
            metadata,
            challenge,
        }
    }

    /// The metadata document served at [`PROTECTED_RESOURCE_PATH`].
    pub fn metadata(&self) -> &ProtectedResourceMetadata {
        &self.metadata
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            validator: self.validator.clone(),
            metadata: Arc::clone(&self.metadata),
            challenge: self.challenge.clone(),
        }
    }
}

/// The service produced by [`AuthLayer`].
///
/// For each request:
/// 1. Requests for the metadata document are answered directly, without auth.
/// 2. The bearer token is taken from the `Authorization` header.
/// 3. The token is validated; any failure ends in a `401`.
/// 4. The [`AuthenticatedIdentity`](crate::identity::AuthenticatedIdentity) is
///    inserted into the request extensions and the inner service is called.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    validator: Validator,
    metadata: Arc<ProtectedResourceMetadata>,
    challenge: HeaderValue,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        if req.uri().path() == PROTECTED_RESOURCE_PATH {
            let response = discovery::respond(req.method(), &self.metadata);
            return Box::pin(async move { Ok(response) });
        }

        // The clone that was driven to readiness is the one we call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let validator = self.validator.clone();
        let challenge = self.challenge.clone();

        Box::pin(async move {
            let Some(token) = extract_bearer_token(req.headers()) else {
                warn!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    "Rejecting request: missing or non-Bearer Authorization header"
                );
                return Ok(unauthorized(challenge));
            };

            let outcome = validator.validate(token).await;
            match outcome {
                Ok(identity) => {
                    debug!(identity = %identity.identity(), "Request authenticated");
                    req.extensions_mut().insert(identity);
                    inner.call(req).await
                }
                Err(e) => {
                    warn!(
                        method = %req.method(),
                        path = %req.uri().path(),
                        reason = %e,
                        "Rejecting request: token validation failed"
                    );
                    Ok(unauthorized(challenge))
                }
            }
        })
    }
}

/// Returns the token from an `Authorization: Bearer <token>` header, if any.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn challenge_header(resource_metadata_url: &str, scope: &str) -> HeaderValue {
    let value = format!(r#"Bearer resource_metadata="{resource_metadata_url}", scope="{scope}""#);
    HeaderValue::from_str(&value).unwrap_or_else(|_| {
        warn!("Challenge contains characters not allowed in a header; sending a bare challenge");
        HeaderValue::from_static("Bearer")
    })
}

fn unauthorized(challenge: HeaderValue) -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, challenge);
    response
}
