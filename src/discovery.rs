// src/discovery.rs

//! Protected Resource Metadata (RFC 9728).
//!
//! A client that receives a `401` follows the `resource_metadata` pointer in
//! the challenge to this document, which names the authorization server to
//! get a token from and the scope to ask for. It is served without
//! authentication and with permissive CORS headers.

use crate::config::ResourceServerConfig;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// The path the metadata document is served at.
pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

/// The metadata document describing this resource server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    /// The resource server's identifier URL (its token audience).
    pub resource: String,

    /// OAuth scopes supported by this resource server.
    #[serde(default)]
    pub scopes_supported: Vec<String>,

    /// Authorization server issuer URLs that can issue tokens for this resource.
    #[serde(default)]
    pub authorization_servers: Vec<String>,

    /// Methods supported for sending bearer tokens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bearer_methods_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    pub fn from_config(config: &ResourceServerConfig) -> Self {
        Self {
            resource: config.audience.clone(),
            scopes_supported: vec![config.required_scope.clone()],
            authorization_servers: vec![config.issuer_url.clone()],
            bearer_methods_supported: vec!["header".to_string()],
        }
    }
}

/// Answers a request for the metadata document.
///
/// `OPTIONS` gets an empty `200`; every other method gets the JSON document.
pub fn respond(method: &Method, metadata: &ProtectedResourceMetadata) -> Response {
    let mut response = if *method == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        Json(metadata).into_response()
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
