//! A small resource server: an echo capability behind bearer token auth.
//!
//! ```text
//! ISSUER_URL=https://auth.example.com \
//! MCP_SERVER_URL=http://localhost:8000 \
//! SCOPE=mcp:tools \
//! cargo run --example echo_server
//! ```

use axum::extract::Request;
use axum::routing::post;
use axum::{Json, Router};
use nila_oidc_rs::prelude::*;
use serde::{Deserialize, Serialize};
use tower::Layer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct EchoInput {
    message: String,
}

#[derive(Debug, Serialize)]
struct EchoOutput {
    response: String,
}

async fn echo(identity: AuthenticatedIdentity, Json(input): Json<EchoInput>) -> Json<EchoOutput> {
    Json(EchoOutput {
        response: format!("{} from {}", input.message, identity.identity()),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ConfigBuilder::from_env()?.build()?;
    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());

    // No keys, no service: discovery and the first JWKS fetch must succeed.
    let validator = Validator::initialize(config).await?;

    let router = Router::new()
        .route("/mcp", post(echo))
        .layer(TraceLayer::new_for_http());
    let app = AuthLayer::new(validator).layer(router);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("Resource server listening on {}", listener.local_addr()?);

    axum::serve(listener, axum::ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
