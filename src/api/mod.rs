//! Development remote service
//!
//! Serves the GET/PUT key/value contract models talk to, backed by a
//! [`ResourceStore`]. Every path except `/health` addresses one JSON document.
//! Default port: 8124

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::remote::ResourceStore;

/// Default API port
pub const DEFAULT_PORT: u16 = 8124;

/// API error response
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

/// Build the API router
pub fn build_router(store: ResourceStore) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/*endpoint", get(read_document).put(write_document))
        .with_state(store)
}

/// GET /<endpoint>[?param=true] - One parameter or the whole document
async fn read_document(
    Path(endpoint): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    State(store): State<ResourceStore>,
) -> Json<Value> {
    let param = query.keys().next().map(String::as_str);
    debug!(endpoint = %endpoint, param = ?param, "GET");
    Json(store.get(&endpoint, param))
}

/// PUT /<endpoint> - Merge a JSON object into the document, return the result
async fn write_document(
    Path(endpoint): Path<String>,
    State(store): State<ResourceStore>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let Value::Object(body) = body else {
        return Err(ApiError {
            error: format!("Expected a JSON object body, got {}", body),
        });
    };

    info!(endpoint = %endpoint, keys = ?body.keys().collect::<Vec<_>>(), "PUT");
    Ok(Json(store.put(&endpoint, &body)))
}

/// GET /health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Start the API server; returns on Ctrl+C
pub async fn serve(store: ResourceStore, port: u16) -> Result<()> {
    let router = build_router(store);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!("Starting development remote service on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down development remote service");
        })
        .await
        .context("API server error")?;

    Ok(())
}
