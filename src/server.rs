//! HTTP boundary: a thin JSON API over [`SearchService`].
//!
//! `POST /api/search {"query": "..."}` → `{"movies": [...]}` and
//! `GET /api/health`. The service is shared read-only behind an `Arc`;
//! each request hops to a blocking thread because the pipeline does
//! synchronous network and ONNX work.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::model::ApiMovie;
use crate::search::service::SearchService;

#[derive(Clone)]
struct AppState {
    service: Arc<SearchService>,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    movies: Vec<ApiMovie>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(error) => (StatusCode::BAD_REQUEST, error),
            ApiError::Internal(error) => (StatusCode::INTERNAL_SERVER_ERROR, error),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

pub fn router(service: Arc<SearchService>, top_k: usize) -> Router {
    Router::new()
        .route("/api/search", post(search))
        .route("/api/health", get(health))
        .with_state(AppState { service, top_k })
}

pub async fn serve(service: Arc<SearchService>, top_k: usize, addr: SocketAddr) -> Result<()> {
    let app = router(service, top_k);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "search API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("serve search API")?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy"}))
}

async fn search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = payload.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query is required".to_string()));
    }

    let service = state.service.clone();
    let top_k = state.top_k;
    let outcome = tokio::task::spawn_blocking(move || service.search(&query, top_k))
        .await
        .map_err(|e| ApiError::Internal(format!("search task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;

    Ok(Json(SearchResponse {
        movies: outcome.movies,
    }))
}
