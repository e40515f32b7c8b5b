//! HTTP JSON API for counter terminals.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/lookup` | Resolve `{ "query": ... }` to one product with pricing and competitor links |
//! | `POST` | `/search` | Natural-language search, `{ "query": ..., "limit": 20 }` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "catalog_unavailable", "message": "failed to read catalog file ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `catalog_unavailable` (503), `internal` (500).
//! Only a failed catalog load is `catalog_unavailable`; an unreadable
//! memory table is `internal`.
//!
//! A lookup that finds nothing is not an error: it returns `200` with
//! `result.found = false` and provenance `NOT_FOUND`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::desk::{Desk, LookupReport, SearchReport};
use crate::error::{CatalogError, DeskError};

const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Shared state for all handlers.
#[derive(Clone)]
struct AppState {
    desk: Arc<Desk>,
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let desk = Arc::new(Desk::from_config(config)?);
    let bind_addr = config.server.bind.clone();

    let app = build_router(desk);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "price desk listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// The full router, with permissive CORS for browser terminals.
pub fn build_router(desk: Arc<Desk>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/lookup", post(handle_lookup))
        .route("/search", post(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { desk })
}

// ============ Error response ============

/// JSON error envelope returned on every non-2xx response.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable code, stable across releases.
    code: String,
    /// Human-readable detail, safe to show at the counter.
    message: String,
}

/// An error a handler returns; rendered as [`ErrorBody`] with `status`.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// 400 for a request the desk cannot act on.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "catalog_unavailable",
            message: err.to_string(),
        }
    }
}

impl From<DeskError> for AppError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::Catalog(catalog) => catalog.into(),
            DeskError::Memory(memory) => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: memory.to_string(),
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    status: String,
    /// Crate version from `Cargo.toml`.
    version: String,
}

/// Liveness only. Does not touch the catalog source.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /lookup ============

#[derive(Deserialize)]
struct LookupRequest {
    query: String,
}

/// Resolve one query. A miss is `200` with `found: false`.
async fn handle_lookup(
    State(state): State<AppState>,
    Json(req): Json<LookupRequest>,
) -> Result<Json<LookupReport>, AppError> {
    let report = state.desk.lookup(&req.query).await?;
    Ok(Json(report))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Filter search; `limit` defaults to 20.
async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchReport>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let limit = req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let report = state.desk.search(&req.query, limit).await?;
    Ok(Json(report))
}
