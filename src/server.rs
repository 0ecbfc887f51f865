//! HTTP query server.
//!
//! Exposes the persisted loans over a small JSON API and lets operators
//! trigger an ingestion pass.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/search?name=&state=&city=&limit=` | Borrower search |
//! | `GET`  | `/business/{tin}` | Single record by loan number |
//! | `POST` | `/load` | Run one ingestion pass |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Business not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `schema_invalid` (400), `not_found` (404),
//! `ingest_failed` (500), `internal` (500).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::error::IngestError;
use crate::get::{find_loan, LoanRecord};
use crate::ingest::ingest_with_pool;
use crate::migrate;
use crate::search::{search_loans, SearchQuery};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
}

/// Start the server on `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let bind_addr = config.server.bind.clone();
    let app = router(config, pool.clone());

    tracing::info!(bind = %bind_addr, "query server listening");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let served = axum::serve(listener, app).await;
    pool.close().await;
    served?;

    Ok(())
}

/// Build the router over an open pool.
pub fn router(config: &Config, pool: SqlitePool) -> Router {
    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", get(handle_search))
        .route("/business/{tin}", get(handle_business))
        .route("/load", post(handle_load))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::SchemaMismatch { .. } => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "schema_invalid",
                message: err.to_string(),
            },
            other => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "ingest_failed",
                message: format!("Failed to load data: {}", other),
            },
        }
    }
}

// ============ GET /search ============

async fn handle_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<LoanRecord>>, AppError> {
    if query.name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }
    let records = search_loans(&state.pool, &state.config, &query)
        .await
        .map_err(internal)?;
    Ok(Json(records))
}

// ============ GET /business/{tin} ============

async fn handle_business(
    State(state): State<AppState>,
    Path(tin): Path<String>,
) -> Result<Json<LoanRecord>, AppError> {
    find_loan(&state.pool, &tin)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| not_found("Business not found"))
}

// ============ POST /load ============

#[derive(Serialize)]
struct LoadResponse {
    message: String,
    rows: usize,
    batch_id: String,
}

async fn handle_load(State(state): State<AppState>) -> Result<Json<LoadResponse>, AppError> {
    let summary = ingest_with_pool(&state.config, &state.pool).await?;
    Ok(Json(LoadResponse {
        message: "Data loaded".to_string(),
        rows: summary.records_persisted,
        batch_id: summary.batch_id,
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
