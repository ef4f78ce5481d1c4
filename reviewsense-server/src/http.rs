//! ReviewSense HTTP REST API
//!
//! Axum-based HTTP server exposing review analysis over HTTP.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! pure inner function. The inner functions are directly testable without
//! axum dispatch machinery.
//!
//! Endpoints:
//! - POST /api/analyze-review — analyze and persist one review
//! - GET  /api/reviews        — list stored reviews (filter/limit optional)
//! - GET  /api/health         — constant liveness payload

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use reviewsense_core::sentiment::SentimentLabel;
use reviewsense_core::{ReviewAnalyzer, ReviewsenseConfig};
use serde::Deserialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::store;

/// Minimum review length after trimming.
pub const MIN_REVIEW_CHARS: usize = 10;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub analyzer: ReviewAnalyzer,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/api/analyze-review", post(analyze_handler))
        .route("/api/reviews", get(list_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    pool: PgPool,
    config: ReviewsenseConfig,
    analyzer: ReviewAnalyzer,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { pool, analyzer });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("ReviewSense HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub review_text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub sentiment: Option<String>,
    pub limit: Option<String>,
}

// ============================================================================
// Pure helpers (directly unit-tested)
// ============================================================================

/// Validate the analyze-review body. Returns the trimmed review text, or the
/// client-facing error message. Validation failures are client errors and are
/// never logged server-side.
pub fn validate_review_text(raw: Option<&str>) -> Result<String, String> {
    let raw = match raw {
        Some(r) => r,
        None => return Err("review_text is required".to_string()),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("review_text cannot be empty".to_string());
    }
    if trimmed.chars().count() < MIN_REVIEW_CHARS {
        return Err(format!(
            "review_text must be at least {MIN_REVIEW_CHARS} characters"
        ));
    }

    Ok(trimmed.to_string())
}

/// Lenient sentiment filter: anything outside the three labels is ignored,
/// never an error.
pub fn parse_sentiment_filter(raw: Option<&str>) -> Option<SentimentLabel> {
    raw.and_then(SentimentLabel::parse)
}

/// Lenient limit: non-integer or non-positive values are ignored, never an
/// error.
pub fn parse_limit(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner analyze — validates, runs the orchestrator, persists, and returns
/// (status_code, json_body).
pub async fn analyze_inner(
    pool: &PgPool,
    analyzer: &ReviewAnalyzer,
    req: AnalyzeRequest,
) -> (StatusCode, serde_json::Value) {
    let review_text = match validate_review_text(req.review_text.as_deref()) {
        Ok(text) => text,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            );
        }
    };

    let preview: String = review_text.chars().take(50).collect();
    tracing::info!(preview = %preview, "Analyzing review");

    // Both adapter calls are total — degradations arrive as data, never errors.
    let analysis = analyzer.analyze(&review_text).await;

    match store::insert_review(pool, &review_text, &analysis).await {
        Ok(review) => (
            StatusCode::CREATED,
            serde_json::to_value(&review).unwrap_or_else(|_| serde_json::json!({})),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to persist review");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": format!("Internal server error: {e}") }),
            )
        }
    }
}

/// Inner list — applies the lenient filter/limit parsing and queries the store.
pub async fn list_inner(pool: &PgPool, params: ListParams) -> (StatusCode, serde_json::Value) {
    let sentiment = parse_sentiment_filter(params.sentiment.as_deref());
    let limit = parse_limit(params.limit.as_deref());

    match store::list_reviews(pool, sentiment, limit).await {
        Ok(reviews) => (
            StatusCode::OK,
            serde_json::to_value(&reviews).unwrap_or_else(|_| serde_json::json!([])),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list reviews");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": format!("Internal server error: {e}") }),
            )
        }
    }
}

/// Inner health — constant liveness payload (pure, no IO).
pub fn health_inner() -> serde_json::Value {
    serde_json::json!({ "status": "healthy" })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn analyze_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let (status, body) = analyze_inner(&state.pool, &state.analyzer, req).await;
    (status, Json(body))
}

pub async fn list_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let (status, body) = list_inner(&state.pool, params).await;
    (status, Json(body))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(health_inner()))
}

// ============================================================================
// Unit Tests — pure helpers and the constant health payload
// ============================================================================
