use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use common::types::Health;
use service::errors::ServiceError;
use service::overrides::{validate_fragment, OverrideStore, StoredDocument, WriteReceipt};
use service::quotes::{self, QuoteProxy};

use crate::errors::ApiError;

#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<dyn OverrideStore>,
    pub quotes: QuoteProxy,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Debug, Deserialize)]
pub struct SyncWriteRequest {
    #[serde(default)]
    pub overrides: Option<Value>,
    #[serde(default)]
    pub sha: Option<String>,
}

/// GET /api/sync — current override document, never served from a cache.
async fn read_overrides(
    State(state): State<ServerState>,
) -> Result<impl IntoResponse, ApiError> {
    let doc: StoredDocument = state.store.read().await?;
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(doc)))
}

/// POST /api/sync — replace the document with the supplied fragment.
/// Body parse failures are folded into the error taxonomy so even a
/// malformed request gets the `{error, detail}` envelope.
async fn write_overrides(
    State(state): State<ServerState>,
    body: Result<Json<SyncWriteRequest>, JsonRejection>,
) -> Result<Json<WriteReceipt>, ApiError> {
    let Json(req) = body.map_err(|e| ServiceError::ClientInput(e.body_text()))?;
    let fragment = validate_fragment(req.overrides)?;
    let receipt = state.store.write(fragment, req.sha).await?;
    info!(ts = receipt.ts, "overrides written");
    Ok(Json(receipt))
}

/// Fixed rejection for any verb other than GET/POST on the sync endpoint.
async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "method_not_allowed", "detail": "method not allowed" })),
    )
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
}

/// GET /api/quotes — CORS-bypassing pass-through to the quote-history API.
/// Responses are shared-cacheable for an hour with stale-serving grace.
async fn get_chart(
    State(state): State<ServerState>,
    Query(q): Query<ChartQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ticker = quotes::validate_ticker(q.ticker.as_deref().unwrap_or_default())?;
    let data = state
        .quotes
        .fetch_chart(
            &ticker,
            q.range.as_deref().unwrap_or(quotes::DEFAULT_RANGE),
            q.interval.as_deref().unwrap_or(quotes::DEFAULT_INTERVAL),
        )
        .await?;
    Ok((
        [(header::CACHE_CONTROL, "s-maxage=3600, stale-while-revalidate=300")],
        Json(data),
    ))
}

/// Build the full application router.
pub fn build_router(cors: CorsLayer, state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/sync",
            get(read_overrides)
                .post(write_overrides)
                .fallback(method_not_allowed),
        )
        .route("/api/quotes", get(get_chart).fallback(method_not_allowed))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
