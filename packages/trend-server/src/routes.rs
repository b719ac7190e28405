use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use dataforseo_client::CallbackPayload;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use trend_engine::{seed_run, CachedClassifier, CallbackProcessor, PostgresStorage, TriggerSource};

use crate::classifier::ServerClassifier;
use crate::provider::DataForSeoProvider;

pub type Processor =
    CallbackProcessor<PostgresStorage, DataForSeoProvider, CachedClassifier<ServerClassifier>>;

pub struct AppState {
    pub processor: Processor,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/runs", post(create_run))
        .route("/api/callbacks/dataforseo", post(dataforseo_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub trigger: Option<TriggerSource>,
}

#[derive(Debug, Serialize)]
pub struct CreateRunResponse {
    pub run_id: uuid::Uuid,
    pub tasks_posted: usize,
    pub post_errors: usize,
}

async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRunRequest>,
) -> Result<Json<CreateRunResponse>, (StatusCode, String)> {
    if request.keywords.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "keywords must not be empty".into()));
    }

    let processor = &state.processor;
    let (run, outcome) = seed_run(
        &request.keywords,
        request.trigger.unwrap_or(TriggerSource::Manual),
        processor.provider(),
        processor.storage(),
        processor.discovery(),
        processor.postback_url(),
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to seed run");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(CreateRunResponse {
        run_id: run.id.0,
        tasks_posted: outcome.posted.len(),
        post_errors: outcome.errors.len(),
    }))
}

/// Postback receiver. Always answers 200 so the provider does not retry
/// deliveries we have already absorbed; failures show up in run metadata
/// and logs instead.
async fn dataforseo_callback(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CallbackPayload>,
) -> Json<serde_json::Value> {
    let outcome = state.processor.process(&payload).await;
    Json(json!({
        "processed": outcome.processed,
        "errors": outcome.errors,
        "runs_updated": outcome.runs_updated,
    }))
}
