use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use super::common::ApiResponse;
use crate::{models::ConnectorType, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

pub fn system_routes() -> Router<AppState> {
    Router::new().route("/system/info", get(system_info))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = sqlx::query("SELECT 1")
        .fetch_one(&state.db)
        .await
        .map(|_| "healthy")
        .unwrap_or("unhealthy");

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_status
    }))
}

async fn system_info(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let config = &state.config;
    let connectors: Vec<&str> = ConnectorType::ALL.iter().map(|c| c.as_str()).collect();

    ApiResponse::ok(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": config.environment,
        "llm": {
            "model": config.llm_model,
            "configured": config.anthropic_key().is_some()
        },
        "embeddings": {
            "model": config.embedding_model,
            "configured": config.openai_key().is_some()
        },
        "limits": {
            "max_file_size": config.max_file_size,
            "chunk_size": config.chunk_size,
            "chunk_overlap": config.chunk_overlap,
            "max_retrieved_chunks": config.max_retrieved_chunks,
            "rate_limit_per_minute": config.rate_limit_per_minute
        },
        "supported_file_types": crate::models::ALLOWED_EXTENSIONS,
        "connectors": connectors
    }))
}
