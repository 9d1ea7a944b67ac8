use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};

use super::common::{ApiResponse, MessageBody};
use crate::{
    error::AppResult,
    middleware::TenantContext,
    models::{ConnectorEntry, ConnectorInfo, ConnectorSetupRequest, SyncResult},
    services::ConnectorService,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/available", get(available_connectors))
        .route("/setup/{connector_type}", post(setup_connector))
        .route("/configured", get(configured_connectors))
        .route("/sync/{connector_type}", post(sync_connector))
        .route("/{connector_type}", delete(remove_connector))
}

async fn available_connectors(_tenant: TenantContext) -> Json<ApiResponse<Vec<ConnectorInfo>>> {
    ApiResponse::ok(ConnectorService::available())
}

async fn setup_connector(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(connector_type): Path<String>,
    Json(payload): Json<ConnectorSetupRequest>,
) -> AppResult<Json<ApiResponse<ConnectorEntry>>> {
    let service = ConnectorService::new(state.db.clone(), state.config.clone());
    let entry = service.setup(&tenant, &connector_type, payload).await?;

    Ok(ApiResponse::ok(entry))
}

async fn configured_connectors(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> AppResult<Json<ApiResponse<Vec<ConnectorEntry>>>> {
    let service = ConnectorService::new(state.db.clone(), state.config.clone());
    let entries = service.configured(tenant.enterprise_id).await?;

    Ok(ApiResponse::ok(entries))
}

async fn sync_connector(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(connector_type): Path<String>,
) -> AppResult<Json<ApiResponse<SyncResult>>> {
    let service = ConnectorService::new(state.db.clone(), state.config.clone());
    let result = service.sync(&tenant, &connector_type).await?;

    Ok(ApiResponse::ok(result))
}

async fn remove_connector(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(connector_type): Path<String>,
) -> AppResult<Json<ApiResponse<MessageBody>>> {
    let service = ConnectorService::new(state.db.clone(), state.config.clone());
    service.remove(&tenant, &connector_type).await?;

    Ok(ApiResponse::ok(MessageBody::new(format!(
        "Connector '{}' removed",
        connector_type
    ))))
}
