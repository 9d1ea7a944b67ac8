use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use super::common::ApiResponse;
use crate::{
    error::AppResult,
    middleware::{RequestMeta, TenantContext},
    models::{
        CreateDepartmentRequest, Department, Enterprise, EnterpriseQueryRecord,
        EnterpriseQueryRequest, EnterpriseQueryResponse, EnterpriseSettingsRequest, ExportRequest,
        HistoryQuery, QueryExport, QueryFeedbackRequest, QueryHistoryItem, QueryStats,
        SimilarQuery,
    },
    services::{AnalysisService, EnterpriseService, QueryService},
    utils::validate_request,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(process_query))
        .route("/queries/history", get(query_history))
        .route("/query/{id}", get(get_query))
        .route("/query/{id}/feedback", post(submit_feedback))
        .route("/stats", get(query_stats))
        .route("/similar-queries/{id}", get(similar_queries))
        .route("/export/{id}", post(export_query))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/departments", get(list_departments).post(create_department))
}

async fn process_query(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<EnterpriseQueryRequest>,
) -> AppResult<Json<ApiResponse<EnterpriseQueryResponse>>> {
    validate_request(&payload)?;

    let service = AnalysisService::new(state.db.clone(), state.config.clone());
    let response = service.process_enterprise_query(&tenant, &payload).await?;

    Ok(ApiResponse::ok(response))
}

async fn query_history(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<QueryHistoryItem>>>> {
    let service = QueryService::new(state.db.clone());
    let history = service.history(tenant.enterprise_id, &query).await?;

    Ok(ApiResponse::ok(history))
}

async fn get_query(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<EnterpriseQueryRecord>>> {
    let service = QueryService::new(state.db.clone());
    let record = service.get(tenant.enterprise_id, id).await?;

    Ok(ApiResponse::ok(record))
}

async fn submit_feedback(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<i32>,
    Json(payload): Json<QueryFeedbackRequest>,
) -> AppResult<Json<ApiResponse<EnterpriseQueryRecord>>> {
    validate_request(&payload)?;

    let service = QueryService::new(state.db.clone());
    let record = service.feedback(tenant.enterprise_id, id, &payload).await?;

    Ok(ApiResponse::ok(record))
}

#[derive(Debug, serde::Deserialize)]
struct StatsQuery {
    days: Option<i64>,
}

async fn query_stats(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<ApiResponse<QueryStats>>> {
    let service = QueryService::new(state.db.clone());
    let stats = service.stats(tenant.enterprise_id, query.days).await?;

    Ok(ApiResponse::ok(stats))
}

#[derive(Debug, serde::Deserialize)]
struct SimilarParams {
    limit: Option<i64>,
}

async fn similar_queries(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<i32>,
    Query(params): Query<SimilarParams>,
) -> AppResult<Json<ApiResponse<Vec<SimilarQuery>>>> {
    let service = QueryService::new(state.db.clone());
    let similar = service.similar(tenant.enterprise_id, id, params.limit).await?;

    Ok(ApiResponse::ok(similar))
}

async fn export_query(
    State(state): State<AppState>,
    tenant: TenantContext,
    meta: RequestMeta,
    Path(id): Path<i32>,
    Query(params): Query<ExportRequest>,
) -> AppResult<Json<ApiResponse<QueryExport>>> {
    let service = QueryService::new(state.db.clone());
    let export = service
        .export(&tenant, &meta, id, params.format.as_deref())
        .await?;

    Ok(ApiResponse::ok(export))
}

async fn get_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> AppResult<Json<ApiResponse<Enterprise>>> {
    let service = EnterpriseService::new(state.db.clone());
    let enterprise = service.get(tenant.enterprise_id).await?;

    Ok(ApiResponse::ok(enterprise))
}

async fn update_settings(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<EnterpriseSettingsRequest>,
) -> AppResult<Json<ApiResponse<Enterprise>>> {
    tenant.require_manager()?;
    validate_request(&payload)?;

    let service = EnterpriseService::new(state.db.clone());
    let enterprise = service.upsert(tenant.enterprise_id, &payload).await?;

    Ok(ApiResponse::ok(enterprise))
}

async fn list_departments(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> AppResult<Json<ApiResponse<Vec<Department>>>> {
    let service = EnterpriseService::new(state.db.clone());
    let departments = service.list_departments(tenant.enterprise_id).await?;

    Ok(ApiResponse::ok(departments))
}

async fn create_department(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<CreateDepartmentRequest>,
) -> AppResult<Json<ApiResponse<Department>>> {
    tenant.require_manager()?;
    validate_request(&payload)?;

    let service = EnterpriseService::new(state.db.clone());
    let department = service.create_department(tenant.enterprise_id, &payload).await?;

    Ok(ApiResponse::ok(department))
}
