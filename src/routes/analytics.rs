use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};

use super::common::ApiResponse;
use crate::{
    error::{AppError, AppResult},
    middleware::TenantContext,
    models::{
        AnalyticsDashboard, AnalyticsQuery, AnalyticsReport, DocumentUsageReport,
        EngagementReport, QueryInsight, QueryTrends, ReportRequest, TrendsQuery,
    },
    services::AnalyticsService,
    AppState,
};

const DEFAULT_REPORT_TYPE: &str = "executive";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/queries/trends", get(get_query_trends))
        .route("/users/engagement", get(get_user_engagement))
        .route("/documents/usage", get(get_document_usage))
        .route("/insights/generate", get(generate_insights))
        .route("/reports/generate", post(generate_report))
}

async fn get_dashboard(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<ApiResponse<AnalyticsDashboard>>> {
    let service = AnalyticsService::new(state.db.clone());
    let dashboard = service.dashboard(tenant.enterprise_id, query.days).await?;

    Ok(ApiResponse::ok(dashboard))
}

async fn get_query_trends(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<TrendsQuery>,
) -> AppResult<Json<ApiResponse<QueryTrends>>> {
    let service = AnalyticsService::new(state.db.clone());
    let trends = service
        .trends(
            tenant.enterprise_id,
            query.days,
            query.granularity.unwrap_or_default(),
        )
        .await?;

    Ok(ApiResponse::ok(trends))
}

async fn get_user_engagement(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<ApiResponse<EngagementReport>>> {
    let service = AnalyticsService::new(state.db.clone());
    let report = service
        .user_engagement(tenant.enterprise_id, query.days, query.limit)
        .await?;

    Ok(ApiResponse::ok(report))
}

async fn get_document_usage(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<ApiResponse<DocumentUsageReport>>> {
    let service = AnalyticsService::new(state.db.clone());
    let usage = service.document_usage(tenant.enterprise_id, query.days).await?;

    Ok(ApiResponse::ok(usage))
}

async fn generate_insights(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<ApiResponse<Vec<QueryInsight>>>> {
    let service = AnalyticsService::new(state.db.clone());
    let insights = service.insights(tenant.enterprise_id, query.days).await?;

    Ok(ApiResponse::ok(insights))
}

async fn generate_report(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(payload): Json<ReportRequest>,
) -> AppResult<Json<ApiResponse<AnalyticsReport>>> {
    check_report_format(payload.format.as_deref())?;

    let service = AnalyticsService::new(state.db.clone());
    let report = service
        .report(
            tenant.enterprise_id,
            payload.report_type.as_deref().unwrap_or(DEFAULT_REPORT_TYPE),
            payload.period_days,
            payload.include_recommendations.unwrap_or(true),
        )
        .await?;

    Ok(ApiResponse::ok(report))
}

/// Reports are only rendered as JSON
fn check_report_format(format: Option<&str>) -> AppResult<()> {
    match format.map(|f| f.trim().to_lowercase()) {
        None => Ok(()),
        Some(f) if f == "json" => Ok(()),
        Some(other) => Err(AppError::Validation(format!(
            "Unsupported report format '{}'",
            other
        ))),
    }
}
