use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::common::{ApiResponse, MessageBody};
use crate::{
    error::AppResult,
    middleware::TenantContext,
    models::{
        DocumentContent, DocumentContentQuery, DocumentStats, DocumentUploadResponse,
        EnterpriseDocument, ListDocumentsQuery, NewDocument, UploadDocumentQuery,
    },
    services::DocumentService,
    utils::validate_request,
    AppState,
};

pub fn routes(max_file_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_documents)
                .post(upload_document)
                .layer(DefaultBodyLimit::max(max_file_size)),
        )
        .route("/categories/list", get(list_categories))
        .route("/stats/overview", get(document_stats))
        .route("/{id}", get(get_document).delete(delete_document))
        .route("/{id}/reprocess", post(reprocess_document))
        .route("/{id}/content", get(document_content))
}

/// Content type sent by the client, ignoring the generic binary default
fn declared_content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty() && v != "application/octet-stream")
}

async fn upload_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<UploadDocumentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<DocumentUploadResponse>>> {
    validate_request(&query)?;

    let mut upload = NewDocument::from(query);
    upload.content_type = declared_content_type(&headers);
    if upload.department_id.is_none() {
        upload.department_id = tenant.department_id;
    }

    let service = DocumentService::new(state.db.clone(), state.config.clone());
    let response = service
        .upload(tenant.enterprise_id, tenant.user_id, upload, &body)
        .await?;

    Ok(ApiResponse::ok(response))
}

async fn list_documents(
    State(state): State<AppState>,
    tenant: TenantContext,
    Query(query): Query<ListDocumentsQuery>,
) -> AppResult<Json<ApiResponse<Vec<EnterpriseDocument>>>> {
    let service = DocumentService::new(state.db.clone(), state.config.clone());
    let documents = service.list(tenant.enterprise_id, &query).await?;

    Ok(ApiResponse::ok(documents))
}

async fn get_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<EnterpriseDocument>>> {
    let service = DocumentService::new(state.db.clone(), state.config.clone());
    let document = service.get(tenant.enterprise_id, id).await?;

    Ok(ApiResponse::ok(document))
}

async fn delete_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MessageBody>>> {
    let service = DocumentService::new(state.db.clone(), state.config.clone());
    service.delete(tenant.enterprise_id, id).await?;

    Ok(ApiResponse::ok(MessageBody::new("Document deleted")))
}

async fn reprocess_document(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<EnterpriseDocument>>> {
    let service = DocumentService::new(state.db.clone(), state.config.clone());
    let document = service.reprocess(tenant.enterprise_id, id).await?;

    Ok(ApiResponse::ok(document))
}

async fn document_content(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(id): Path<Uuid>,
    Query(query): Query<DocumentContentQuery>,
) -> AppResult<Json<ApiResponse<DocumentContent>>> {
    let service = DocumentService::new(state.db.clone(), state.config.clone());
    let content = service
        .content(tenant.enterprise_id, id, query.chunk_limit)
        .await?;

    Ok(ApiResponse::ok(content))
}

async fn list_categories(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let service = DocumentService::new(state.db.clone(), state.config.clone());
    let categories = service.categories(tenant.enterprise_id).await?;

    Ok(ApiResponse::ok(categories))
}

async fn document_stats(
    State(state): State<AppState>,
    tenant: TenantContext,
) -> AppResult<Json<ApiResponse<DocumentStats>>> {
    let service = DocumentService::new(state.db.clone(), state.config.clone());
    let stats = service.stats(tenant.enterprise_id).await?;

    Ok(ApiResponse::ok(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_declared_content_type_strips_parameters() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/csv; charset=utf-8"),
        );
        assert_eq!(declared_content_type(&headers).as_deref(), Some("text/csv"));
    }

    #[test]
    fn test_declared_content_type_ignores_octet_stream() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        assert!(declared_content_type(&headers).is_none());
        assert!(declared_content_type(&HeaderMap::new()).is_none());
    }
}
