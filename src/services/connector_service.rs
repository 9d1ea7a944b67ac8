use std::time::Duration;

use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Map, Value};
use sqlx::PgPool;
use url::Url;

use super::document_service::DocumentService;
use crate::{
    config::Config,
    error::{AppError, AppResult},
    middleware::TenantContext,
    models::{
        file_extension, ConnectorEntry, ConnectorInfo, ConnectorSetupRequest, ConnectorType,
        NewDocument, SyncResult, ALLOWED_EXTENSIONS,
    },
    utils::sanitize_filename,
};

/// Substrings marking a configuration key as a credential that is never stored
const CREDENTIAL_MARKERS: &[&str] = &["secret", "password", "token", "key"];

const DEFAULT_SYNC_SCHEDULE: &str = "daily";

/// Configuration of external data sources kept on the enterprise row
pub struct ConnectorService {
    db: PgPool,
    config: Config,
}

impl ConnectorService {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self { db, config }
    }

    pub fn available() -> Vec<ConnectorInfo> {
        ConnectorType::ALL.into_iter().map(ConnectorInfo::from).collect()
    }

    pub async fn setup(
        &self,
        tenant: &TenantContext,
        connector: &str,
        req: ConnectorSetupRequest,
    ) -> AppResult<ConnectorEntry> {
        tenant.require_manager()?;
        let connector_type: ConnectorType = connector.parse().map_err(AppError::Validation)?;
        validate_configuration(connector_type, &req.configuration).map_err(AppError::Validation)?;

        let entry = ConnectorEntry {
            connector_type,
            status: "configured".to_string(),
            configured_at: Utc::now(),
            configured_by: tenant.user_id,
            sync_schedule: req
                .sync_schedule
                .unwrap_or_else(|| DEFAULT_SYNC_SCHEDULE.to_string()),
            is_active: req.is_active.unwrap_or(true),
            configuration: strip_credentials(req.configuration),
            last_sync: None,
            last_sync_status: None,
            documents_synced: None,
        };

        self.save_entry(tenant.enterprise_id, &entry).await?;
        tracing::info!(
            enterprise_id = tenant.enterprise_id,
            connector = connector_type.as_str(),
            "Connector configured"
        );

        Ok(entry)
    }

    pub async fn configured(&self, enterprise_id: i32) -> AppResult<Vec<ConnectorEntry>> {
        Ok(parse_entries(&self.connected_systems(enterprise_id).await?))
    }

    /// Pull data for a configured connector
    pub async fn sync(&self, tenant: &TenantContext, connector: &str) -> AppResult<SyncResult> {
        let connector_type: ConnectorType = connector.parse().map_err(AppError::Validation)?;
        let mut entry = self.find_entry(tenant.enterprise_id, connector_type).await?;

        let (status, documents_synced, message) = if connector_type.supports_sync() {
            self.sync_api_endpoint(tenant, &entry).await?
        } else {
            (
                "unsupported".to_string(),
                0,
                format!("Sync is not available for {}", connector_type.display_name()),
            )
        };

        let synced_at = Utc::now();
        entry.last_sync = Some(synced_at);
        entry.last_sync_status = Some(status.clone());
        entry.documents_synced = Some(entry.documents_synced.unwrap_or(0) + documents_synced);
        self.save_entry(tenant.enterprise_id, &entry).await?;

        sqlx::query("UPDATE enterprises SET last_data_sync = $2, updated_at = NOW() WHERE id = $1")
            .bind(tenant.enterprise_id)
            .bind(synced_at)
            .execute(&self.db)
            .await?;

        Ok(SyncResult {
            connector_type,
            status,
            documents_synced,
            message,
            synced_at,
        })
    }

    async fn sync_api_endpoint(
        &self,
        tenant: &TenantContext,
        entry: &ConnectorEntry,
    ) -> AppResult<(String, i64, String)> {
        let endpoint = entry
            .configuration
            .get("endpoint_url")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Validation("endpoint_url is not configured".to_string()))?;

        let fetched = fetch_endpoint(
            endpoint,
            Duration::from_secs(self.config.connector_timeout_secs),
            self.config.max_file_size,
        )
        .await?;
        let fetched_len = fetched.body.len();

        let upload = NewDocument {
            original_filename: sync_filename(endpoint),
            content_type: fetched.content_type,
            category: entry
                .configuration
                .get("category")
                .and_then(Value::as_str)
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
            department_id: tenant.department_id,
            tags: vec!["api_endpoint".to_string()],
            is_confidential: false,
            fiscal_period: None,
        };

        let documents = DocumentService::new(self.db.clone(), self.config.clone());
        let ingested = documents
            .ingest(tenant.enterprise_id, tenant.user_id, upload, &fetched.body)
            .await;
        if let Ok(document) = &ingested {
            documents.spawn_processing(document.id);
        }

        sync_outcome(ingested.map(|_| ()), fetched_len, endpoint)
    }

    pub async fn remove(&self, tenant: &TenantContext, connector: &str) -> AppResult<()> {
        tenant.require_manager()?;
        let connector_type: ConnectorType = connector.parse().map_err(AppError::Validation)?;
        self.find_entry(tenant.enterprise_id, connector_type).await?;

        sqlx::query(
            r#"
            UPDATE enterprises
            SET connected_systems = connected_systems - $2::text, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(tenant.enterprise_id)
        .bind(connector_type.as_str())
        .execute(&self.db)
        .await?;

        tracing::info!(
            enterprise_id = tenant.enterprise_id,
            connector = connector_type.as_str(),
            "Connector removed"
        );
        Ok(())
    }

    async fn connected_systems(&self, enterprise_id: i32) -> AppResult<Value> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT connected_systems FROM enterprises WHERE id = $1")
                .bind(enterprise_id)
                .fetch_optional(&self.db)
                .await?;

        row.map(|(systems,)| systems)
            .ok_or_else(|| AppError::NotFound("Enterprise not found".to_string()))
    }

    async fn find_entry(
        &self,
        enterprise_id: i32,
        connector_type: ConnectorType,
    ) -> AppResult<ConnectorEntry> {
        let systems = self.connected_systems(enterprise_id).await?;
        systems
            .get(connector_type.as_str())
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| {
                AppError::NotFound(format!("Connector '{}' is not configured", connector_type))
            })
    }

    async fn save_entry(&self, enterprise_id: i32, entry: &ConnectorEntry) -> AppResult<()> {
        let value = serde_json::to_value(entry).map_err(|e| AppError::Internal(e.into()))?;

        let updated = sqlx::query(
            r#"
            UPDATE enterprises
            SET connected_systems = connected_systems || jsonb_build_object($2::text, $3::jsonb),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enterprise_id)
        .bind(entry.connector_type.as_str())
        .bind(value)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Enterprise not found".to_string()));
        }
        Ok(())
    }
}

/// Body and declared content type of an endpoint response
#[derive(Debug)]
pub struct FetchedContent {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// GET `endpoint`, failing on non-2xx answers and on bodies over `max_bytes`
pub async fn fetch_endpoint(
    endpoint: &str,
    timeout: Duration,
    max_bytes: usize,
) -> AppResult<FetchedContent> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(e.into()))?;

    let mut response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|e| AppError::ExternalService(format!("Endpoint request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::ExternalService(format!(
            "Endpoint returned {}",
            response.status()
        )));
    }

    if let Some(length) = response.content_length() {
        if length > max_bytes as u64 {
            return Err(too_large(max_bytes));
        }
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AppError::ExternalService(format!("Failed to read endpoint body: {}", e)))?
    {
        if body.len() + chunk.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(FetchedContent { content_type, body })
}

fn too_large(max_bytes: usize) -> AppError {
    AppError::Validation(format!(
        "Endpoint content exceeds maximum allowed size of {} bytes",
        max_bytes
    ))
}

/// `(status, documents_synced, message)` for an ingest attempt; a duplicate
/// hash means the endpoint served the same content as before
pub fn sync_outcome(
    ingested: AppResult<()>,
    fetched_len: usize,
    endpoint: &str,
) -> AppResult<(String, i64, String)> {
    match ingested {
        Ok(()) => Ok((
            "completed".to_string(),
            1,
            format!("Fetched {} bytes from {}", fetched_len, endpoint),
        )),
        Err(AppError::Conflict(_)) => Ok((
            "unchanged".to_string(),
            0,
            "Endpoint content is unchanged since the last sync".to_string(),
        )),
        Err(e) => Err(e),
    }
}

/// Check required fields and, for endpoints, the URL
pub fn validate_configuration(
    connector_type: ConnectorType,
    configuration: &Map<String, Value>,
) -> Result<(), String> {
    let missing: Vec<&str> = connector_type
        .required_fields()
        .iter()
        .copied()
        .filter(|field| match configuration.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        })
        .collect();

    if !missing.is_empty() {
        return Err(format!(
            "Missing required fields for {}: {}",
            connector_type,
            missing.join(", ")
        ));
    }

    if connector_type == ConnectorType::ApiEndpoint {
        let raw = configuration
            .get("endpoint_url")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let url = Url::parse(raw).map_err(|e| format!("Invalid endpoint_url: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err("endpoint_url must use http or https".to_string());
        }
    }

    Ok(())
}

pub fn is_credential_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    CREDENTIAL_MARKERS.iter().any(|m| lower.contains(m))
}

/// Drop credential-like keys before the configuration is persisted
pub fn strip_credentials(configuration: Map<String, Value>) -> Map<String, Value> {
    configuration
        .into_iter()
        .filter(|(key, _)| !is_credential_key(key))
        .collect()
}

/// Document name for content pulled from `endpoint`
pub fn sync_filename(endpoint: &str) -> String {
    let name = Url::parse(endpoint)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
                .filter(|s| !s.is_empty())
                .or_else(|| url.host_str().map(str::to_string))
        })
        .unwrap_or_else(|| "api_endpoint".to_string());

    let name = sanitize_filename(&name);
    match file_extension(&name) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => name,
        _ => format!("{}.txt", name),
    }
}

/// Entries stored in `connected_systems`, skipping anything unreadable
pub fn parse_entries(systems: &Value) -> Vec<ConnectorEntry> {
    let mut entries: Vec<ConnectorEntry> = systems
        .as_object()
        .map(|map| {
            map.values()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    entries.sort_by_key(|e| e.connector_type.as_str());
    entries
}
