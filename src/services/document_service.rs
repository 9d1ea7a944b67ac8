use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::data_extraction::{extract_dates, extract_entities, extract_financial_data, extract_tables};
use super::embedding_service::{EmbeddingClient, EmbeddingService};
use super::text_processing::{extract_text, TextSplitter};
use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{
        bytes_to_mb, percentage, validate_upload, CategoryCount, DocumentContent, DocumentKind,
        DocumentStats, DocumentUploadResponse, EnterpriseDocument, ListDocumentsQuery, NewDocument,
        ProcessingStatus, DEFAULT_CATEGORIES,
    },
    utils::{clamp_limit, clamp_offset, sanitize_filename},
};

const METADATA_LIST_LIMIT: usize = 20;

/// Upload, background processing and retrieval of enterprise documents
pub struct DocumentService {
    db: PgPool,
    config: Config,
}

impl DocumentService {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self { db, config }
    }

    /// Store an upload and queue it for processing
    pub async fn upload(
        &self,
        enterprise_id: i32,
        user_id: i32,
        upload: NewDocument,
        bytes: &[u8],
    ) -> AppResult<DocumentUploadResponse> {
        let document = self.ingest(enterprise_id, user_id, upload, bytes).await?;
        self.spawn_processing(document.id);

        Ok(DocumentUploadResponse {
            id: document.id,
            filename: document.original_filename,
            file_size: document.file_size,
            processing_status: document.processing_status,
            message: "Document uploaded successfully and queued for processing".to_string(),
        })
    }

    /// Validate, deduplicate and persist the raw file plus its pending row
    pub async fn ingest(
        &self,
        enterprise_id: i32,
        user_id: i32,
        upload: NewDocument,
        bytes: &[u8],
    ) -> AppResult<EnterpriseDocument> {
        validate_upload(&upload.original_filename, bytes.len(), self.config.max_file_size)
            .map_err(AppError::Validation)?;

        let hash = content_hash(bytes);

        // Fast path; the unique index settles concurrent uploads
        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM documents WHERE enterprise_id = $1 AND content_hash = $2",
        )
        .bind(enterprise_id)
        .bind(&hash)
        .fetch_optional(&self.db)
        .await?;

        if let Some((id,)) = existing {
            return Err(AppError::Conflict(format!(
                "An identical document already exists ({})",
                id
            )));
        }

        let dir = enterprise_dir(&self.config.upload_dir, enterprise_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create upload dir: {}", e)))?;

        let (filename, path) = write_new_file(
            &dir,
            &stored_filename(Utc::now(), &upload.original_filename),
            bytes,
        )
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to save file: {}", e)))?;

        let content_type = upload.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&upload.original_filename)
                .first_or_octet_stream()
                .to_string()
        });

        let inserted = sqlx::query_as::<_, EnterpriseDocument>(
            r#"
            INSERT INTO documents
            (id, enterprise_id, department_id, uploaded_by, filename, original_filename,
             file_path, file_size, content_type, content_hash, category, tags,
             is_confidential, fiscal_period, processing_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(enterprise_id)
        .bind(upload.department_id)
        .bind(user_id)
        .bind(&filename)
        .bind(&upload.original_filename)
        .bind(path.to_string_lossy().to_string())
        .bind(bytes.len() as i64)
        .bind(&content_type)
        .bind(&hash)
        .bind(&upload.category)
        .bind(&upload.tags)
        .bind(upload.is_confidential)
        .bind(&upload.fiscal_period)
        .bind(ProcessingStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await;

        match inserted {
            Ok(document) => {
                tracing::info!(
                    document_id = %document.id,
                    enterprise_id,
                    "Stored upload {} ({} bytes)",
                    document.original_filename,
                    document.file_size
                );
                Ok(document)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(insert_error(e))
            }
        }
    }

    /// Run processing on a background task
    pub fn spawn_processing(&self, document_id: Uuid) {
        let service = DocumentService::new(self.db.clone(), self.config.clone());
        tokio::spawn(async move {
            if let Err(e) = service.process(document_id).await {
                tracing::error!(%document_id, "Document processing failed: {}", e);
            }
        });
    }

    /// Extract, chunk and embed a document, recording the outcome on its row
    pub async fn process(&self, document_id: Uuid) -> AppResult<()> {
        let document = sqlx::query_as::<_, EnterpriseDocument>(
            r#"
            UPDATE documents
            SET processing_status = $2, error_message = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(ProcessingStatus::Processing.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        tracing::info!(%document_id, "Processing {}", document.original_filename);
        let started = Instant::now();

        match self.extract_and_embed(&document).await {
            Ok((chunks, metadata)) => {
                let elapsed = started.elapsed().as_secs_f64();
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET processed = TRUE, processing_status = $2, chunks_count = $3,
                        processing_time_seconds = $4, processed_at = NOW(),
                        metadata = $5, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(document_id)
                .bind(ProcessingStatus::Completed.as_str())
                .bind(chunks as i32)
                .bind(elapsed)
                .bind(metadata)
                .execute(&self.db)
                .await?;

                tracing::info!(%document_id, chunks, "Processing completed in {:.2}s", elapsed);
                Ok(())
            }
            Err(e) => {
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET processed = FALSE, processing_status = $2, error_message = $3, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(document_id)
                .bind(ProcessingStatus::Failed.as_str())
                .bind(format!("{:#}", e))
                .execute(&self.db)
                .await?;

                Err(AppError::Internal(e))
            }
        }
    }

    async fn extract_and_embed(&self, document: &EnterpriseDocument) -> anyhow::Result<(usize, Value)> {
        let kind = DocumentKind::from_filename(&document.original_filename)
            .ok_or_else(|| anyhow::anyhow!("Unsupported file type: {}", document.original_filename))?;
        let path = Path::new(&document.file_path);

        let text = extract_text(path, kind).await?;
        if text.trim().is_empty() {
            anyhow::bail!("No text could be extracted from the document");
        }

        let chunks = TextSplitter::new(self.config.chunk_size, self.config.chunk_overlap).split(&text);

        let embedder = EmbeddingClient::new(&self.config);
        let embeddings = embedder.embed_batch(&chunks).await?;
        EmbeddingService::new(self.db.clone())
            .store_chunks(document, &chunks, embeddings, embedder.model())
            .await?;

        let file_modified = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        Ok((chunks.len(), document_metadata(&text, file_modified)))
    }

    pub async fn list(
        &self,
        enterprise_id: i32,
        query: &ListDocumentsQuery,
    ) -> AppResult<Vec<EnterpriseDocument>> {
        let documents = sqlx::query_as::<_, EnterpriseDocument>(
            r#"
            SELECT * FROM documents
            WHERE enterprise_id = $1
              AND ($2::text IS NULL OR category = $2)
              AND ($3::integer IS NULL OR department_id = $3)
              AND (NOT $4 OR processed = TRUE)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(enterprise_id)
        .bind(query.category.as_deref().map(str::to_lowercase))
        .bind(query.department_id)
        .bind(query.processed_only.unwrap_or(true))
        .bind(clamp_limit(query.limit, 20, 100))
        .bind(clamp_offset(query.offset))
        .fetch_all(&self.db)
        .await?;

        Ok(documents)
    }

    /// Fetch a document and record the access
    pub async fn get(&self, enterprise_id: i32, id: Uuid) -> AppResult<EnterpriseDocument> {
        sqlx::query_as::<_, EnterpriseDocument>(
            r#"
            UPDATE documents
            SET access_count = access_count + 1, last_accessed = NOW()
            WHERE id = $1 AND enterprise_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(enterprise_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))
    }

    async fn find(&self, enterprise_id: i32, id: Uuid) -> AppResult<EnterpriseDocument> {
        sqlx::query_as::<_, EnterpriseDocument>(
            "SELECT * FROM documents WHERE id = $1 AND enterprise_id = $2",
        )
        .bind(id)
        .bind(enterprise_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))
    }

    /// Delete the stored file and the row; chunks go with it
    pub async fn delete(&self, enterprise_id: i32, id: Uuid) -> AppResult<()> {
        let document = self.find(enterprise_id, id).await?;

        if let Err(e) = tokio::fs::remove_file(&document.file_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(document_id = %id, "Failed to remove {}: {}", document.file_path, e);
            }
        }

        sqlx::query("DELETE FROM documents WHERE id = $1 AND enterprise_id = $2")
            .bind(id)
            .bind(enterprise_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    pub async fn reprocess(&self, enterprise_id: i32, id: Uuid) -> AppResult<EnterpriseDocument> {
        let document = sqlx::query_as::<_, EnterpriseDocument>(
            r#"
            UPDATE documents
            SET processed = FALSE, processing_status = $3, error_message = NULL, updated_at = NOW()
            WHERE id = $1 AND enterprise_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(enterprise_id)
        .bind(ProcessingStatus::Pending.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        self.spawn_processing(document.id);
        Ok(document)
    }

    pub async fn content(
        &self,
        enterprise_id: i32,
        id: Uuid,
        chunk_limit: Option<i64>,
    ) -> AppResult<DocumentContent> {
        let document = self.find(enterprise_id, id).await?;
        if !document.processed {
            return Err(AppError::Validation(
                "Document has not been processed yet".to_string(),
            ));
        }

        let chunks = EmbeddingService::new(self.db.clone())
            .list_chunks(id, clamp_limit(chunk_limit, 10, 100))
            .await?;

        Ok(DocumentContent {
            document_id: document.id,
            filename: document.original_filename,
            total_chunks: document.chunks_count,
            chunks,
        })
    }

    pub async fn categories(&self, enterprise_id: i32) -> AppResult<Vec<String>> {
        let used: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT category FROM documents WHERE enterprise_id = $1 AND category IS NOT NULL",
        )
        .bind(enterprise_id)
        .fetch_all(&self.db)
        .await?;

        Ok(merge_categories(used.into_iter().map(|(c,)| c)))
    }

    pub async fn stats(&self, enterprise_id: i32) -> AppResult<DocumentStats> {
        let (total, processed, total_bytes): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE processed),
                   COALESCE(SUM(file_size), 0)::bigint
            FROM documents
            WHERE enterprise_id = $1
            "#,
        )
        .bind(enterprise_id)
        .fetch_one(&self.db)
        .await?;

        let by_category: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT COALESCE(category, 'uncategorized'), COUNT(*)
            FROM documents
            WHERE enterprise_id = $1
            GROUP BY 1
            ORDER BY 2 DESC, 1
            "#,
        )
        .bind(enterprise_id)
        .fetch_all(&self.db)
        .await?;

        Ok(DocumentStats {
            total_documents: total,
            processed_documents: processed,
            processing_rate: percentage(processed, total),
            by_category: by_category
                .into_iter()
                .map(|(category, count)| CategoryCount { category, count })
                .collect(),
            total_size_mb: bytes_to_mb(total_bytes),
            average_size_mb: if total > 0 {
                bytes_to_mb(total_bytes / total)
            } else {
                0.0
            },
        })
    }
}

fn enterprise_dir(upload_dir: &str, enterprise_id: i32) -> PathBuf {
    Path::new(upload_dir).join(format!("enterprise_{}", enterprise_id))
}

/// `{YYYYmmdd_HHMMSS}_{sanitized original}`
pub fn stored_filename(now: DateTime<Utc>, original: &str) -> String {
    format!("{}_{}", now.format("%Y%m%d_%H%M%S"), sanitize_filename(original))
}

/// A lost race on the per-enterprise hash index is a duplicate upload
fn insert_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("An identical document already exists".to_string())
        }
        e => e.into(),
    }
}

/// `report.pdf` becomes `report_{suffix}.pdf`
fn with_suffix(filename: &str, suffix: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", filename, suffix),
    }
}

/// Write `bytes` to a file in `dir` that did not exist before, never replacing
/// another upload. Returns the final file name and path.
pub async fn write_new_file(
    dir: &Path,
    filename: &str,
    bytes: &[u8],
) -> std::io::Result<(String, PathBuf)> {
    let mut candidate = filename.to_string();
    loop {
        let path = dir.join(&candidate);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                if let Err(e) = file.write_all(bytes).await {
                    drop(file);
                    let _ = tokio::fs::remove_file(&path).await;
                    return Err(e);
                }
                file.flush().await?;
                return Ok((candidate, path));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let suffix = Uuid::new_v4().simple().to_string();
                candidate = with_suffix(filename, &suffix[..8]);
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Categories in use plus the defaults, sorted and deduplicated
pub fn merge_categories(used: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut categories: Vec<String> = used
        .into_iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .chain(DEFAULT_CATEGORIES.iter().map(|c| c.to_string()))
        .collect();
    categories.sort();
    categories.dedup();
    categories
}

/// Summary stored on the document row after processing
pub fn document_metadata(text: &str, file_modified: Option<String>) -> Value {
    let mut entities = extract_entities(text);
    entities.truncate(METADATA_LIST_LIMIT);

    let financial: Vec<String> = extract_financial_data(text)
        .into_iter()
        .take(METADATA_LIST_LIMIT)
        .map(|f| f.value)
        .collect();

    let mut dates = extract_dates(text);
    dates.truncate(METADATA_LIST_LIMIT);

    json!({
        "tables_found": extract_tables(text).len(),
        "entities_found": entities,
        "financial_data": financial,
        "dates_found": dates,
        "language": "en",
        "file_modified": file_modified,
    })
}
