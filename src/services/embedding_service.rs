//! Embedding generation and pgvector storage/search for document chunks

use pgvector::Vector;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    models::{EnterpriseDocument, RetrievedChunk, StoredChunk},
};

/// OpenAI accepts at most this many inputs per request
const EMBEDDING_BATCH_SIZE: usize = 100;

#[derive(Debug, Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint
#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl EmbeddingClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.openai_key().map(str::to_string),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed a single text
    pub async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ExternalService("No embedding returned".into()))
    }

    /// Embed many texts, preserving input order
    pub async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("OpenAI API key not configured".into()))?;

        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
            let request = OpenAIEmbeddingRequest {
                input: batch,
                model: &self.model,
            };

            let response = self
                .client
                .post(format!("{}/v1/embeddings", self.base_url))
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await
                .map_err(|e| AppError::ExternalService(format!("OpenAI API error: {}", e)))?;

            if !response.status().is_success() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(AppError::ExternalService(format!(
                    "OpenAI API error: {}",
                    error_text
                )));
            }

            let mut body: OpenAIEmbeddingResponse = response.json().await.map_err(|e| {
                AppError::ExternalService(format!("Failed to parse response: {}", e))
            })?;

            if body.data.len() != batch.len() {
                return Err(AppError::ExternalService(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    body.data.len()
                )));
            }

            body.data.sort_by_key(|d| d.index);
            embeddings.extend(body.data.into_iter().map(|d| d.embedding));
        }

        Ok(embeddings)
    }
}

#[derive(Debug, FromRow)]
struct SearchRow {
    chunk_id: Uuid,
    document_id: Uuid,
    chunk_index: i32,
    chunk_text: String,
    filename: String,
    category: Option<String>,
    fiscal_period: Option<String>,
    similarity: f64,
}

impl From<SearchRow> for RetrievedChunk {
    fn from(row: SearchRow) -> Self {
        Self {
            chunk_id: row.chunk_id,
            document_id: row.document_id,
            chunk_index: row.chunk_index,
            text: row.chunk_text,
            filename: row.filename,
            category: row.category,
            fiscal_period: row.fiscal_period,
            similarity: row.similarity,
            score: row.similarity,
        }
    }
}

/// Chunk embedding persistence and enterprise-scoped vector search
pub struct EmbeddingService {
    pool: PgPool,
}

impl EmbeddingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace all stored chunks of `document` with the given texts and vectors
    pub async fn store_chunks(
        &self,
        document: &EnterpriseDocument,
        chunks: &[String],
        embeddings: Vec<Vec<f32>>,
        model: &str,
    ) -> AppResult<usize> {
        if chunks.len() != embeddings.len() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_embeddings WHERE document_id = $1")
            .bind(document.id)
            .execute(&mut *tx)
            .await?;

        for (idx, (text, embedding)) in chunks.iter().zip(embeddings).enumerate() {
            sqlx::query(
                r#"
                INSERT INTO chunk_embeddings
                (document_id, enterprise_id, chunk_index, chunk_text, category,
                 fiscal_period, is_confidential, embedding, model)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(document.id)
            .bind(document.enterprise_id)
            .bind(idx as i32)
            .bind(text)
            .bind(&document.category)
            .bind(&document.fiscal_period)
            .bind(document.is_confidential)
            .bind(Vector::from(embedding))
            .bind(model)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(chunks.len())
    }

    /// Cosine search over the enterprise's processed documents
    pub async fn search(
        &self,
        enterprise_id: i32,
        embedding: Vec<f32>,
        threshold: f64,
        limit: usize,
    ) -> AppResult<Vec<RetrievedChunk>> {
        let rows = sqlx::query_as::<_, SearchRow>(
            r#"
            SELECT
                ce.id AS chunk_id,
                ce.document_id,
                ce.chunk_index,
                ce.chunk_text,
                d.original_filename AS filename,
                ce.category,
                ce.fiscal_period,
                (1 - (ce.embedding <=> $1))::float8 AS similarity
            FROM chunk_embeddings ce
            JOIN documents d ON d.id = ce.document_id
            WHERE ce.enterprise_id = $2
              AND d.processed = TRUE
              AND 1 - (ce.embedding <=> $1) >= $3
            ORDER BY ce.embedding <=> $1
            LIMIT $4
            "#,
        )
        .bind(Vector::from(embedding))
        .bind(enterprise_id)
        .bind(threshold)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RetrievedChunk::from).collect())
    }

    /// Number of searchable chunks for the enterprise
    pub async fn count_chunks(&self, enterprise_id: i32) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM chunk_embeddings ce
            JOIN documents d ON d.id = ce.document_id
            WHERE ce.enterprise_id = $1 AND d.processed = TRUE
            "#,
        )
        .bind(enterprise_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    pub async fn list_chunks(&self, document_id: Uuid, limit: i64) -> AppResult<Vec<StoredChunk>> {
        let chunks = sqlx::query_as::<_, StoredChunk>(
            r#"
            SELECT chunk_index, chunk_text
            FROM chunk_embeddings
            WHERE document_id = $1
            ORDER BY chunk_index
            LIMIT $2
            "#,
        )
        .bind(document_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks)
    }
}
