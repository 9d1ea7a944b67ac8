use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;

use super::ranking::jaccard_similarity;
use crate::{
    error::{AppError, AppResult},
    middleware::{RequestMeta, TenantContext},
    models::{
        EnterpriseQueryRecord, ExportFormat, HistoryQuery, QueryExport, QueryFeedbackRequest,
        QueryHistoryItem, QueryStats, SimilarQuery,
    },
    utils::{clamp_days, clamp_limit, clamp_offset},
};

/// Candidates considered when looking for similar questions
const SIMILAR_CANDIDATE_POOL: i64 = 200;

/// History, feedback, statistics and export of answered queries
pub struct QueryService {
    db: PgPool,
}

impl QueryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn history(
        &self,
        enterprise_id: i32,
        query: &HistoryQuery,
    ) -> AppResult<Vec<QueryHistoryItem>> {
        let (query_type, complexity) = query.filters().map_err(AppError::Validation)?;

        let items = sqlx::query_as::<_, QueryHistoryItem>(
            r#"
            SELECT id, original_query, query_type, complexity, department_id,
                   LEFT(ai_response, 200) AS response_preview,
                   confidence_score, processing_time_ms, satisfaction_score, created_at
            FROM enterprise_queries
            WHERE enterprise_id = $1
              AND ($2::text IS NULL OR query_type = $2)
              AND ($3::text IS NULL OR complexity = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(enterprise_id)
        .bind(query_type.map(|t| t.as_str()))
        .bind(complexity.map(|c| c.as_str()))
        .bind(clamp_limit(query.limit, 20, 100))
        .bind(clamp_offset(query.offset))
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }

    pub async fn get(&self, enterprise_id: i32, id: i32) -> AppResult<EnterpriseQueryRecord> {
        sqlx::query_as::<_, EnterpriseQueryRecord>(
            "SELECT * FROM enterprise_queries WHERE id = $1 AND enterprise_id = $2",
        )
        .bind(id)
        .bind(enterprise_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Query not found".to_string()))
    }

    /// Record feedback; fields left out keep their previous value
    pub async fn feedback(
        &self,
        enterprise_id: i32,
        id: i32,
        req: &QueryFeedbackRequest,
    ) -> AppResult<EnterpriseQueryRecord> {
        sqlx::query_as::<_, EnterpriseQueryRecord>(
            r#"
            UPDATE enterprise_queries
            SET was_helpful = COALESCE($3, was_helpful),
                satisfaction_score = COALESCE($4, satisfaction_score),
                feedback_text = COALESCE($5, feedback_text)
            WHERE id = $1 AND enterprise_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(enterprise_id)
        .bind(req.was_helpful)
        .bind(req.satisfaction_score)
        .bind(&req.feedback_text)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Query not found".to_string()))
    }

    pub async fn stats(&self, enterprise_id: i32, days: Option<i64>) -> AppResult<QueryStats> {
        let days = clamp_days(days);
        let cutoff = Utc::now() - Duration::days(days);

        let (total, avg_ms, avg_satisfaction, feedback_count): (i64, f64, Option<f64>, i64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COALESCE(AVG(processing_time_ms), 0)::float8,
                       AVG(satisfaction_score)::float8,
                       COUNT(satisfaction_score)
                FROM enterprise_queries
                WHERE enterprise_id = $1 AND created_at >= $2
                "#,
            )
            .bind(enterprise_id)
            .bind(cutoff)
            .fetch_one(&self.db)
            .await?;

        let by_type: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT query_type, COUNT(*)
            FROM enterprise_queries
            WHERE enterprise_id = $1 AND created_at >= $2
            GROUP BY query_type
            "#,
        )
        .bind(enterprise_id)
        .bind(cutoff)
        .fetch_all(&self.db)
        .await?;

        Ok(QueryStats {
            period_days: days as i32,
            total_queries: total,
            by_type: by_type.into_iter().collect::<HashMap<_, _>>(),
            avg_processing_time_ms: avg_ms,
            avg_satisfaction,
            feedback_count,
        })
    }

    /// Earlier questions of the same type ranked by word overlap
    pub async fn similar(
        &self,
        enterprise_id: i32,
        id: i32,
        limit: Option<i64>,
    ) -> AppResult<Vec<SimilarQuery>> {
        let target = self.get(enterprise_id, id).await?;

        let candidates: Vec<(i32, String, Option<f64>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, original_query, confidence_score, created_at
            FROM enterprise_queries
            WHERE enterprise_id = $1 AND query_type = $2 AND id <> $3
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(enterprise_id)
        .bind(&target.query_type)
        .bind(id)
        .bind(SIMILAR_CANDIDATE_POOL)
        .fetch_all(&self.db)
        .await?;

        let candidates = candidates
            .into_iter()
            .map(|(id, original_query, confidence_score, created_at)| SimilarQuery {
                id,
                original_query,
                similarity: 0.0,
                confidence_score,
                created_at,
            })
            .collect();

        Ok(rank_similar(
            &target.original_query,
            candidates,
            clamp_limit(limit, 5, 20) as usize,
        ))
    }

    /// Render a stored query and record the export
    pub async fn export(
        &self,
        tenant: &TenantContext,
        meta: &RequestMeta,
        id: i32,
        format: Option<&str>,
    ) -> AppResult<QueryExport> {
        let format: ExportFormat = format
            .unwrap_or("json")
            .parse()
            .map_err(AppError::Validation)?;
        let record = self.get(tenant.enterprise_id, id).await?;

        let content = render_export(&record, format)?;
        let filename = format!(
            "query_{}_{}.{}",
            record.id,
            Utc::now().format("%Y%m%d_%H%M%S"),
            format.extension()
        );

        let (export_id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO query_exports
            (query_id, enterprise_id, user_id, export_format, filename, file_size, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(tenant.enterprise_id)
        .bind(tenant.user_id)
        .bind(format.as_str())
        .bind(&filename)
        .bind(content.len() as i64)
        .bind(&meta.ip_address)
        .fetch_one(&self.db)
        .await?;

        Ok(QueryExport {
            export_id,
            query_id: record.id,
            format,
            filename,
            content_type: format.content_type().to_string(),
            size_bytes: content.len(),
            content,
        })
    }
}

/// Score candidates against `target`, drop those sharing no words, best first
pub fn rank_similar(target: &str, candidates: Vec<SimilarQuery>, limit: usize) -> Vec<SimilarQuery> {
    let mut scored: Vec<SimilarQuery> = candidates
        .into_iter()
        .map(|mut c| {
            c.similarity = jaccard_similarity(target, &c.original_query);
            c
        })
        .filter(|c| c.similarity > 0.0)
        .collect();

    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(limit);
    scored
}

pub fn render_export(record: &EnterpriseQueryRecord, format: ExportFormat) -> AppResult<String> {
    let response = record.ai_response.as_deref().unwrap_or_default();

    let content = match format {
        ExportFormat::Json => serde_json::to_string_pretty(&json!({
            "query_id": record.id,
            "query": record.original_query,
            "query_type": record.query_type,
            "complexity": record.complexity,
            "response": response,
            "structured_data": record.structured_data,
            "confidence_score": record.confidence_score,
            "processing_time_ms": record.processing_time_ms,
            "documents_used": record.documents_used.len(),
            "created_at": record.created_at.to_rfc3339(),
        }))
        .map_err(|e| AppError::Internal(e.into()))?,
        ExportFormat::Csv => {
            let header = "query_id,query,query_type,complexity,response,confidence_score,created_at";
            let row = [
                record.id.to_string(),
                csv_field(&record.original_query),
                csv_field(&record.query_type),
                csv_field(&record.complexity),
                csv_field(response),
                record.confidence_score.map(|c| c.to_string()).unwrap_or_default(),
                record.created_at.to_rfc3339(),
            ]
            .join(",");
            format!("{}\n{}\n", header, row)
        }
        ExportFormat::Markdown => {
            let mut md = format!("# Enterprise Query #{}\n\n", record.id);
            md.push_str(&format!("**Question:** {}\n\n", record.original_query));
            md.push_str(&format!(
                "- Type: {}\n- Complexity: {}\n",
                record.query_type, record.complexity
            ));
            if let Some(confidence) = record.confidence_score {
                md.push_str(&format!("- Confidence: {:.2}\n", confidence));
            }
            md.push_str(&format!(
                "- Asked: {}\n\n## Response\n\n{}\n",
                record.created_at.format("%Y-%m-%d %H:%M UTC"),
                response
            ));
            md
        }
    };

    Ok(content)
}

/// Quote a CSV field when it contains a delimiter, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
