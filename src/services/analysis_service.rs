//! Answering enterprise questions: classify, retrieve, extract, prompt, call
//! the model, structure the answer and record the exchange.

use std::collections::HashSet;
use std::time::Instant;

use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    context_builder::build_context,
    data_extraction::process_chunks,
    embedding_service::{EmbeddingClient, EmbeddingService},
    enterprise_service::EnterpriseService,
    llm_client::{fallback_answer, LlmClient},
    prompt_templates::{render_prompt, PromptInputs, SYSTEM_PROMPT},
    query_classifier::classify_query,
    ranking::rerank,
    response_structurer::structure_response,
};
use crate::{
    config::Config,
    error::AppResult,
    middleware::TenantContext,
    models::{
        EnterpriseQueryRequest, EnterpriseQueryResponse, NewQueryRecord, ProcessedData,
        QueryAnalysis, RetrievedChunk, StructuredResponse,
    },
};

const MAX_STRUCTURED_TABLES: usize = 3;
const MAX_STRUCTURED_FIGURES: usize = 10;

pub struct AnalysisService {
    db: PgPool,
    config: Config,
}

impl AnalysisService {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self { db, config }
    }

    pub async fn process_enterprise_query(
        &self,
        tenant: &TenantContext,
        request: &EnterpriseQueryRequest,
    ) -> AppResult<EnterpriseQueryResponse> {
        let started = Instant::now();

        let enterprises = EnterpriseService::new(self.db.clone());
        let enterprise = enterprises.get(tenant.enterprise_id).await?;
        let department_id = request.department_id.or(tenant.department_id);
        let department = match department_id {
            Some(id) => enterprises.find_department(tenant.enterprise_id, id).await?,
            None => None,
        };

        let analysis = classify_query(&request.query);
        tracing::debug!(
            enterprise_id = tenant.enterprise_id,
            query_type = analysis.query_type.as_str(),
            complexity = analysis.complexity.as_str(),
            "Classified query"
        );

        let chunks = self
            .retrieve(tenant.enterprise_id, &request.query, &analysis)
            .await?;
        let processed = process_chunks(&chunks, &analysis);
        let context = build_context(&processed, self.config.max_context_chars);

        let prompt = render_prompt(
            &analysis,
            &PromptInputs {
                enterprise_name: &enterprise.name,
                industry: enterprise.industry_label(),
                question: &request.query,
                context: &context,
                enterprise_instructions: enterprise.ai_instructions.as_deref(),
                department_name: department.as_ref().map(|d| d.name.as_str()),
                department_instructions: department
                    .as_ref()
                    .and_then(|d| d.specialized_instructions.as_deref()),
                user_context: request.context.as_deref(),
            },
        );

        let llm = LlmClient::new(&self.config);
        let (answer, tokens_used, llm_model, used_fallback) =
            match llm.complete(SYSTEM_PROMPT, &prompt).await {
                Ok(completion) => (
                    completion.text,
                    completion.tokens_used.map(|t| t as i32),
                    Some(completion.model),
                    false,
                ),
                Err(e) => {
                    tracing::warn!(
                        enterprise_id = tenant.enterprise_id,
                        "LLM call failed, using fallback answer: {}",
                        e
                    );
                    (fallback_answer(&e), None, None, true)
                }
            };

        let structured = structure_response(&answer, &analysis);
        let structured_data = assemble_structured_data(&structured, &processed);
        let documents = unique_documents(&chunks);
        let processing_time_ms = started.elapsed().as_millis() as i64;

        let query_id = self
            .record(&NewQueryRecord {
                enterprise_id: tenant.enterprise_id,
                user_id: tenant.user_id,
                department_id: department.as_ref().map(|d| d.id),
                original_query: request.query.clone(),
                query_type: analysis.query_type,
                complexity: analysis.complexity,
                priority: request.priority().to_string(),
                user_context: request.context.clone(),
                ai_response: answer.clone(),
                structured_data: structured_data.clone(),
                documents_used: documents.clone(),
                confidence_score: analysis.confidence,
                processing_time_ms,
                entities: analysis.entities.clone(),
                tokens_used,
                llm_model,
                used_fallback,
            })
            .await?;

        tracing::info!(
            query_id,
            enterprise_id = tenant.enterprise_id,
            documents = documents.len(),
            processing_time_ms,
            used_fallback,
            "Enterprise query answered"
        );

        Ok(EnterpriseQueryResponse {
            query_id,
            response: answer,
            structured_data,
            query_type: analysis.query_type,
            complexity: analysis.complexity,
            documents_used: documents.len(),
            confidence_score: analysis.confidence,
            processing_time_ms,
            requires_approval: analysis.requires_approval,
            suggested_follow_ups: structured.follow_ups,
        })
    }

    /// Vector search followed by re-ranking; skipped when nothing is indexed
    async fn retrieve(
        &self,
        enterprise_id: i32,
        query: &str,
        analysis: &QueryAnalysis,
    ) -> AppResult<Vec<RetrievedChunk>> {
        let store = EmbeddingService::new(self.db.clone());
        let available = store.count_chunks(enterprise_id).await?;
        let k = retrieval_limit(self.config.max_retrieved_chunks, available);
        if k == 0 {
            tracing::debug!(enterprise_id, "No processed chunks, skipping retrieval");
            return Ok(Vec::new());
        }

        let embedding = match EmbeddingClient::new(&self.config).embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(enterprise_id, "Query embedding failed, answering without documents: {}", e);
                return Ok(Vec::new());
            }
        };

        let candidates = store
            .search(enterprise_id, embedding, self.config.similarity_threshold, k * 2)
            .await?;

        Ok(rerank(candidates, analysis, query, k))
    }

    async fn record(&self, record: &NewQueryRecord) -> AppResult<i32> {
        let (id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO enterprise_queries
            (enterprise_id, user_id, department_id, original_query, query_type, complexity,
             priority, user_context, ai_response, structured_data, documents_used,
             confidence_score, processing_time_ms, entities, tokens_used, llm_model,
             used_fallback, responded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, NOW())
            RETURNING id
            "#,
        )
        .bind(record.enterprise_id)
        .bind(record.user_id)
        .bind(record.department_id)
        .bind(&record.original_query)
        .bind(record.query_type.as_str())
        .bind(record.complexity.as_str())
        .bind(&record.priority)
        .bind(&record.user_context)
        .bind(&record.ai_response)
        .bind(&record.structured_data)
        .bind(&record.documents_used)
        .bind(record.confidence_score)
        .bind(record.processing_time_ms)
        .bind(serde_json::json!(record.entities))
        .bind(record.tokens_used)
        .bind(&record.llm_model)
        .bind(record.used_fallback)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }
}

/// Number of chunks to keep after re-ranking
pub fn retrieval_limit(max_chunks: usize, available: i64) -> usize {
    max_chunks.min(available.max(0) as usize)
}

/// Distinct source documents in ranking order
pub fn unique_documents(chunks: &[RetrievedChunk]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .map(|c| c.document_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Answer sections plus the tables and figures that backed them
pub fn assemble_structured_data(structured: &StructuredResponse, processed: &ProcessedData) -> Value {
    let mut data: Map<String, Value> = structured.data.clone();

    if !processed.tables.is_empty() {
        let tables: Vec<_> = processed.tables.iter().take(MAX_STRUCTURED_TABLES).collect();
        data.insert("tables".to_string(), serde_json::json!(tables));
    }

    if !processed.financial_data.is_empty() {
        let figures: Vec<_> = processed
            .financial_data
            .iter()
            .take(MAX_STRUCTURED_FIGURES)
            .collect();
        data.insert("financial_data".to_string(), serde_json::json!(figures));
    }

    Value::Object(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedTable, FinancialFigure, FinancialKind};

    fn chunk(document_id: Uuid) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            document_id,
            chunk_index: 0,
            text: "text".to_string(),
            filename: "doc.txt".to_string(),
            category: None,
            fiscal_period: None,
            similarity: 0.7,
            score: 0.7,
        }
    }

    #[test]
    fn test_retrieval_limit() {
        assert_eq!(retrieval_limit(15, 0), 0);
        assert_eq!(retrieval_limit(15, 4), 4);
        assert_eq!(retrieval_limit(15, 400), 15);
        assert_eq!(retrieval_limit(15, -1), 0);
    }

    #[test]
    fn test_unique_documents_keeps_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let docs = unique_documents(&[chunk(a), chunk(b), chunk(a)]);
        assert_eq!(docs, vec![a, b]);
    }

    #[test]
    fn test_assemble_structured_data_caps_tables_and_figures() {
        let mut sections = Map::new();
        sections.insert("financial_summary".to_string(), Value::String("Up 12%".into()));
        let structured = StructuredResponse {
            text: String::new(),
            data: sections,
            follow_ups: vec![],
        };
        let table = ExtractedTable {
            headers: vec!["A".into(), "B".into()],
            rows: vec![vec!["1".into(), "2".into()]],
            row_count: 1,
        };
        let figure = FinancialFigure {
            kind: FinancialKind::Percentage,
            value: "12%".into(),
            amount: Some(12.0),
            context: "Up 12%".into(),
        };
        let processed = ProcessedData {
            tables: vec![table; 5],
            financial_data: vec![figure; 25],
            ..Default::default()
        };

        let data = assemble_structured_data(&structured, &processed);
        assert_eq!(data["financial_summary"], "Up 12%");
        assert_eq!(data["tables"].as_array().unwrap().len(), MAX_STRUCTURED_TABLES);
        assert_eq!(data["financial_data"].as_array().unwrap().len(), MAX_STRUCTURED_FIGURES);
        assert_eq!(data["financial_data"][0]["kind"], "percentage");
    }

    #[test]
    fn test_assemble_structured_data_without_extras() {
        let structured = StructuredResponse {
            text: String::new(),
            data: Map::new(),
            follow_ups: vec![],
        };
        let data = assemble_structured_data(&structured, &ProcessedData::default());
        assert_eq!(data, serde_json::json!({}));
    }
}
