use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{collections::HashMap, str::FromStr};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{QueryComplexity, QueryType};

pub const PRIORITIES: &[&str] = &["low", "normal", "high", "urgent"];

fn validate_priority(priority: &str) -> Result<(), ValidationError> {
    if PRIORITIES.contains(&priority) {
        Ok(())
    } else {
        let mut err = ValidationError::new("priority");
        err.message = Some("Priority must be one of low, normal, high, urgent".into());
        Err(err)
    }
}

/// Natural-language question submitted by an enterprise user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EnterpriseQueryRequest {
    #[validate(length(min = 5, max = 2000, message = "Query must be 5-2000 characters"))]
    pub query: String,
    pub department_id: Option<i32>,
    #[validate(length(max = 2000, message = "Context must be at most 2000 characters"))]
    pub context: Option<String>,
    #[validate(custom(function = "validate_priority"))]
    pub priority: Option<String>,
}

impl EnterpriseQueryRequest {
    pub fn priority(&self) -> &str {
        self.priority.as_deref().unwrap_or("normal")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnterpriseQueryResponse {
    pub query_id: i32,
    pub response: String,
    pub structured_data: serde_json::Value,
    pub query_type: QueryType,
    pub complexity: QueryComplexity,
    pub documents_used: usize,
    pub confidence_score: f64,
    pub processing_time_ms: i64,
    pub requires_approval: bool,
    pub suggested_follow_ups: Vec<String>,
}

/// Persisted query with analysis metadata
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnterpriseQueryRecord {
    pub id: i32,
    pub enterprise_id: i32,
    pub user_id: i32,
    pub department_id: Option<i32>,
    pub original_query: String,
    pub query_type: String,
    pub complexity: String,
    pub priority: String,
    pub user_context: Option<String>,
    pub ai_response: Option<String>,
    pub structured_data: serde_json::Value,
    pub documents_used: Vec<Uuid>,
    pub confidence_score: Option<f64>,
    pub processing_time_ms: Option<i64>,
    pub entities: serde_json::Value,
    pub tokens_used: Option<i32>,
    pub llm_model: Option<String>,
    pub used_fallback: bool,
    pub was_helpful: Option<bool>,
    pub satisfaction_score: Option<i32>,
    pub feedback_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Everything needed to insert a query row
#[derive(Debug, Clone)]
pub struct NewQueryRecord {
    pub enterprise_id: i32,
    pub user_id: i32,
    pub department_id: Option<i32>,
    pub original_query: String,
    pub query_type: QueryType,
    pub complexity: QueryComplexity,
    pub priority: String,
    pub user_context: Option<String>,
    pub ai_response: String,
    pub structured_data: serde_json::Value,
    pub documents_used: Vec<Uuid>,
    pub confidence_score: f64,
    pub processing_time_ms: i64,
    pub entities: Vec<String>,
    pub tokens_used: Option<i32>,
    pub llm_model: Option<String>,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QueryHistoryItem {
    pub id: i32,
    pub original_query: String,
    pub query_type: String,
    pub complexity: String,
    pub department_id: Option<i32>,
    pub response_preview: Option<String>,
    pub confidence_score: Option<f64>,
    pub processing_time_ms: Option<i64>,
    pub satisfaction_score: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub query_type: Option<String>,
    pub complexity: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl HistoryQuery {
    /// Parse the optional filters, rejecting unknown values
    pub fn filters(&self) -> Result<(Option<QueryType>, Option<QueryComplexity>), String> {
        let query_type = self
            .query_type
            .as_deref()
            .map(QueryType::from_str)
            .transpose()?;
        let complexity = self
            .complexity
            .as_deref()
            .map(QueryComplexity::from_str)
            .transpose()?;
        Ok((query_type, complexity))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct QueryFeedbackRequest {
    pub was_helpful: Option<bool>,
    #[validate(range(min = 1, max = 5, message = "Satisfaction score must be 1-5"))]
    pub satisfaction_score: Option<i32>,
    #[validate(length(max = 1000, message = "Feedback must be at most 1000 characters"))]
    pub feedback_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryStats {
    pub period_days: i32,
    pub total_queries: i64,
    pub by_type: HashMap<String, i64>,
    pub avg_processing_time_ms: f64,
    pub avg_satisfaction: Option<f64>,
    pub feedback_count: i64,
}

#[derive(Debug, Serialize)]
pub struct SimilarQuery {
    pub id: i32,
    pub original_query: String,
    pub similarity: f64,
    pub confidence_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Markdown,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "md",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
            Self::Markdown => "text/markdown",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "markdown",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!(
                "Unsupported export format '{}'. Use json, csv or markdown",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryExport {
    pub export_id: i32,
    pub query_id: i32,
    pub format: ExportFormat,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub content: String,
}
