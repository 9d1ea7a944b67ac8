//! Types flowing through the query analysis pipeline
//!
//! classification -> retrieval -> extraction -> context -> LLM -> structuring

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Broad intent of an enterprise query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Simple,
    Analytical,
    Financial,
    Operational,
    Compliance,
    Strategic,
}

impl QueryType {
    pub const ALL: [QueryType; 6] = [
        Self::Simple,
        Self::Analytical,
        Self::Financial,
        Self::Operational,
        Self::Compliance,
        Self::Strategic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Analytical => "analytical",
            Self::Financial => "financial",
            Self::Operational => "operational",
            Self::Compliance => "compliance",
            Self::Strategic => "strategic",
        }
    }

    /// Tables and figures are only worth extracting for number-heavy queries
    pub fn wants_structured_extraction(&self) -> bool {
        matches!(self, Self::Financial | Self::Analytical)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown query type: {}", s))
    }
}

/// Complexity tier, ordered from cheapest to most expensive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryComplexity {
    Low,
    Medium,
    High,
    Critical,
}

impl QueryComplexity {
    pub const ALL: [QueryComplexity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn estimated_processing_time_ms(&self) -> u64 {
        match self {
            Self::Low => 2_000,
            Self::Medium => 5_000,
            Self::High => 15_000,
            Self::Critical => 30_000,
        }
    }
}

impl fmt::Display for QueryComplexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown complexity: {}", s))
    }
}

/// Output of the keyword classifier
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnalysis {
    pub query_type: QueryType,
    pub complexity: QueryComplexity,
    pub entities: Vec<String>,
    pub date_mentions: Vec<String>,
    pub numerical_filters: Vec<String>,
    pub confidence: f64,
    pub requires_approval: bool,
    pub estimated_processing_time_ms: u64,
}

/// A chunk returned by vector search, before re-ranking
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub filename: String,
    pub category: Option<String>,
    pub fiscal_period: Option<String>,
    pub similarity: f64,
    /// Score after re-ranking; equals `similarity` until re-ranked
    pub score: f64,
}

/// Retrieved text carried into the prompt
#[derive(Debug, Clone, Serialize)]
pub struct TextSource {
    pub content: String,
    pub source: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinancialKind {
    Currency,
    Percentage,
}

impl FinancialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Percentage => "percentage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialFigure {
    pub kind: FinancialKind,
    pub value: String,
    pub amount: Option<f64>,
    pub context: String,
}

/// Heuristically extracted material from retrieved chunks
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessedData {
    pub text_content: Vec<TextSource>,
    pub tables: Vec<ExtractedTable>,
    pub financial_data: Vec<FinancialFigure>,
    pub dates: Vec<String>,
    pub entities: Vec<String>,
}

/// Answer text split into named sections plus follow-up suggestions
#[derive(Debug, Clone, Serialize)]
pub struct StructuredResponse {
    pub text: String,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub follow_ups: Vec<String>,
}
