use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsPeriod {
    pub days: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryVolume {
    pub total_queries: i64,
    /// Mean over days that saw at least one query
    pub average_daily: f64,
    pub daily_breakdown: Vec<DailyCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub avg_processing_time_ms: f64,
    pub avg_confidence: f64,
    pub avg_satisfaction: Option<f64>,
    pub rated_queries: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementMetrics {
    pub active_users: i64,
    pub repeat_users: i64,
    pub retention_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentUsageSummary {
    pub total_documents: i64,
    pub new_documents: i64,
    pub growth_rate: f64,
    /// Uploads in the period whose processing completed
    pub completed_documents: i64,
    pub processing_success_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSeverity {
    Info,
    Warning,
    Critical,
}

/// Rule-derived observation about platform usage
#[derive(Debug, Clone, Serialize)]
pub struct QueryInsight {
    pub title: String,
    pub description: String,
    pub severity: InsightSeverity,
    pub category: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsDashboard {
    pub period: AnalyticsPeriod,
    pub query_volume: QueryVolume,
    pub query_types: HashMap<String, i64>,
    pub performance: PerformanceMetrics,
    pub engagement: EngagementMetrics,
    pub document_usage: DocumentUsageSummary,
    pub insights: Vec<QueryInsight>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrendGranularity {
    Hour,
    #[default]
    Day,
    Week,
}

impl TrendGranularity {
    /// Unit name understood by Postgres `DATE_TRUNC`
    pub fn as_sql_unit(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

/// `?days=` window shared by the analytics endpoints
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    pub days: Option<i64>,
    pub granularity: Option<TrendGranularity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub period: DateTime<Utc>,
    pub query_count: i64,
    pub avg_processing_time_ms: f64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeTrendPoint {
    pub period: DateTime<Utc>,
    pub query_type: String,
    pub query_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryTrends {
    pub granularity: TrendGranularity,
    pub period: AnalyticsPeriod,
    pub points: Vec<TrendPoint>,
    pub by_type: Vec<TypeTrendPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserEngagement {
    pub user_id: i32,
    pub query_count: i64,
    pub avg_satisfaction: Option<f64>,
    pub active_days: i64,
    pub engagement_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SatisfactionPoint {
    pub date: NaiveDate,
    pub avg_satisfaction: f64,
    pub ratings: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementReport {
    pub period: AnalyticsPeriod,
    pub top_users: Vec<UserEngagement>,
    pub complexity_distribution: HashMap<String, i64>,
    pub satisfaction_trend: Vec<SatisfactionPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryUsage {
    pub category: String,
    pub document_count: i64,
    pub total_size_mb: f64,
    pub avg_processing_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RecentUpload {
    pub id: uuid::Uuid,
    pub original_filename: String,
    pub category: Option<String>,
    pub processing_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentUsageReport {
    pub period: AnalyticsPeriod,
    pub by_category: Vec<CategoryUsage>,
    pub recent_uploads: Vec<RecentUpload>,
    pub processing_success_rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub report_type: Option<String>,
    pub format: Option<String>,
    pub period_days: Option<i64>,
    pub include_recommendations: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutiveSummary {
    pub key_metrics: HashMap<String, serde_json::Value>,
    pub highlights: Vec<String>,
    pub concerns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub report_type: String,
    pub format: String,
    pub period: AnalyticsPeriod,
    pub executive_summary: ExecutiveSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_metrics: Option<AnalyticsDashboard>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_sql_units() {
        assert_eq!(TrendGranularity::Hour.as_sql_unit(), "hour");
        assert_eq!(TrendGranularity::default().as_sql_unit(), "day");
        assert_eq!(TrendGranularity::Week.as_sql_unit(), "week");
    }

    #[test]
    fn test_granularity_deserializes_lowercase() {
        let g: TrendGranularity = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(g, TrendGranularity::Week);
        assert!(serde_json::from_str::<TrendGranularity>("\"month\"").is_err());
    }
}
