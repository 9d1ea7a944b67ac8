use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::models::{
    bytes_to_mb, percentage, round2, AnalyticsDashboard, AnalyticsPeriod, AnalyticsReport, CategoryUsage,
    DailyCount, DocumentUsageReport, DocumentUsageSummary, EngagementMetrics, EngagementReport,
    ExecutiveSummary, InsightSeverity, PerformanceMetrics, QueryInsight, QueryTrends, QueryVolume,
    RecentUpload, SatisfactionPoint, TrendGranularity, TrendPoint, TypeTrendPoint, UserEngagement,
};
use crate::utils::clamp_days;

const HIGH_VOLUME_QUERIES: i64 = 100;
const LOW_SATISFACTION: f64 = 3.0;
const MIN_RATINGS: i64 = 5;
const SLOW_PROCESSING_MS: f64 = 10_000.0;
const LOW_SUCCESS_RATE: f64 = 80.0;
const MIN_DOCUMENTS: i64 = 5;
const FINANCIAL_HEAVY_SHARE: f64 = 0.5;

/// Inputs the insight rules look at
#[derive(Debug, Clone, Default)]
pub struct InsightInputs {
    pub total_queries: i64,
    pub financial_queries: i64,
    pub avg_satisfaction: Option<f64>,
    pub rated_queries: i64,
    pub avg_processing_time_ms: f64,
    /// Documents uploaded in the period
    pub new_documents: i64,
    pub completed_documents: i64,
}

impl InsightInputs {
    fn from_dashboard(dashboard: &AnalyticsDashboard) -> Self {
        Self {
            total_queries: dashboard.query_volume.total_queries,
            financial_queries: dashboard.query_types.get("financial").copied().unwrap_or(0),
            avg_satisfaction: dashboard.performance.avg_satisfaction,
            rated_queries: dashboard.performance.rated_queries,
            avg_processing_time_ms: dashboard.performance.avg_processing_time_ms,
            new_documents: dashboard.document_usage.new_documents,
            completed_documents: dashboard.document_usage.completed_documents,
        }
    }
}

/// Usage analytics scoped to one enterprise
pub struct AnalyticsService {
    db: PgPool,
}

impl AnalyticsService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn dashboard(&self, enterprise_id: i32, days: Option<i64>) -> Result<AnalyticsDashboard> {
        let period = period(days);
        let cutoff = period.start;

        let daily: Vec<(NaiveDate, i64)> = sqlx::query_as(
            r#"
            SELECT DATE(created_at) AS day, COUNT(*)
            FROM enterprise_queries
            WHERE enterprise_id = $1 AND created_at >= $2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(enterprise_id)
        .bind(cutoff)
        .fetch_all(&self.db)
        .await?;

        let daily_breakdown: Vec<DailyCount> = daily
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect();
        let total_queries: i64 = daily_breakdown.iter().map(|d| d.count).sum();

        let query_types = self.type_distribution(enterprise_id, cutoff).await?;

        let (avg_ms, avg_confidence, avg_satisfaction, rated): (f64, f64, Option<f64>, i64) =
            sqlx::query_as(
                r#"
                SELECT COALESCE(AVG(processing_time_ms), 0)::float8,
                       COALESCE(AVG(confidence_score), 0)::float8,
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

        let (active_users, repeat_users): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE n > 1)
            FROM (
                SELECT user_id, COUNT(*) AS n
                FROM enterprise_queries
                WHERE enterprise_id = $1 AND created_at >= $2
                GROUP BY user_id
            ) AS per_user
            "#,
        )
        .bind(enterprise_id)
        .bind(cutoff)
        .fetch_one(&self.db)
        .await?;

        let total_documents: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE enterprise_id = $1")
                .bind(enterprise_id)
                .fetch_one(&self.db)
                .await?;
        let (completed_documents, new_documents) =
            self.processing_counts(enterprise_id, cutoff).await?;

        let mut dashboard = AnalyticsDashboard {
            period,
            query_volume: QueryVolume {
                total_queries,
                average_daily: average_per_active_day(&daily_breakdown),
                daily_breakdown,
            },
            query_types,
            performance: PerformanceMetrics {
                avg_processing_time_ms: round2(avg_ms),
                avg_confidence: round2(avg_confidence),
                avg_satisfaction: avg_satisfaction.map(round2),
                rated_queries: rated,
            },
            engagement: EngagementMetrics {
                active_users,
                repeat_users,
                retention_rate: percentage(repeat_users, active_users),
            },
            document_usage: DocumentUsageSummary {
                total_documents,
                new_documents,
                growth_rate: growth_rate(new_documents, total_documents),
                completed_documents,
                processing_success_rate: percentage(completed_documents, new_documents),
            },
            insights: Vec::new(),
            generated_at: Utc::now(),
        };
        dashboard.insights = generate_insights(&InsightInputs::from_dashboard(&dashboard));

        Ok(dashboard)
    }

    async fn type_distribution(
        &self,
        enterprise_id: i32,
        cutoff: DateTime<Utc>,
    ) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
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

        Ok(rows.into_iter().collect())
    }

    pub async fn trends(
        &self,
        enterprise_id: i32,
        days: Option<i64>,
        granularity: TrendGranularity,
    ) -> Result<QueryTrends> {
        let period = period(days);
        let unit = granularity.as_sql_unit();

        let rows: Vec<(DateTime<Utc>, i64, f64, f64)> = sqlx::query_as(
            r#"
            SELECT DATE_TRUNC($3::text, created_at) AS bucket,
                   COUNT(*),
                   COALESCE(AVG(processing_time_ms), 0)::float8,
                   COALESCE(AVG(confidence_score), 0)::float8
            FROM enterprise_queries
            WHERE enterprise_id = $1 AND created_at >= $2
            GROUP BY bucket
            ORDER BY bucket
            "#,
        )
        .bind(enterprise_id)
        .bind(period.start)
        .bind(unit)
        .fetch_all(&self.db)
        .await?;

        let by_type: Vec<(DateTime<Utc>, String, i64)> = sqlx::query_as(
            r#"
            SELECT DATE_TRUNC($3::text, created_at) AS bucket, query_type, COUNT(*)
            FROM enterprise_queries
            WHERE enterprise_id = $1 AND created_at >= $2
            GROUP BY bucket, query_type
            ORDER BY bucket, query_type
            "#,
        )
        .bind(enterprise_id)
        .bind(period.start)
        .bind(unit)
        .fetch_all(&self.db)
        .await?;

        Ok(QueryTrends {
            granularity,
            period,
            points: rows
                .into_iter()
                .map(|(period, query_count, avg_ms, avg_confidence)| TrendPoint {
                    period,
                    query_count,
                    avg_processing_time_ms: round2(avg_ms),
                    avg_confidence: round2(avg_confidence),
                })
                .collect(),
            by_type: by_type
                .into_iter()
                .map(|(period, query_type, query_count)| TypeTrendPoint {
                    period,
                    query_type,
                    query_count,
                })
                .collect(),
        })
    }

    pub async fn user_engagement(
        &self,
        enterprise_id: i32,
        days: Option<i64>,
        limit: Option<i64>,
    ) -> Result<EngagementReport> {
        let period = period(days);
        let limit = limit.unwrap_or(10).clamp(1, 100);

        let users: Vec<(i32, i64, Option<f64>, i64)> = sqlx::query_as(
            r#"
            SELECT user_id,
                   COUNT(*),
                   AVG(satisfaction_score)::float8,
                   COUNT(DISTINCT DATE(created_at))
            FROM enterprise_queries
            WHERE enterprise_id = $1 AND created_at >= $2
            GROUP BY user_id
            ORDER BY 2 DESC, user_id
            LIMIT $3
            "#,
        )
        .bind(enterprise_id)
        .bind(period.start)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let complexity: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT complexity, COUNT(*)
            FROM enterprise_queries
            WHERE enterprise_id = $1 AND created_at >= $2
            GROUP BY complexity
            "#,
        )
        .bind(enterprise_id)
        .bind(period.start)
        .fetch_all(&self.db)
        .await?;

        let satisfaction: Vec<(NaiveDate, f64, i64)> = sqlx::query_as(
            r#"
            SELECT DATE(created_at) AS day,
                   AVG(satisfaction_score)::float8,
                   COUNT(*)
            FROM enterprise_queries
            WHERE enterprise_id = $1 AND created_at >= $2 AND satisfaction_score IS NOT NULL
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(enterprise_id)
        .bind(period.start)
        .fetch_all(&self.db)
        .await?;

        let days = period.days as i64;
        Ok(EngagementReport {
            top_users: users
                .into_iter()
                .map(|(user_id, query_count, avg_satisfaction, active_days)| UserEngagement {
                    user_id,
                    query_count,
                    avg_satisfaction: avg_satisfaction.map(round2),
                    active_days,
                    engagement_score: engagement_score(query_count, active_days, days),
                })
                .collect(),
            complexity_distribution: complexity.into_iter().collect(),
            satisfaction_trend: satisfaction
                .into_iter()
                .map(|(date, avg, ratings)| SatisfactionPoint {
                    date,
                    avg_satisfaction: round2(avg),
                    ratings,
                })
                .collect(),
            period,
        })
    }

    pub async fn document_usage(&self, enterprise_id: i32, days: Option<i64>) -> Result<DocumentUsageReport> {
        let period = period(days);

        let categories: Vec<(String, i64, i64, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT COALESCE(category, 'uncategorized'),
                   COUNT(*),
                   COALESCE(SUM(file_size), 0)::bigint,
                   AVG(processing_time_seconds)::float8
            FROM documents
            WHERE enterprise_id = $1 AND created_at >= $2
            GROUP BY 1
            ORDER BY 2 DESC, 1
            "#,
        )
        .bind(enterprise_id)
        .bind(period.start)
        .fetch_all(&self.db)
        .await?;

        let recent_uploads = sqlx::query_as::<_, RecentUpload>(
            r#"
            SELECT id, original_filename, category, processing_status, created_at
            FROM documents
            WHERE enterprise_id = $1
            ORDER BY created_at DESC
            LIMIT 10
            "#,
        )
        .bind(enterprise_id)
        .fetch_all(&self.db)
        .await?;

        let (completed, total) = self.processing_counts(enterprise_id, period.start).await?;

        Ok(DocumentUsageReport {
            period,
            by_category: categories
                .into_iter()
                .map(|(category, document_count, bytes, avg_seconds)| CategoryUsage {
                    category,
                    document_count,
                    total_size_mb: bytes_to_mb(bytes),
                    avg_processing_seconds: avg_seconds.map(round2),
                })
                .collect(),
            recent_uploads,
            processing_success_rate: percentage(completed, total),
        })
    }

    /// `(completed, uploaded)` counts for documents uploaded since `since`
    async fn processing_counts(
        &self,
        enterprise_id: i32,
        since: DateTime<Utc>,
    ) -> Result<(i64, i64)> {
        let counts = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE processing_status = 'completed'), COUNT(*)
            FROM documents
            WHERE enterprise_id = $1 AND created_at >= $2
            "#,
        )
        .bind(enterprise_id)
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        Ok(counts)
    }

    pub async fn insights(&self, enterprise_id: i32, days: Option<i64>) -> Result<Vec<QueryInsight>> {
        Ok(self.dashboard(enterprise_id, days).await?.insights)
    }

    pub async fn report(
        &self,
        enterprise_id: i32,
        report_type: &str,
        days: Option<i64>,
        include_recommendations: bool,
    ) -> Result<AnalyticsReport> {
        let dashboard = self.dashboard(enterprise_id, days).await?;
        let executive_summary = summarize(&dashboard);
        let recommendations = if include_recommendations {
            dashboard
                .insights
                .iter()
                .map(|i| i.recommendation.clone())
                .collect()
        } else {
            Vec::new()
        };

        Ok(AnalyticsReport {
            report_type: report_type.to_string(),
            format: "json".to_string(),
            period: dashboard.period.clone(),
            executive_summary,
            recommendations,
            detailed_metrics: Some(dashboard),
            generated_at: Utc::now(),
        })
    }
}

fn period(days: Option<i64>) -> AnalyticsPeriod {
    let days = clamp_days(days);
    let end = Utc::now();
    AnalyticsPeriod {
        days: days as i32,
        start: end - Duration::days(days),
        end,
    }
}

/// Share of the whole document base uploaded during the period
pub fn growth_rate(new: i64, total: i64) -> f64 {
    percentage(new, total)
}

pub fn average_per_active_day(daily: &[DailyCount]) -> f64 {
    if daily.is_empty() {
        return 0.0;
    }
    let total: i64 = daily.iter().map(|d| d.count).sum();
    round2(total as f64 / daily.len() as f64)
}

/// `count × (active_days / days) × 100`
pub fn engagement_score(query_count: i64, active_days: i64, days: i64) -> f64 {
    if days <= 0 {
        return 0.0;
    }
    round2(query_count as f64 * (active_days as f64 / days as f64) * 100.0)
}

fn insight(
    title: &str,
    description: String,
    severity: InsightSeverity,
    category: &str,
    recommendation: &str,
) -> QueryInsight {
    QueryInsight {
        title: title.to_string(),
        description,
        severity,
        category: category.to_string(),
        recommendation: recommendation.to_string(),
    }
}

/// Rule-based observations about usage, quality and content health
pub fn generate_insights(inputs: &InsightInputs) -> Vec<QueryInsight> {
    let mut insights = Vec::new();

    if inputs.total_queries > HIGH_VOLUME_QUERIES {
        insights.push(insight(
            "High query volume",
            format!("{} queries were asked in this period.", inputs.total_queries),
            InsightSeverity::Info,
            "usage",
            "Consider onboarding more teams to share the knowledge base.",
        ));
    }

    if let Some(avg) = inputs.avg_satisfaction {
        if avg < LOW_SATISFACTION && inputs.rated_queries >= MIN_RATINGS {
            insights.push(insight(
                "Low user satisfaction",
                format!(
                    "Average satisfaction is {:.1}/5 across {} rated answers.",
                    avg, inputs.rated_queries
                ),
                InsightSeverity::Warning,
                "quality",
                "Review low-rated answers and upload the documents they were missing.",
            ));
        }
    }

    if inputs.avg_processing_time_ms > SLOW_PROCESSING_MS {
        insights.push(insight(
            "Slow query processing",
            format!(
                "Queries take {:.0} ms on average.",
                inputs.avg_processing_time_ms
            ),
            InsightSeverity::Warning,
            "performance",
            "Narrow questions to a department or reduce the retrieval depth.",
        ));
    }

    if inputs.new_documents >= MIN_DOCUMENTS {
        let rate = percentage(inputs.completed_documents, inputs.new_documents);
        if rate < LOW_SUCCESS_RATE {
            insights.push(insight(
                "Document processing failures",
                format!(
                    "Only {:.2}% of {} new documents were processed.",
                    rate, inputs.new_documents
                ),
                InsightSeverity::Critical,
                "documents",
                "Check failed documents and re-upload them in a supported format.",
            ));
        }
    }

    if inputs.total_queries > 0
        && inputs.financial_queries as f64 / inputs.total_queries as f64 > FINANCIAL_HEAVY_SHARE
    {
        insights.push(insight(
            "Financial focus",
            format!(
                "{} of {} queries were financial.",
                inputs.financial_queries, inputs.total_queries
            ),
            InsightSeverity::Info,
            "usage",
            "Keep financial statements current and tag them with fiscal periods.",
        ));
    }

    insights
}

/// Headline numbers plus insights split into highlights and concerns
pub fn summarize(dashboard: &AnalyticsDashboard) -> ExecutiveSummary {
    let mut key_metrics = HashMap::new();
    key_metrics.insert(
        "total_queries".to_string(),
        json!(dashboard.query_volume.total_queries),
    );
    key_metrics.insert(
        "avg_processing_time_ms".to_string(),
        json!(dashboard.performance.avg_processing_time_ms),
    );
    key_metrics.insert(
        "avg_satisfaction".to_string(),
        json!(dashboard.performance.avg_satisfaction),
    );
    key_metrics.insert(
        "active_users".to_string(),
        json!(dashboard.engagement.active_users),
    );
    key_metrics.insert(
        "total_documents".to_string(),
        json!(dashboard.document_usage.total_documents),
    );

    let mut highlights = Vec::new();
    let mut concerns = Vec::new();

    if dashboard.query_volume.total_queries > 0 {
        highlights.push(format!(
            "{} questions answered for {} users",
            dashboard.query_volume.total_queries, dashboard.engagement.active_users
        ));
    }
    if dashboard.document_usage.new_documents > 0 {
        highlights.push(format!(
            "{} new documents added",
            dashboard.document_usage.new_documents
        ));
    }

    for item in &dashboard.insights {
        match item.severity {
            InsightSeverity::Info => highlights.push(item.title.clone()),
            InsightSeverity::Warning | InsightSeverity::Critical => concerns.push(item.title.clone()),
        }
    }

    ExecutiveSummary {
        key_metrics,
        highlights,
        concerns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32, count: i64) -> DailyCount {
        DailyCount {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            count,
        }
    }

    #[test]
    fn test_percentage_and_growth() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(growth_rate(5, 15), 33.33);
        assert_eq!(growth_rate(4, 4), 100.0);
        assert_eq!(growth_rate(0, 0), 0.0);
    }

    #[test]
    fn test_average_per_active_day() {
        assert_eq!(average_per_active_day(&[]), 0.0);
        assert_eq!(average_per_active_day(&[day(1, 3), day(4, 4)]), 3.5);
    }

    #[test]
    fn test_engagement_score() {
        assert_eq!(engagement_score(10, 3, 30), 100.0);
        assert_eq!(engagement_score(4, 1, 7), 57.14);
        assert_eq!(engagement_score(4, 1, 0), 0.0);
    }

    #[test]
    fn test_quiet_period_has_no_insights() {
        assert!(generate_insights(&InsightInputs::default()).is_empty());
    }

    #[test]
    fn test_all_rules_fire() {
        let insights = generate_insights(&InsightInputs {
            total_queries: 150,
            financial_queries: 90,
            avg_satisfaction: Some(2.4),
            rated_queries: 12,
            avg_processing_time_ms: 12_500.0,
            new_documents: 10,
            completed_documents: 6,
        });
        let titles: Vec<&str> = insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "High query volume",
                "Low user satisfaction",
                "Slow query processing",
                "Document processing failures",
                "Financial focus",
            ]
        );
        assert_eq!(insights[3].severity, InsightSeverity::Critical);
    }

    #[test]
    fn test_processing_insight_counts_period_uploads() {
        let healthy = generate_insights(&InsightInputs {
            new_documents: 5,
            completed_documents: 4,
            ..Default::default()
        });
        assert!(healthy.is_empty());

        let failing = generate_insights(&InsightInputs {
            new_documents: 5,
            completed_documents: 3,
            ..Default::default()
        });
        assert_eq!(failing[0].title, "Document processing failures");
        assert!(failing[0].description.contains("60.00% of 5 new documents"));
    }

    #[test]
    fn test_rules_respect_minimum_samples() {
        let insights = generate_insights(&InsightInputs {
            total_queries: 10,
            financial_queries: 5,
            avg_satisfaction: Some(1.0),
            rated_queries: 4,
            avg_processing_time_ms: 900.0,
            new_documents: 4,
            completed_documents: 0,
        });
        assert!(insights.is_empty());
    }

    #[test]
    fn test_summarize_splits_highlights_and_concerns() {
        let now = Utc::now();
        let mut dashboard = AnalyticsDashboard {
            period: AnalyticsPeriod {
                days: 30,
                start: now - Duration::days(30),
                end: now,
            },
            query_volume: QueryVolume {
                total_queries: 12,
                average_daily: 2.0,
                daily_breakdown: vec![],
            },
            query_types: HashMap::new(),
            performance: PerformanceMetrics {
                avg_processing_time_ms: 15_000.0,
                avg_confidence: 0.8,
                avg_satisfaction: None,
                rated_queries: 0,
            },
            engagement: EngagementMetrics {
                active_users: 3,
                repeat_users: 1,
                retention_rate: 33.33,
            },
            document_usage: DocumentUsageSummary {
                total_documents: 2,
                new_documents: 2,
                growth_rate: 100.0,
                completed_documents: 2,
                processing_success_rate: 100.0,
            },
            insights: vec![],
            generated_at: now,
        };
        dashboard.insights = generate_insights(&InsightInputs::from_dashboard(&dashboard));

        let summary = summarize(&dashboard);
        assert_eq!(summary.key_metrics["total_queries"], json!(12));
        assert_eq!(summary.highlights[0], "12 questions answered for 3 users");
        assert_eq!(summary.highlights[1], "2 new documents added");
        assert_eq!(summary.concerns, vec!["Slow query processing"]);
    }
}
