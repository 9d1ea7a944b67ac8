//! Keyword classification of enterprise queries.
//!
//! Type and complexity come from fixed term lists checked in precedence order;
//! the first list with a whole-word hit wins.

use regex::Regex;
use std::sync::LazyLock;

use super::data_extraction::{push_unique, CURRENCY_RE, PERCENT_RE};
use crate::models::{QueryAnalysis, QueryComplexity, QueryType};

/// Fixed until a learned classifier replaces the term lists
const CLASSIFIER_CONFIDENCE: f64 = 0.8;

const FINANCIAL_TERMS: &[&str] = &[
    "revenue",
    "profit",
    "loss",
    "balance",
    "cash flow",
    "budget",
    "expenses",
    "income",
    "roi",
    "margin",
    "financial",
    "accounting",
    "p&l",
    "balance sheet",
    "assets",
    "liabilities",
    "equity",
];

const COMPLIANCE_TERMS: &[&str] = &[
    "compliance",
    "regulation",
    "regulatory",
    "audit",
    "gdpr",
    "sox",
    "hipaa",
    "policy",
    "violation",
];

const STRATEGIC_TERMS: &[&str] = &[
    "strategy",
    "strategic",
    "acquisition",
    "merger",
    "roadmap",
    "long-term",
    "board",
    "expansion",
];

const ANALYTICAL_TERMS: &[&str] = &[
    "compare",
    "trend",
    "analysis",
    "correlation",
    "performance",
    "vs",
    "versus",
    "change",
    "growth",
    "decline",
    "forecast",
];

const OPERATIONAL_TERMS: &[&str] = &[
    "operations",
    "operational",
    "inventory",
    "supply chain",
    "headcount",
    "logistics",
    "staffing",
    "process",
];

fn term_pattern(terms: &[&str]) -> Regex {
    let alternation = terms
        .iter()
        .map(|t| regex::escape(t).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("static term pattern")
}

/// Term lists in precedence order with the classification each implies
static RULES: LazyLock<Vec<(Regex, QueryType, QueryComplexity)>> = LazyLock::new(|| {
    vec![
        (term_pattern(FINANCIAL_TERMS), QueryType::Financial, QueryComplexity::High),
        (term_pattern(COMPLIANCE_TERMS), QueryType::Compliance, QueryComplexity::High),
        (term_pattern(STRATEGIC_TERMS), QueryType::Strategic, QueryComplexity::Critical),
        (term_pattern(ANALYTICAL_TERMS), QueryType::Analytical, QueryComplexity::Medium),
        (term_pattern(OPERATIONAL_TERMS), QueryType::Operational, QueryComplexity::Medium),
    ]
});

static DATE_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(
            r"\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\b",
        )
        .expect("static month pattern"),
        Regex::new(r"\b(?:q[1-4]|quarter)\b").expect("static quarter pattern"),
        Regex::new(r"\b\d{4}\b").expect("static year pattern"),
        Regex::new(r"\b(?:last|this|next)\s+(?:month|quarter|year)\b")
            .expect("static relative date pattern"),
    ]
});

static ENTITY_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"\b[A-Z][a-z]+[ \t]+[A-Z][a-z]+\b").expect("static name pattern"),
        Regex::new(r"\b[A-Z]{2,}\b").expect("static acronym pattern"),
    ]
});

static COMPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:above|below|over|under|greater than|less than)\s+\$?\d[\d,]*(?:\.\d+)?%?")
        .expect("static comparator pattern")
});

/// Classify a free-text query
pub fn classify_query(query: &str) -> QueryAnalysis {
    let lower = query.to_lowercase();

    let mut date_mentions = Vec::new();
    for re in DATE_PATTERNS.iter() {
        push_unique(
            &mut date_mentions,
            re.find_iter(&lower).map(|m| m.as_str().to_string()),
        );
    }

    let (query_type, complexity) = RULES
        .iter()
        .find(|(re, _, _)| re.is_match(query))
        .map(|(_, t, c)| (*t, *c))
        .unwrap_or_else(|| {
            if date_mentions.is_empty() {
                (QueryType::Simple, QueryComplexity::Low)
            } else {
                (QueryType::Simple, QueryComplexity::Medium)
            }
        });

    let mut entities = Vec::new();
    for re in ENTITY_PATTERNS.iter() {
        push_unique(
            &mut entities,
            re.find_iter(query).map(|m| m.as_str().to_string()),
        );
    }

    let mut numerical_filters = Vec::new();
    push_unique(
        &mut numerical_filters,
        CURRENCY_RE.find_iter(query).map(|m| m.as_str().to_string()),
    );
    push_unique(
        &mut numerical_filters,
        PERCENT_RE.find_iter(query).map(|m| m.as_str().to_string()),
    );
    push_unique(
        &mut numerical_filters,
        COMPARATOR_RE.find_iter(query).map(|m| m.as_str().to_string()),
    );

    QueryAnalysis {
        query_type,
        complexity,
        entities,
        date_mentions,
        numerical_filters,
        confidence: CLASSIFIER_CONFIDENCE,
        requires_approval: complexity == QueryComplexity::Critical,
        estimated_processing_time_ms: complexity.estimated_processing_time_ms(),
    }
}

/// Document categories that earn a ranking boost for a query type
pub fn preferred_categories(query_type: QueryType) -> &'static [&'static str] {
    match query_type {
        QueryType::Financial => &["financial", "accounting", "budget"],
        QueryType::Compliance => &["compliance", "legal"],
        QueryType::Operational => &["operations", "hr", "it"],
        QueryType::Strategic => &["strategy", "sales", "marketing"],
        QueryType::Simple | QueryType::Analytical => &[],
    }
}
