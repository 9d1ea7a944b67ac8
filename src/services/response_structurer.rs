use serde_json::{Map, Value};

use crate::models::{QueryAnalysis, QueryType, StructuredResponse};

/// Emoji that open a section in either template
const SECTION_MARKERS: &[&str] = &["📊", "📈", "🔍", "⚠", "🎯", "💰", "🚨"];

const EXECUTIVE_SECTIONS: &[(&str, &str)] = &[
    ("executive_summary", "📊 EXECUTIVE SUMMARY"),
    ("analysis", "📈 DETAILED ANALYSIS"),
    ("sources", "🔍 DATA SOURCES"),
    ("limitations", "⚠️ LIMITATIONS"),
    ("recommendations", "🎯 RECOMMENDED ACTIONS"),
];

const FINANCIAL_SECTIONS: &[(&str, &str)] = &[
    ("financial_summary", "💰 FINANCIAL SUMMARY"),
    ("breakdown", "📊 DETAILED BREAKDOWN"),
    ("trends", "📈 TRENDS & INSIGHTS"),
    ("attention_items", "🚨 ATTENTION ITEMS"),
];

const FINANCIAL_FOLLOW_UPS: [&str; 3] = [
    "Show me the trend for this metric over the last 3 quarters",
    "How does this compare to industry benchmarks?",
    "What are the main drivers behind these numbers?",
];

const GENERAL_FOLLOW_UPS: [&str; 3] = [
    "Can you provide more details on this analysis?",
    "What additional data would help clarify this?",
    "Are there any related metrics I should consider?",
];

/// Text following `header` (and an optional colon) up to the first blank line,
/// the next section marker, or the end of the text.
pub fn extract_section(text: &str, header: &str) -> Option<String> {
    let (start, matched) = match text.find(header) {
        Some(idx) => (idx, header.len()),
        None => {
            // Models often drop the emoji variation selector
            let bare = header.replace('\u{FE0F}', "");
            (text.find(&bare)?, bare.len())
        }
    };

    let rest = text[start + matched..]
        .trim_start_matches(['*', ':'])
        .trim_start();

    if SECTION_MARKERS.iter().any(|m| rest.starts_with(m)) {
        return None;
    }

    let mut end = rest.find("\n\n").unwrap_or(rest.len());
    for marker in SECTION_MARKERS {
        if let Some(pos) = rest.find(marker) {
            end = end.min(pos);
        }
    }

    let section = rest[..end].trim();
    if section.is_empty() {
        None
    } else {
        Some(section.to_string())
    }
}

fn sections_for(query_type: QueryType) -> &'static [(&'static str, &'static str)] {
    match query_type {
        QueryType::Financial => FINANCIAL_SECTIONS,
        _ => EXECUTIVE_SECTIONS,
    }
}

pub fn follow_ups(query_type: QueryType) -> Vec<String> {
    let list = match query_type {
        QueryType::Financial => FINANCIAL_FOLLOW_UPS,
        _ => GENERAL_FOLLOW_UPS,
    };
    list.iter().map(|s| s.to_string()).collect()
}

/// Split the LLM answer into the sections of the template that produced it
pub fn structure_response(text: &str, analysis: &QueryAnalysis) -> StructuredResponse {
    let mut data = Map::new();
    for (key, header) in sections_for(analysis.query_type) {
        if let Some(section) = extract_section(text, header) {
            data.insert((*key).to_string(), Value::String(section));
        }
    }

    if data.is_empty() {
        if let Some(first) = text.split("\n\n").map(str::trim).find(|p| !p.is_empty()) {
            data.insert("summary".to_string(), Value::String(first.to_string()));
        }
    }

    StructuredResponse {
        text: text.to_string(),
        data,
        follow_ups: follow_ups(analysis.query_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classify_query;

    const EXECUTIVE_ANSWER: &str = "📊 EXECUTIVE SUMMARY:\nHeadcount grew 8% year over year.\n\n\
📈 DETAILED ANALYSIS:\nEngineering added 40 roles.\n\
🔍 DATA SOURCES:\nhr_report.pdf\n\n\
⚠️ LIMITATIONS:\n\n\
🎯 RECOMMENDED ACTIONS:\nReview hiring plan.";

    #[test]
    fn test_extract_section_stops_at_blank_line() {
        assert_eq!(
            extract_section(EXECUTIVE_ANSWER, "📊 EXECUTIVE SUMMARY").as_deref(),
            Some("Headcount grew 8% year over year.")
        );
    }

    #[test]
    fn test_extract_section_stops_at_next_marker() {
        assert_eq!(
            extract_section(EXECUTIVE_ANSWER, "📈 DETAILED ANALYSIS").as_deref(),
            Some("Engineering added 40 roles.")
        );
    }

    #[test]
    fn test_extract_section_runs_to_end_of_text() {
        assert_eq!(
            extract_section(EXECUTIVE_ANSWER, "🎯 RECOMMENDED ACTIONS").as_deref(),
            Some("Review hiring plan.")
        );
    }

    #[test]
    fn test_extract_section_stops_at_inline_marker() {
        let text = "📊 EXECUTIVE SUMMARY: Revenue rose 8%. 📈 DETAILED ANALYSIS: Driven by EMEA.";
        assert_eq!(
            extract_section(text, "📊 EXECUTIVE SUMMARY").as_deref(),
            Some("Revenue rose 8%.")
        );
        assert_eq!(
            extract_section(text, "📈 DETAILED ANALYSIS").as_deref(),
            Some("Driven by EMEA.")
        );
    }

    #[test]
    fn test_extract_section_empty_or_missing() {
        // The limitations header is followed directly by a blank line
        assert_eq!(extract_section(EXECUTIVE_ANSWER, "⚠️ LIMITATIONS"), None);
        assert_eq!(extract_section(EXECUTIVE_ANSWER, "💰 FINANCIAL SUMMARY"), None);
    }

    #[test]
    fn test_extract_section_tolerates_markdown_and_missing_selector() {
        let text = "**⚠ LIMITATIONS:** Only Q3 data was available.";
        assert_eq!(
            extract_section(text, "⚠️ LIMITATIONS").as_deref(),
            Some("Only Q3 data was available.")
        );
    }

    #[test]
    fn test_structure_executive_response() {
        let analysis = classify_query("How many engineers joined?");
        let structured = structure_response(EXECUTIVE_ANSWER, &analysis);
        assert_eq!(structured.data.len(), 4);
        assert!(structured.data.contains_key("executive_summary"));
        assert!(structured.data.contains_key("sources"));
        assert!(!structured.data.contains_key("limitations"));
        assert_eq!(structured.follow_ups[0], "Can you provide more details on this analysis?");
    }

    #[test]
    fn test_structure_financial_response() {
        let answer = "💰 FINANCIAL SUMMARY:\nRevenue was $4.2M.\n\n🚨 ATTENTION ITEMS:\nMargins fell.";
        let analysis = classify_query("What was revenue?");
        let structured = structure_response(answer, &analysis);
        assert_eq!(structured.data["financial_summary"], "Revenue was $4.2M.");
        assert_eq!(structured.data["attention_items"], "Margins fell.");
        assert_eq!(structured.follow_ups.len(), 3);
        assert!(structured.follow_ups[0].contains("last 3 quarters"));
    }

    #[test]
    fn test_unstructured_answer_falls_back_to_summary() {
        let analysis = classify_query("Who leads sales?");
        let structured = structure_response("\n\nJane Smith leads sales.\n\nMore text.", &analysis);
        assert_eq!(structured.data.len(), 1);
        assert_eq!(structured.data["summary"], "Jane Smith leads sales.");
    }
}
