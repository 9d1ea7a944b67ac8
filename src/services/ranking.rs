use std::collections::HashSet;

use super::query_classifier::preferred_categories;
use crate::models::{QueryAnalysis, RetrievedChunk};

const CATEGORY_BOOST: f64 = 0.1;
const KEYWORD_WEIGHT: f64 = 0.1;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "which", "who", "whom", "how", "why",
    "when", "where", "our", "this", "that", "these", "those", "with", "from", "into", "about",
    "did", "does", "have", "has", "had", "can", "could", "should", "would", "will", "show",
    "give", "tell", "list", "all", "any", "you", "your", "its", "their", "there", "been", "per",
];

/// Lower-cased content words of three or more characters, in order, deduplicated
pub fn query_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !(c.is_alphanumeric() || c == '&'))
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// Fraction of `keywords` that occur in `text`
pub fn keyword_coverage(keywords: &[String], text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
    hits as f64 / keywords.len() as f64
}

/// Re-rank vector search candidates.
///
/// `score = similarity + category boost + keyword coverage`, sorted descending,
/// with repeated chunk texts dropped and the list cut to `limit`.
pub fn rerank(
    candidates: Vec<RetrievedChunk>,
    analysis: &QueryAnalysis,
    query: &str,
    limit: usize,
) -> Vec<RetrievedChunk> {
    let preferred = preferred_categories(analysis.query_type);
    let keywords = query_keywords(query);

    let mut scored: Vec<RetrievedChunk> = candidates
        .into_iter()
        .map(|mut chunk| {
            let boost = match chunk.category.as_deref() {
                Some(cat) if preferred.contains(&cat) => CATEGORY_BOOST,
                _ => 0.0,
            };
            chunk.score = chunk.similarity
                + boost
                + KEYWORD_WEIGHT * keyword_coverage(&keywords, &chunk.text);
            chunk
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut seen = HashSet::new();
    scored
        .into_iter()
        .filter(|c| seen.insert(c.text.trim().to_string()))
        .take(limit)
        .collect()
}

/// Jaccard similarity of the keyword sets of two texts
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<String> = query_keywords(a).into_iter().collect();
    let right: HashSet<String> = query_keywords(b).into_iter().collect();
    if left.is_empty() && right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classify_query;
    use uuid::Uuid;

    fn candidate(text: &str, category: Option<&str>, similarity: f64) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            chunk_index: 0,
            text: text.to_string(),
            filename: "doc.txt".to_string(),
            category: category.map(str::to_string),
            fiscal_period: None,
            similarity,
            score: similarity,
        }
    }

    #[test]
    fn test_query_keywords_drops_stopwords_and_short_words() {
        let words = query_keywords("What was our Q3 revenue and the P&L?");
        assert_eq!(words, vec!["revenue", "p&l"]);
    }

    #[test]
    fn test_keyword_coverage() {
        let keywords = vec!["revenue".to_string(), "margin".to_string()];
        assert_eq!(keyword_coverage(&keywords, "Revenue grew"), 0.5);
        assert_eq!(keyword_coverage(&[], "anything"), 0.0);
    }

    #[test]
    fn test_preferred_category_outranks_slightly_higher_similarity() {
        let query = "What was total revenue?";
        let analysis = classify_query(query);
        let ranked = rerank(
            vec![
                candidate("Team offsite notes", Some("hr"), 0.80),
                candidate("Ledger extract", Some("financial"), 0.75),
            ],
            &analysis,
            query,
            10,
        );
        assert_eq!(ranked[0].category.as_deref(), Some("financial"));
        assert!((ranked[0].score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_rerank_dedupes_and_truncates() {
        let query = "Summarize onboarding";
        let analysis = classify_query(query);
        let ranked = rerank(
            vec![
                candidate("same text", None, 0.9),
                candidate("  same text ", None, 0.8),
                candidate("other text", None, 0.7),
                candidate("third text", None, 0.65),
            ],
            &analysis,
            query,
            2,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "same text");
        assert_eq!(ranked[1].text, "other text");
    }

    #[test]
    fn test_jaccard_similarity() {
        assert_eq!(jaccard_similarity("revenue growth", "revenue growth"), 1.0);
        assert_eq!(jaccard_similarity("revenue growth", "headcount plan"), 0.0);
        let partial = jaccard_similarity("quarterly revenue growth", "revenue growth forecast");
        assert!((partial - 0.5).abs() < 1e-9);
        assert_eq!(jaccard_similarity("the", "and"), 0.0);
    }
}
