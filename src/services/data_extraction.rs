//! Regex extraction of tables, figures, dates and entities from chunk text

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{
    ExtractedTable, FinancialFigure, FinancialKind, ProcessedData, QueryAnalysis, RetrievedChunk,
    TextSource,
};

/// Characters of surrounding text kept with each financial figure
const CONTEXT_RADIUS: usize = 50;

pub(crate) static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?(?:[ ]?(?:k|m|bn|million|billion)\b)?")
        .expect("static currency pattern")
});

pub(crate) static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?%").expect("static percent pattern"));

static DATE_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").expect("static date pattern"),
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("static date pattern"),
        Regex::new(
            r"(?i)\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2},\s*\d{4}\b",
        )
        .expect("static date pattern"),
    ]
});

static PERSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+[ \t]+[A-Z][a-z]+\b").expect("static name pattern"));

static COMPANY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+[ \t]+(?:Inc|Corp|LLC|Ltd)\b\.?").expect("static company pattern")
});

/// Find pipe- or tab-delimited tables. A block needs a header and at least two
/// data rows to count.
pub fn extract_tables(text: &str) -> Vec<ExtractedTable> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.contains('\t') || line.contains('|') {
            if is_separator_row(line) {
                continue;
            }
            let cells = split_row(line);
            if cells.len() > 1 {
                current.push(cells);
                continue;
            }
        }
        flush_table(&mut current, &mut tables);
    }
    flush_table(&mut current, &mut tables);

    tables
}

fn split_row(line: &str) -> Vec<String> {
    let mut cells: Vec<String> = line
        .split(['\t', '|'])
        .map(|c| c.trim().to_string())
        .collect();

    // Markdown pipes produce empty edge cells
    if cells.first().is_some_and(|c| c.is_empty()) {
        cells.remove(0);
    }
    if cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
    cells
}

fn is_separator_row(line: &str) -> bool {
    line.contains('-') && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

fn flush_table(current: &mut Vec<Vec<String>>, tables: &mut Vec<ExtractedTable>) {
    if current.len() > 2 {
        let mut rows = std::mem::take(current);
        let headers = rows.remove(0);
        tables.push(ExtractedTable {
            headers,
            row_count: rows.len(),
            rows,
        });
    }
    current.clear();
}

/// Currency amounts first, then percentages, each with surrounding context
pub fn extract_financial_data(text: &str) -> Vec<FinancialFigure> {
    let currency = CURRENCY_RE.find_iter(text).map(|m| FinancialFigure {
        kind: FinancialKind::Currency,
        value: m.as_str().to_string(),
        amount: parse_currency_amount(m.as_str()),
        context: context_window(text, m.start(), m.end()),
    });

    let percent = PERCENT_RE.find_iter(text).map(|m| FinancialFigure {
        kind: FinancialKind::Percentage,
        value: m.as_str().to_string(),
        amount: m.as_str().trim_end_matches('%').parse().ok(),
        context: context_window(text, m.start(), m.end()),
    });

    currency.chain(percent).collect()
}

/// Parse `$1,234.5`, `$3.2M` or `$12 billion` into a plain number
pub fn parse_currency_amount(raw: &str) -> Option<f64> {
    let lower = raw.trim().trim_start_matches('$').to_lowercase();
    let digits_end = lower
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
        .unwrap_or(lower.len());
    let (number, suffix) = lower.split_at(digits_end);

    let value: f64 = number.replace(',', "").parse().ok()?;
    let multiplier = match suffix.trim() {
        "" => 1.0,
        "k" => 1e3,
        "m" | "million" => 1e6,
        "bn" | "billion" => 1e9,
        _ => return None,
    };
    Some(value * multiplier)
}

fn context_window(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(CONTEXT_RADIUS);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + CONTEXT_RADIUS).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    text[from..to].split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn extract_dates(text: &str) -> Vec<String> {
    let mut dates = Vec::new();
    for re in DATE_RES.iter() {
        push_unique(&mut dates, re.find_iter(text).map(|m| m.as_str().to_string()));
    }
    dates
}

pub fn extract_entities(text: &str) -> Vec<String> {
    let mut entities = Vec::new();
    push_unique(
        &mut entities,
        PERSON_RE.find_iter(text).map(|m| m.as_str().to_string()),
    );
    push_unique(
        &mut entities,
        COMPANY_RE.find_iter(text).map(|m| m.as_str().to_string()),
    );
    entities
}

/// Append items not already present, keeping first-seen order
pub(crate) fn push_unique(into: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

/// Turn ranked chunks into prompt material
pub fn process_chunks(chunks: &[RetrievedChunk], analysis: &QueryAnalysis) -> ProcessedData {
    let mut data = ProcessedData::default();
    let structured = analysis.query_type.wants_structured_extraction();

    for chunk in chunks {
        data.text_content.push(TextSource {
            content: chunk.text.clone(),
            source: chunk.filename.clone(),
            relevance: chunk.score,
        });

        if structured {
            data.tables.extend(extract_tables(&chunk.text));
            data.financial_data.extend(extract_financial_data(&chunk.text));
        }

        push_unique(&mut data.dates, extract_dates(&chunk.text));
        push_unique(&mut data.entities, extract_entities(&chunk.text));
    }

    data
}
