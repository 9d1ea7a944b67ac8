//! Layered prompt context assembled under a character budget

use crate::models::ProcessedData;

const MAX_TEXT_SOURCES: usize = 10;
const MAX_TABLES: usize = 3;
const MAX_FINANCIAL_ITEMS: usize = 10;
const MAX_DATES: usize = 10;
const MAX_ENTITIES: usize = 10;

/// Accumulates newline-joined parts without exceeding the budget
struct ContextWriter {
    parts: Vec<String>,
    used: usize,
    budget: usize,
}

impl ContextWriter {
    fn new(budget: usize) -> Self {
        Self {
            parts: Vec::new(),
            used: 0,
            budget,
        }
    }

    fn cost(&self, part: &str) -> usize {
        part.chars().count() + usize::from(!self.parts.is_empty())
    }

    fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.used)
    }

    fn fits(&self, part: &str) -> bool {
        self.cost(part) <= self.remaining()
    }

    fn push(&mut self, part: String) {
        self.used += self.cost(&part);
        self.parts.push(part);
    }

    fn try_push(&mut self, part: String) -> bool {
        if self.fits(&part) {
            self.push(part);
            true
        } else {
            false
        }
    }

    /// Emit `header` only once an item of the layer fits beside it
    fn push_layer(&mut self, header: &str, items: impl IntoIterator<Item = String>) {
        let mut header_written = false;
        for item in items {
            if header_written {
                self.try_push(item);
                continue;
            }
            // header plus its joiner plus the item with its joiner
            let needed = self.cost(header) + item.chars().count() + 1;
            if needed <= self.remaining() {
                self.push(header.to_string());
                self.push(item);
                header_written = true;
            }
        }
    }

    fn finish(self) -> String {
        self.parts.join("\n")
    }
}

fn format_table_headers(headers: &[String]) -> String {
    format!("[{}]", headers.join(", "))
}

/// Build the prompt context in priority order: source text, tables, financial
/// figures, dates, entities.
pub fn build_context(data: &ProcessedData, budget_chars: usize) -> String {
    let mut writer = ContextWriter::new(budget_chars);

    for (i, source) in data.text_content.iter().take(MAX_TEXT_SOURCES).enumerate() {
        let part = format!("Source: {}\n{}\n", source.source, source.content);
        if !writer.try_push(part.clone()) && i == 0 {
            let truncated: String = part.chars().take(writer.remaining()).collect();
            writer.push(truncated);
        }
    }

    writer.push_layer(
        "\nTABLES FOUND:",
        data.tables.iter().take(MAX_TABLES).enumerate().map(|(i, t)| {
            format!(
                "Table {}: {} ({} rows)",
                i + 1,
                format_table_headers(&t.headers),
                t.row_count
            )
        }),
    );

    writer.push_layer(
        "\nFINANCIAL DATA:",
        data.financial_data
            .iter()
            .take(MAX_FINANCIAL_ITEMS)
            .map(|f| format!("{}: {}", f.kind.as_str(), f.value)),
    );

    writer.push_layer(
        "\nKEY DATES:",
        data.dates.iter().take(MAX_DATES).map(|d| format!("- {}", d)),
    );

    writer.push_layer(
        "\nENTITIES:",
        data.entities.iter().take(MAX_ENTITIES).map(|e| format!("- {}", e)),
    );

    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedTable, FinancialFigure, FinancialKind, TextSource};

    fn source(name: &str, content: &str) -> TextSource {
        TextSource {
            content: content.to_string(),
            source: name.to_string(),
            relevance: 0.9,
        }
    }

    fn sample() -> ProcessedData {
        ProcessedData {
            text_content: vec![
                source("q3_report.pdf", "Revenue was $4.2M."),
                source("budget.csv", "Marketing budget 12%."),
            ],
            tables: vec![ExtractedTable {
                headers: vec!["Quarter".into(), "Revenue".into()],
                rows: vec![vec!["Q1".into(), "1".into()], vec!["Q2".into(), "2".into()]],
                row_count: 2,
            }],
            financial_data: vec![FinancialFigure {
                kind: FinancialKind::Currency,
                value: "$4.2M".into(),
                amount: Some(4_200_000.0),
                context: "Revenue was $4.2M.".into(),
            }],
            dates: vec!["2024-09-30".into()],
            entities: vec!["Jane Smith".into()],
        }
    }

    #[test]
    fn test_all_layers_within_generous_budget() {
        let context = build_context(&sample(), 10_000);
        assert!(context.starts_with("Source: q3_report.pdf\nRevenue was $4.2M.\n"));
        assert!(context.contains("Source: budget.csv"));
        assert!(context.contains("TABLES FOUND:\nTable 1: [Quarter, Revenue] (2 rows)"));
        assert!(context.contains("FINANCIAL DATA:\ncurrency: $4.2M"));
        assert!(context.contains("KEY DATES:\n- 2024-09-30"));
        assert!(context.contains("ENTITIES:\n- Jane Smith"));
    }

    #[test]
    fn test_output_never_exceeds_budget() {
        for budget in [0, 10, 40, 60, 90, 120, 200] {
            let context = build_context(&sample(), budget);
            assert!(
                context.chars().count() <= budget,
                "budget {} produced {} chars",
                budget,
                context.chars().count()
            );
        }
    }

    #[test]
    fn test_first_source_truncated_when_too_large() {
        let data = ProcessedData {
            text_content: vec![source("big.txt", &"x".repeat(500))],
            ..Default::default()
        };
        let context = build_context(&data, 50);
        assert_eq!(context.chars().count(), 50);
        assert!(context.starts_with("Source: big.txt"));
    }

    #[test]
    fn test_layer_header_omitted_when_no_item_fits() {
        let data = sample();
        let sources_only =
            "Source: q3_report.pdf\nRevenue was $4.2M.\n\nSource: budget.csv\nMarketing budget 12%.\n";
        let budget = sources_only.chars().count() + 5;
        let context = build_context(&data, budget);
        assert!(!context.contains("TABLES FOUND:"));
        assert!(context.contains("Source: budget.csv"));
    }

    #[test]
    fn test_caps_text_sources_at_ten() {
        let data = ProcessedData {
            text_content: (0..15).map(|i| source(&format!("doc{}.txt", i), "body")).collect(),
            ..Default::default()
        };
        let context = build_context(&data, 100_000);
        assert!(context.contains("doc9.txt"));
        assert!(!context.contains("doc10.txt"));
    }

    #[test]
    fn test_empty_data_yields_empty_context() {
        assert_eq!(build_context(&ProcessedData::default(), 1000), "");
    }
}
