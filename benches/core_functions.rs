use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use enterprise_brain::models::ProcessedData;
use enterprise_brain::services::{
    build_context, classify_query, extract_entities, extract_financial_data, extract_tables,
    jaccard_similarity, TextSplitter,
};

const QUERIES: &[&str] = &[
    "What was our Q3 2024 revenue and profit margin?",
    "Compare headcount growth versus last year",
    "Are we compliant with GDPR retention policy?",
    "Who owns the Berlin office lease?",
];

fn report(paragraphs: usize) -> String {
    let paragraph = "Revenue for Q3 reached $4.2M, up 12% on the prior quarter. \
                     Jane Smith approved the budget on October 15, 2024.\n\
                     | Region | Sales | Margin |\n\
                     |---|---|---|\n\
                     | North | $1,200,000 | 18% |\n\
                     | South | $950,000 | 14% |\n\
                     Acme Corp renewed for three years.\n\n";
    paragraph.repeat(paragraphs)
}

// ---- query_classifier ----

fn bench_classify_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_query");
    for (i, query) in QUERIES.iter().enumerate() {
        group.bench_with_input(BenchmarkId::from_parameter(i), query, |b, q| {
            b.iter(|| classify_query(black_box(q)))
        });
    }
    group.finish();
}

fn bench_jaccard_similarity(c: &mut Criterion) {
    c.bench_function("jaccard_similarity", |b| {
        b.iter(|| jaccard_similarity(black_box(QUERIES[0]), black_box(QUERIES[1])))
    });
}

// ---- data_extraction ----

fn bench_extract_tables(c: &mut Criterion) {
    let text = report(20);
    c.bench_function("extract_tables", |b| b.iter(|| extract_tables(black_box(&text))));
}

fn bench_extract_financial_data(c: &mut Criterion) {
    let text = report(20);
    c.bench_function("extract_financial_data", |b| {
        b.iter(|| extract_financial_data(black_box(&text)))
    });
}

fn bench_extract_entities(c: &mut Criterion) {
    let text = report(20);
    c.bench_function("extract_entities", |b| {
        b.iter(|| extract_entities(black_box(&text)))
    });
}

// ---- text_processing ----

fn bench_text_splitter(c: &mut Criterion) {
    let splitter = TextSplitter::new(2000, 400);
    let mut group = c.benchmark_group("text_splitter");
    for paragraphs in [10usize, 100, 500].iter() {
        let text = report(*paragraphs);
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &text, |b, text| {
            b.iter(|| splitter.split(black_box(text)))
        });
    }
    group.finish();
}

// ---- context_builder ----

fn bench_build_context(c: &mut Criterion) {
    let text = report(5);
    let data = ProcessedData {
        tables: extract_tables(&text),
        financial_data: extract_financial_data(&text),
        entities: extract_entities(&text),
        ..Default::default()
    };
    c.bench_function("build_context", |b| {
        b.iter(|| build_context(black_box(&data), black_box(12_000)))
    });
}

criterion_group!(
    benches,
    bench_classify_query,
    bench_jaccard_similarity,
    bench_extract_tables,
    bench_extract_financial_data,
    bench_extract_entities,
    bench_text_splitter,
    bench_build_context,
);
criterion_main!(benches);
