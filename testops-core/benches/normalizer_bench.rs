//! Legacy step normalizer benchmarks
//!
//! Measures decoding of marked `{action, expected}` bodies and splitting of
//! step text into text and attachment entries.
//!
//! Run with: cargo bench --bench normalizer_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use testops_core::normalizer::{normalize_text, parse_legacy_body};

const STRICT_BODY: &str =
    r#"expected {"action":"Open the login form\nType credentials","expected":"Form is shown"}"#;

/// Unescaped quote in the action forces the regex fallback.
const LOOSE_BODY: &str =
    r#"expected {"action":"Click "Sign in" button","expected":"Dashboard is shown"#;

fn step_text(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            if i % 5 == 4 {
                format!("![shot](/api/rs/testcase/attachment/{}/content)", 1000 + i)
            } else {
                format!("Line {} of the step description", i)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_parse_legacy_body(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_legacy_body");
    group.bench_function("strict", |b| b.iter(|| parse_legacy_body(black_box(STRICT_BODY))));
    group.bench_function("loose", |b| b.iter(|| parse_legacy_body(black_box(LOOSE_BODY))));
    group.bench_function("plain", |b| {
        b.iter(|| parse_legacy_body(black_box("Open the login form")))
    });
    group.finish();
}

fn bench_normalize_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_text");
    for lines in [5, 50, 500] {
        let text = step_text(lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &text, |b, text| {
            b.iter(|| normalize_text(black_box(text)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse_legacy_body, bench_normalize_text);
criterion_main!(benches);
