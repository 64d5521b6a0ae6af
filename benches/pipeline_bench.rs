//! Criterion benchmarks for hot paths in the sweepd analysis pipeline.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - Line parsing + normalization
//!   - O(N²) duplicate detection (Jaccard over token sets)
//!   - Heuristic fallback analysis end to end
//!   - Analysis result serialization (serde_json)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sweepd::braindump::{dedup, heuristics, lines};
use sweepd::config::AnalysisConfig;

/// A realistic mixed dump, cycled out to the requested line count.
fn braindump_lines(n: usize) -> Vec<String> {
    let samples = [
        "fix the login redirect bug",
        "buy milk",
        "email the vendor about the renewal",
        "plan the Q3 roadmap with the team",
        "deploy the staging server",
        "waiting on design review for the launch page",
        "read the distributed systems paper",
        "update the billing dashboard error message",
    ];
    (0..n)
        .map(|i| format!("{} #{}", samples[i % samples.len()], i))
        .collect()
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

fn bench_parse_and_normalize(c: &mut Criterion) {
    let raw = braindump_lines(100).join("\n");

    c.bench_function("parse_lines_100", |b| {
        b.iter(|| {
            let parsed = lines::parse_lines(black_box(&raw));
            black_box(parsed);
        });
    });

    c.bench_function("normalize_line", |b| {
        b.iter(|| {
            let n = lines::normalize_line(black_box("  Fix the Login Redirect BUG!!  "));
            black_box(n);
        });
    });
}

// ─── Duplicate detection ─────────────────────────────────────────────────────
//
// Pairwise Jaccard over token sets; quadratic in the line count, which is why
// analysis caps the number of lines.

fn bench_duplicate_detection(c: &mut Criterion) {
    let small = braindump_lines(20);
    let large = braindump_lines(200);

    c.bench_function("detect_duplicates_20", |b| {
        b.iter(|| {
            let pairs = dedup::detect_duplicates(black_box(&small), 0.75);
            black_box(pairs);
        });
    });

    c.bench_function("detect_duplicates_200", |b| {
        b.iter(|| {
            let pairs = dedup::detect_duplicates(black_box(&large), 0.75);
            black_box(pairs);
        });
    });
}

// ─── Heuristic analysis ──────────────────────────────────────────────────────

fn bench_fallback_analysis(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let input = braindump_lines(50);

    c.bench_function("fallback_analysis_50", |b| {
        b.iter(|| {
            let result = heuristics::fallback_analysis(black_box(&input), &config);
            black_box(result);
        });
    });
}

fn bench_result_serialization(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let result = heuristics::fallback_analysis(&braindump_lines(50), &config);

    c.bench_function("serialize_analysis_50", |b| {
        b.iter(|| {
            let s = serde_json::to_string(black_box(&result)).unwrap();
            black_box(s);
        });
    });
}

// ─── Entry point ─────────────────────────────────────────────────────────────

criterion_group!(
    benches,
    bench_parse_and_normalize,
    bench_duplicate_detection,
    bench_fallback_analysis,
    bench_result_serialization
);
criterion_main!(benches);
