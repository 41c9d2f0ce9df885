//! Benchmarks for filter lowering and statement generation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use watchdog_query::{
    Dialect, FilterExpression, IntoFilter, RowData, SelectOptions, Value, filter, row, sql,
};

// ============================================================================
// Filter lowering
// ============================================================================

fn bench_lowering(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_lowering");

    group.bench_function("shorthand_equality", |b| {
        b.iter(|| black_box(filter! { "code" => "161725" }.into_filter()))
    });

    group.bench_function("shorthand_mixed", |b| {
        b.iter(|| {
            black_box(
                filter! {
                    "code" => ("IN", vec!["161725", "501018", "160632"]),
                    "date" => ("BETWEEN", "2024-01-01", "2024-12-31"),
                    "premium" => (">", 0.05),
                    "OR" => [filter! { "status" => "open" }, filter! { "status" => "limited" }],
                }
                .into_filter(),
            )
        })
    });

    group.bench_function("json_document", |b| {
        let json = serde_json::json!({
            "code": ["IN", ["161725", "501018"]],
            "volume": [">=", 1000],
            "OR": [{"status": "open"}, {"status": "limited"}],
        });
        b.iter(|| black_box(watchdog_query::FilterMap::from_json(&json)))
    });

    group.finish();
}

// ============================================================================
// SQL generation
// ============================================================================

fn bench_where(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_where");

    for width in [1usize, 10, 100] {
        let filter = FilterExpression::and(
            (0..width).map(|i| FilterExpression::eq(format!("col_{i}"), i as i64)),
        );
        group.throughput(Throughput::Elements(width as u64));
        for dialect in [Dialect::MySql, Dialect::Postgres] {
            group.bench_with_input(
                BenchmarkId::new(format!("{dialect:?}"), width),
                &filter,
                |b, f| b.iter(|| black_box(sql::compile_where(dialect, Some(f)))),
            );
        }
    }

    group.finish();
}

fn bench_statements(c: &mut Criterion) {
    let mut group = c.benchmark_group("statements");

    let filter = FilterExpression::and([
        FilterExpression::eq("code", "161725"),
        FilterExpression::gte("date", "2024-01-01"),
    ]);
    let options = SelectOptions::new().desc("date").limit(30);

    group.bench_function("select", |b| {
        b.iter(|| {
            black_box(sql::select(
                Dialect::MySql,
                "price",
                &["code", "date", "price"],
                Some(&filter),
                &options,
            ))
        })
    });

    let rows: Vec<RowData> = (0..500)
        .map(|i| {
            row! {
                "code" => "161725",
                "date" => format!("2024-01-{:02}", i % 28 + 1),
                "price" => Value::Float(1.0 + i as f64 / 1000.0),
            }
        })
        .collect();

    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("insert_many_500", |b| {
        b.iter(|| black_box(sql::insert_many(Dialect::MySql, "price", &rows)))
    });
    group.bench_function("upsert_many_500", |b| {
        b.iter(|| {
            black_box(sql::upsert_many(
                Dialect::MySql,
                "price",
                &rows,
                &["code", "date"],
                &[],
            ))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_lowering, bench_where, bench_statements);
criterion_main!(benches);
