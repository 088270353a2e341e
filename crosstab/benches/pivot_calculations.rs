//! FILENAME: benches/pivot_calculations.rs
//! Build and query throughput for cross-tabs over synthetic sales data.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use crosstab::{AggregationSpec, AxisOrder, PivotConfig, PivotData, Record, RecordSource, Value};
use std::hint::black_box;

const REGIONS: [&str; 6] = ["North", "South", "East", "West", "Central", "Overseas"];
const PRODUCTS: [&str; 5] = ["Widget", "Gadget", "Gizmo", "Doohickey", "Sprocket"];
const QUARTERS: [&str; 4] = ["Q1", "Q2", "Q3", "Q4"];

fn sales(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::from_iter([
                ("Region", Value::from(REGIONS[i % REGIONS.len()])),
                ("Product", PRODUCTS[(i / 7) % PRODUCTS.len()].into()),
                ("Quarter", QUARTERS[(i / 3) % QUARTERS.len()].into()),
                ("Rep", format!("rep{}", i % 113).into()),
                ("Sales", Value::Number((i % 997) as f64 * 12.25)),
                ("Quantity", Value::Number((i % 41) as f64)),
            ])
        })
        .collect()
}

fn multi_aggregation_config() -> PivotConfig {
    PivotConfig::new()
        .rows(["Region", "Product"])
        .cols(["Quarter"])
        .aggregation(AggregationSpec::new("Sum").with_vals(["Sales"]))
        .aggregation(AggregationSpec::new("Average").with_vals(["Quantity"]))
        .aggregation(AggregationSpec::new("Sample Standard Deviation").with_vals(["Sales"]))
        .aggregation(AggregationSpec::new("Count Unique Values").with_vals(["Rep"]))
}

/// One-pass construction with growing inputs.
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for size in &[1_000, 10_000, 100_000] {
        let records = sales(*size);

        group.bench_with_input(BenchmarkId::new("count", size), &records, |b, records| {
            b.iter(|| {
                let config = PivotConfig::new().rows(["Region"]).cols(["Quarter"]);
                let pivot = PivotData::new(RecordSource::Records(records.clone()), config).unwrap();
                black_box(pivot.record_count());
            });
        });

        group.bench_with_input(
            BenchmarkId::new("multi_aggregation", size),
            &records,
            |b, records| {
                b.iter(|| {
                    let pivot = PivotData::new(
                        RecordSource::Records(records.clone()),
                        multi_aggregation_config(),
                    )
                    .unwrap();
                    black_box(pivot.record_count());
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("median", size), &records, |b, records| {
            b.iter(|| {
                let config = PivotConfig::new()
                    .rows(["Rep"])
                    .aggregator("Median", ["Sales"]);
                let pivot = PivotData::new(RecordSource::Records(records.clone()), config).unwrap();
                black_box(pivot.record_count());
            });
        });
    }

    group.finish();
}

/// First key read, where the one-time sort happens.
fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");
    let records = sales(50_000);

    for (name, order) in [
        ("key_a_to_z", AxisOrder::KeyAToZ),
        ("value_z_to_a", AxisOrder::ValueZToA),
    ] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let config = PivotConfig::new()
                        .rows(["Rep", "Region"])
                        .cols(["Quarter"])
                        .aggregator("Sum", ["Sales"])
                        .row_order(order);
                    PivotData::new(RecordSource::Records(records.clone()), config).unwrap()
                },
                |pivot| black_box(pivot.row_keys().len()),
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Reading every cell of a built cross-tab.
fn bench_query(c: &mut Criterion) {
    let pivot = PivotData::new(
        RecordSource::Records(sales(50_000)),
        multi_aggregation_config(),
    )
    .unwrap();
    pivot.sort_keys();

    c.bench_function("query/all_cells", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for row in pivot.row_keys() {
                for col in pivot.col_keys() {
                    total += pivot.get_aggregator(row, col, None).value().to_number();
                }
            }
            black_box(total);
        });
    });

    c.bench_function("query/formatted_margins", |b| {
        b.iter(|| {
            let rendered: Vec<String> = pivot
                .row_keys()
                .iter()
                .map(|row| pivot.get_aggregator(row, &[], Some("Sum")).formatted())
                .collect();
            black_box(rendered);
        });
    });
}

criterion_group!(benches, bench_build, bench_sort, bench_query);
criterion_main!(benches);
