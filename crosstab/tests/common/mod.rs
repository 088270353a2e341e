//! FILENAME: tests/common/mod.rs
//! Fixtures and assertion helpers for crosstab integration tests.

#![allow(dead_code)]

use crosstab::{CompositeKey, Record, RecordSource, Value};

// ============================================================================
// FIXTURES
// ============================================================================

/// Small people table, header row first.
pub struct PeopleFixture;

impl PeopleFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["name", "gender", "colour", "birthday", "trials", "successes"]
    }

    pub fn data() -> Vec<(&'static str, &'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("Nick", "male", "blue", "1982-11-07", 103.0, 12.0),
            ("Jane", "female", "red", "1982-11-08", 95.0, 25.0),
            ("John", "male", "blue", "1982-12-08", 112.0, 30.0),
            ("Carol", "female", "yellow", "1983-12-08", 102.0, 14.0),
        ]
    }

    /// The table as header + rows.
    pub fn rows() -> RecordSource {
        let header: Vec<Value> = Self::headers().into_iter().map(Value::from).collect();
        let mut rows = vec![header];
        for (name, gender, colour, birthday, trials, successes) in Self::data() {
            rows.push(vec![
                name.into(),
                gender.into(),
                colour.into(),
                birthday.into(),
                trials.into(),
                successes.into(),
            ]);
        }
        RecordSource::Rows(rows)
    }

    /// The same table as keyed records.
    pub fn records() -> RecordSource {
        let records = Self::data()
            .into_iter()
            .map(|(name, gender, colour, birthday, trials, successes)| {
                Record::from_iter([
                    ("name", Value::from(name)),
                    ("gender", gender.into()),
                    ("colour", colour.into()),
                    ("birthday", birthday.into()),
                    ("trials", trials.into()),
                    ("successes", successes.into()),
                ])
            })
            .collect();
        RecordSource::Records(records)
    }
}

pub struct SalesFixture;

impl SalesFixture {
    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
            ("East", "Gadget", "Q2", 8500.0, 85.0),
        ]
    }

    pub fn records() -> RecordSource {
        RecordSource::Records(
            Self::data()
                .into_iter()
                .map(|(region, product, quarter, sales, quantity)| {
                    Record::from_iter([
                        ("Region", Value::from(region)),
                        ("Product", product.into()),
                        ("Quarter", quarter.into()),
                        ("Sales", sales.into()),
                        ("Quantity", quantity.into()),
                    ])
                })
                .collect(),
        )
    }

    /// `n` synthetic records cycling through a handful of regions/products.
    pub fn large(n: usize) -> RecordSource {
        let regions = ["North", "South", "East", "West"];
        let products = ["Widget", "Gadget", "Gizmo"];
        RecordSource::Records(
            (0..n)
                .map(|i| {
                    Record::from_iter([
                        ("Region", Value::from(regions[i % regions.len()])),
                        ("Product", products[i % products.len()].into()),
                        ("Sales", Value::Number((i % 97) as f64 * 10.5)),
                    ])
                })
                .collect(),
        )
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

pub fn key(parts: &[&str]) -> CompositeKey {
    parts.iter().map(|p| Value::from(*p)).collect()
}

/// Renders keys as their display strings for compact comparisons.
pub fn render_keys(keys: &[CompositeKey]) -> Vec<Vec<String>> {
    keys.iter()
        .map(|k| k.iter().map(|v| v.to_string()).collect())
        .collect()
}

pub fn assert_number(value: Value, expected: f64) {
    match value {
        Value::Number(n) => assert!(
            (n - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            n
        ),
        other => panic!("expected number {}, got {:?}", expected, other),
    }
}
