//! FILENAME: crosstab/src/engine.rs
//! Pivot Engine - builds the cross-tab and answers queries against it.
//!
//! Algorithm (one streaming pass over the source):
//! 1. Adapt each record and apply derived attributes
//! 2. Drop records excluded by the value filter
//! 3. Build the row and column keys (missing attributes read as "null")
//! 4. Push into the grand total, the row margin, the column margin and the
//!    row x column cell, creating buckets on first sight
//!
//! Keys are kept in discovery order until first read, then sorted once.

use std::cmp::Ordering;
use std::fmt;

use indexmap::IndexMap;
use log::{debug, trace};
use once_cell::sync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::aggregator::{
    Aggregator, AggregatorFactory, FractionScope, MarginSource, EMPTY_AGGREGATOR,
};
use crate::cell::AggregationCell;
use crate::definition::{
    normalize_aggregations, Aggregation, AggregationIndex, PivotConfig, ValueFilter,
};
use crate::error::{PivotError, Result};
use crate::record::{Record, RecordSource};
use crate::sort::{compare_keys, get_sort, natural_sort, AxisOrder, Comparator, SortDirection};
use crate::value::Value;

/// Ordered attribute values identifying a row or column group.
pub type CompositeKey = SmallVec<[Value; 4]>;

/// Separator used when flattening keys for bucket lookup.
const KEY_SEPARATOR: char = '\0';

fn flatten_key(key: &[Value]) -> String {
    let mut flat = String::new();
    for (i, part) in key.iter().enumerate() {
        if i > 0 {
            flat.push(KEY_SEPARATOR);
        }
        flat.push_str(&part.to_string());
    }
    flat
}

// ============================================================================
// CROSS-TAB TABLES
// ============================================================================

/// The aggregation buckets filled during construction.
#[derive(Debug)]
struct CrossTab {
    tree: FxHashMap<String, FxHashMap<String, AggregationCell>>,
    row_totals: FxHashMap<String, AggregationCell>,
    col_totals: FxHashMap<String, AggregationCell>,
    all_total: AggregationCell,
    /// Discovery order.
    row_keys: Vec<CompositeKey>,
    col_keys: Vec<CompositeKey>,
    record_count: usize,
}

impl CrossTab {
    fn new(factories: &[AggregatorFactory]) -> Self {
        CrossTab {
            tree: FxHashMap::default(),
            row_totals: FxHashMap::default(),
            col_totals: FxHashMap::default(),
            all_total: AggregationCell::new(factories),
            row_keys: Vec::new(),
            col_keys: Vec::new(),
            record_count: 0,
        }
    }

    fn process_record(
        &mut self,
        record: &Record,
        rows: &[String],
        cols: &[String],
        factories: &[AggregatorFactory],
    ) {
        let row_key: CompositeKey = rows.iter().map(|attr| record.key_value(attr)).collect();
        let col_key: CompositeKey = cols.iter().map(|attr| record.key_value(attr)).collect();
        let flat_row = flatten_key(&row_key);
        let flat_col = flatten_key(&col_key);

        self.record_count += 1;
        self.all_total.push(record);

        if !row_key.is_empty() {
            let cell = self.row_totals.entry(flat_row.clone()).or_insert_with(|| {
                self.row_keys.push(row_key.clone());
                AggregationCell::new(factories)
            });
            cell.push(record);
        }

        if !col_key.is_empty() {
            let cell = self.col_totals.entry(flat_col.clone()).or_insert_with(|| {
                self.col_keys.push(col_key.clone());
                AggregationCell::new(factories)
            });
            cell.push(record);
        }

        if !row_key.is_empty() && !col_key.is_empty() {
            self.tree
                .entry(flat_row)
                .or_default()
                .entry(flat_col)
                .or_insert_with(|| AggregationCell::new(factories))
                .push(record);
        }
    }

    /// Picks the bucket by which keys are empty: grand total, column margin,
    /// row margin, or the inner cell.
    fn cell(&self, row_key: &[Value], col_key: &[Value]) -> Option<&AggregationCell> {
        match (row_key.is_empty(), col_key.is_empty()) {
            (true, true) => Some(&self.all_total),
            (true, false) => self.col_totals.get(&flatten_key(col_key)),
            (false, true) => self.row_totals.get(&flatten_key(row_key)),
            (false, false) => self
                .tree
                .get(&flatten_key(row_key))
                .and_then(|cols| cols.get(&flatten_key(col_key))),
        }
    }
}

fn passes_filter(filter: &ValueFilter, record: &Record) -> bool {
    filter.iter().all(|(attr, excluded)| {
        excluded.is_empty() || !excluded.contains(&record.key_value(attr).to_string())
    })
}

// ============================================================================
// PIVOT DATA
// ============================================================================

/// Whether the one-time key sort has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortState {
    Unsorted,
    Sorted,
}

#[derive(Debug)]
struct SortedKeys {
    rows: Vec<CompositeKey>,
    cols: Vec<CompositeKey>,
}

/// A computed cross-tab. Built in one pass by `new`, read-only afterwards.
#[derive(Debug)]
pub struct PivotData {
    config: PivotConfig,
    source: RecordSource,
    aggregations: Vec<Aggregation>,
    index: AggregationIndex,
    tables: CrossTab,
    sorted: OnceCell<SortedKeys>,
}

impl PivotData {
    /// Aggregates `source` according to `config`. Fails without producing
    /// an engine if the aggregations cannot be resolved.
    pub fn new(source: RecordSource, config: PivotConfig) -> Result<Self> {
        let aggregations = normalize_aggregations(&config)?;
        if aggregations.is_empty() {
            return Err(PivotError::EmptyAggregations);
        }

        let factories = aggregations
            .iter()
            .map(|agg| {
                config
                    .aggregators
                    .get(&agg.aggregator_name)
                    .map(|template| template.factory(&agg.vals, &config.sorters))
                    .ok_or_else(|| PivotError::UnknownAggregator(agg.aggregator_name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        let index = AggregationIndex::new(&aggregations);

        let mut tables = CrossTab::new(&factories);
        source.for_each_record(&config.derived_attributes, &mut |record: &Record| {
            if passes_filter(&config.value_filter, record) {
                tables.process_record(record, &config.rows, &config.cols, &factories);
            }
        });

        debug!(
            target: "PIVOT",
            "built cross-tab: {} records, {} row keys, {} col keys, {} aggregations",
            tables.record_count,
            tables.row_keys.len(),
            tables.col_keys.len(),
            aggregations.len()
        );

        Ok(PivotData {
            config,
            source,
            aggregations,
            index,
            tables,
            sorted: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &PivotConfig {
        &self.config
    }

    /// Number of records that passed the value filter.
    pub fn record_count(&self) -> usize {
        self.tables.record_count
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    pub fn row_keys(&self) -> &[CompositeKey] {
        &self.sorted_keys().rows
    }

    pub fn col_keys(&self) -> &[CompositeKey] {
        &self.sorted_keys().cols
    }

    /// Runs the one-time sort if it has not run yet.
    pub fn sort_keys(&self) {
        self.sorted_keys();
    }

    pub fn sort_state(&self) -> SortState {
        if self.sorted.get().is_some() {
            SortState::Sorted
        } else {
            SortState::Unsorted
        }
    }

    fn sorted_keys(&self) -> &SortedKeys {
        self.sorted.get_or_init(|| {
            trace!(
                target: "PIVOT",
                "sorting {} row keys and {} col keys",
                self.tables.row_keys.len(),
                self.tables.col_keys.len()
            );
            let rows = self.sort_axis(
                &self.tables.row_keys,
                &self.config.rows,
                self.config.row_order,
                &self.config.row_sorts,
                |key| self.get_aggregator(key, &[], None).value(),
            );
            let cols = self.sort_axis(
                &self.tables.col_keys,
                &self.config.cols,
                self.config.col_order,
                &self.config.col_sorts,
                |key| self.get_aggregator(&[], key, None).value(),
            );
            SortedKeys { rows, cols }
        })
    }

    fn sort_axis(
        &self,
        keys: &[CompositeKey],
        attrs: &[String],
        order: AxisOrder,
        overrides: &FxHashMap<String, SortDirection>,
        margin_value: impl Fn(&[Value]) -> Value,
    ) -> Vec<CompositeKey> {
        let comparators: Vec<Comparator> = attrs
            .iter()
            .enumerate()
            .map(|(i, attr)| {
                let observed = observed_values(keys, i);
                get_sort(&self.config.sorters, attr, Some(observed.as_slice()))
            })
            .collect();

        let mut entries: Vec<(&CompositeKey, Value)> = keys
            .iter()
            .map(|key| {
                let value = match order {
                    AxisOrder::KeyAToZ => Value::Null,
                    AxisOrder::ValueAToZ | AxisOrder::ValueZToA => margin_value(key.as_slice()),
                };
                (key, value)
            })
            .collect();

        let global = |a: &(&CompositeKey, Value), b: &(&CompositeKey, Value)| match order {
            AxisOrder::KeyAToZ => compare_keys(&comparators, a.0, b.0),
            AxisOrder::ValueAToZ => natural_sort(&a.1, &b.1),
            AxisOrder::ValueZToA => natural_sort(&a.1, &b.1).reverse(),
        };

        let directions: Vec<Option<SortDirection>> =
            attrs.iter().map(|attr| overrides.get(attr).copied()).collect();

        entries.sort_by(|a, b| {
            for (i, direction) in directions.iter().enumerate() {
                let Some(direction) = direction else {
                    continue;
                };
                let ord = match (a.0.get(i), b.0.get(i)) {
                    (Some(x), Some(y)) => comparators[i](x, y),
                    _ => Ordering::Equal,
                };
                if ord != Ordering::Equal {
                    return direction.apply(ord);
                }
            }
            global(a, b)
        });

        entries.into_iter().map(|(key, _)| key.clone()).collect()
    }

    // ------------------------------------------------------------------------
    // Aggregators
    // ------------------------------------------------------------------------

    /// The aggregator for a row/column pair. Empty keys select margins: an
    /// empty column key gives the row total, both empty the grand total.
    /// `aggregation_key` may be a spec key or an aggregator name; `None`
    /// selects the primary aggregation. Missing cells yield the empty
    /// aggregator.
    pub fn get_aggregator(
        &self,
        row_key: &[Value],
        col_key: &[Value],
        aggregation_key: Option<&str>,
    ) -> AggregatorRef<'_> {
        let index = self.index.resolve(aggregation_key);
        let aggregator = self
            .tables
            .cell(row_key, col_key)
            .and_then(|cell| cell.instance(index))
            .unwrap_or(&*EMPTY_AGGREGATOR);
        AggregatorRef {
            data: self,
            aggregator,
            row_key: row_key.iter().cloned().collect(),
            col_key: col_key.iter().cloned().collect(),
            index,
        }
    }

    /// Copies of the normalized aggregations.
    pub fn aggregations(&self) -> Vec<Aggregation> {
        self.aggregations.clone()
    }

    pub fn primary_aggregation(&self) -> Aggregation {
        self.aggregations[0].clone()
    }

    pub fn aggregator_names(&self) -> Vec<String> {
        self.aggregations
            .iter()
            .map(|agg| agg.aggregator_name.clone())
            .collect()
    }

    pub fn primary_aggregator_name(&self) -> &str {
        &self.aggregations[0].aggregator_name
    }

    /// Aggregations grouped by aggregator name, in first-use order.
    pub fn group_aggregations_by_type(&self) -> IndexMap<String, Vec<Aggregation>> {
        let mut grouped: IndexMap<String, Vec<Aggregation>> = IndexMap::new();
        for agg in &self.aggregations {
            grouped
                .entry(agg.aggregator_name.clone())
                .or_default()
                .push(agg.clone());
        }
        grouped
    }

    pub fn aggregations_by_type(&self, aggregator_name: &str) -> Vec<Aggregation> {
        self.aggregations
            .iter()
            .filter(|agg| agg.aggregator_name == aggregator_name)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Drill-through
    // ------------------------------------------------------------------------

    /// Streams the source again and calls `callback` for every record that
    /// passes the value filter and equals `criteria` on each of its
    /// attributes (missing attributes read as "null").
    pub fn for_each_matching_record(&self, criteria: &Record, mut callback: impl FnMut(&Record)) {
        self.source
            .for_each_record(&self.config.derived_attributes, &mut |record: &Record| {
                if !passes_filter(&self.config.value_filter, record) {
                    return;
                }
                let matches = criteria
                    .iter()
                    .all(|(attr, expected)| record.key_value(attr) == *expected);
                if matches {
                    callback(record);
                }
            });
    }
}

/// Distinct values at one key position, in key order.
fn observed_values(keys: &[CompositeKey], position: usize) -> Vec<Value> {
    let mut seen = FxHashSet::default();
    keys.iter()
        .filter_map(|key| key.get(position))
        .filter(|value| seen.insert(value.to_string()))
        .cloned()
        .collect()
}

// ============================================================================
// AGGREGATOR HANDLE
// ============================================================================

/// An aggregator looked up from a `PivotData`, with enough context to
/// resolve fraction-of margins.
#[derive(Clone)]
pub struct AggregatorRef<'a> {
    data: &'a PivotData,
    aggregator: &'a Aggregator,
    row_key: CompositeKey,
    col_key: CompositeKey,
    index: usize,
}

impl<'a> AggregatorRef<'a> {
    pub fn value(&self) -> Value {
        self.aggregator.value_with(self)
    }

    pub fn format(&self, value: &Value) -> String {
        self.aggregator.format(value)
    }

    /// `format(value())`
    pub fn formatted(&self) -> String {
        self.format(&self.value())
    }

    pub fn num_inputs(&self) -> usize {
        self.aggregator.num_inputs()
    }

    /// True when no cell exists for the requested keys.
    pub fn is_empty(&self) -> bool {
        self.aggregator.is_empty_aggregator()
    }

    pub fn aggregator(&self) -> &'a Aggregator {
        self.aggregator
    }
}

impl fmt::Debug for AggregatorRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatorRef")
            .field("row_key", &self.row_key)
            .field("col_key", &self.col_key)
            .field("aggregation", &self.index)
            .field("aggregator", &self.aggregator)
            .finish()
    }
}

impl MarginSource for AggregatorRef<'_> {
    fn margin_value(&self, scope: FractionScope) -> Value {
        let (row_key, col_key): (&[Value], &[Value]) = match scope {
            FractionScope::Total => (&[], &[]),
            FractionScope::Row => (self.row_key.as_slice(), &[]),
            FractionScope::Col => (&[], self.col_key.as_slice()),
        };
        self.data
            .tables
            .cell(row_key, col_key)
            .and_then(|cell| cell.instance(self.index))
            .map_or(Value::Null, Aggregator::inner_value)
    }
}
