//! FILENAME: crosstab/src/definition.rs
//! Pivot Definition - what a cross-tab computes.
//!
//! The data-only parts of `PivotConfig` are serializable, so a pivot can be
//! described in JSON. Callback-bearing parts (aggregator templates, sorters,
//! derived attributes) are attached in code.

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::aggregator::AggregatorRegistry;
use crate::error::{PivotError, Result};
use crate::record::DerivedAttributes;
use crate::sort::{AxisOrder, SortDirection, Sorters};

/// Attribute name → displayed values to exclude.
pub type ValueFilter = FxHashMap<String, FxHashSet<String>>;

// ============================================================================
// AGGREGATIONS
// ============================================================================

/// One requested aggregation. Any field may be omitted; see
/// `normalize_aggregations` for how the gaps are filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregationSpec {
    pub key: Option<String>,
    pub aggregator_name: Option<String>,
    pub vals: Option<Vec<String>>,
    pub label: Option<String>,
}

impl AggregationSpec {
    pub fn new(aggregator_name: impl Into<String>) -> Self {
        AggregationSpec {
            aggregator_name: Some(aggregator_name.into()),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_vals<I, S>(mut self, vals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vals = Some(vals.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A fully specified aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub key: String,
    pub aggregator_name: String,
    pub vals: Vec<String>,
    pub label: String,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Completes the configured aggregations.
///
/// - A non-empty `aggregations` list is used as given. Entries without a
///   name get the registry's default aggregator, entries without `vals`
///   get none.
/// - Otherwise the legacy `aggregator_name` + `vals` pair becomes the only
///   aggregation. With no list at all the registry default stands in for a
///   missing legacy name; an explicitly empty list requires one.
///
/// Missing keys become `"{name}-{vals joined by |}-{index}"`, missing labels
/// `"{name} of {vals joined by , }"` (or just the name).
pub fn normalize_aggregations(config: &PivotConfig) -> Result<Vec<Aggregation>> {
    let default_name = config.aggregators.default_name();
    let legacy_name = non_empty(&config.aggregator_name);
    let provided = config.aggregations.as_ref().filter(|list| !list.is_empty());

    let entries: Vec<AggregationSpec> = match provided {
        Some(list) => list.clone(),
        None => {
            if config.aggregations.is_some() && legacy_name.is_none() {
                return Err(PivotError::EmptyAggregations);
            }
            vec![AggregationSpec {
                aggregator_name: legacy_name.or(default_name).map(str::to_string),
                vals: Some(config.vals.clone()),
                ..Default::default()
            }]
        }
    };

    entries
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            let aggregator_name = non_empty(&spec.aggregator_name)
                .or(default_name)
                .ok_or(PivotError::MissingAggregatorName { index: idx })?
                .to_string();
            let vals = spec.vals.clone().unwrap_or_default();
            let key = non_empty(&spec.key)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}-{}-{}", aggregator_name, vals.join("|"), idx));
            let label = non_empty(&spec.label).map(str::to_string).unwrap_or_else(|| {
                if vals.is_empty() {
                    aggregator_name.clone()
                } else {
                    format!("{} of {}", aggregator_name, vals.join(", "))
                }
            });
            Ok(Aggregation {
                key,
                aggregator_name,
                vals,
                label,
            })
        })
        .collect()
}

/// Resolves aggregation keys to positions in the normalized list.
#[derive(Debug, Clone, Default)]
pub struct AggregationIndex {
    by_key: FxHashMap<String, usize>,
    by_name: FxHashMap<String, usize>,
}

impl AggregationIndex {
    pub fn new(aggregations: &[Aggregation]) -> Self {
        let mut index = AggregationIndex::default();
        for (i, agg) in aggregations.iter().enumerate() {
            index.by_key.entry(agg.key.clone()).or_insert(i);
            index.by_name.entry(agg.aggregator_name.clone()).or_insert(i);
        }
        index
    }

    /// Exact key first, then the first aggregation using that aggregator.
    pub fn lookup(&self, key: &str) -> Option<usize> {
        self.by_key
            .get(key)
            .or_else(|| self.by_name.get(key))
            .copied()
    }

    /// Like `lookup`, but an omitted or unknown key selects the primary
    /// aggregation.
    pub fn resolve(&self, key: Option<&str>) -> usize {
        match key {
            None => 0,
            Some(k) => self.lookup(k).unwrap_or_else(|| {
                warn!(
                    target: "PIVOT",
                    "Unknown aggregation key '{}', using the primary aggregation",
                    k
                );
                0
            }),
        }
    }
}

// ============================================================================
// PIVOT CONFIG
// ============================================================================

/// Everything needed to build a `PivotData`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotConfig {
    pub rows: Vec<String>,
    pub cols: Vec<String>,

    /// Explicit aggregations. `None` falls back to `aggregator_name`/`vals`.
    pub aggregations: Option<Vec<AggregationSpec>>,

    /// Legacy single-aggregation form.
    pub aggregator_name: Option<String>,
    pub vals: Vec<String>,

    pub value_filter: ValueFilter,

    pub row_order: AxisOrder,
    pub col_order: AxisOrder,

    /// Per-attribute direction overrides, applied before `row_order`.
    pub row_sorts: FxHashMap<String, SortDirection>,
    pub col_sorts: FxHashMap<String, SortDirection>,

    #[serde(skip)]
    pub aggregators: AggregatorRegistry,

    #[serde(skip)]
    pub sorters: Sorters,

    #[serde(skip)]
    pub derived_attributes: DerivedAttributes,
}

impl PivotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows<I, S>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows = rows.into_iter().map(Into::into).collect();
        self
    }

    pub fn cols<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cols = cols.into_iter().map(Into::into).collect();
        self
    }

    /// Appends an explicit aggregation.
    pub fn aggregation(mut self, spec: AggregationSpec) -> Self {
        self.aggregations.get_or_insert_with(Vec::new).push(spec);
        self
    }

    pub fn aggregator<I, S>(mut self, name: impl Into<String>, vals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aggregator_name = Some(name.into());
        self.vals = vals.into_iter().map(Into::into).collect();
        self
    }

    /// Excludes records whose `attr` displays as `value`.
    pub fn exclude(mut self, attr: impl Into<String>, value: impl Into<String>) -> Self {
        self.value_filter
            .entry(attr.into())
            .or_default()
            .insert(value.into());
        self
    }

    pub fn row_order(mut self, order: AxisOrder) -> Self {
        self.row_order = order;
        self
    }

    pub fn col_order(mut self, order: AxisOrder) -> Self {
        self.col_order = order;
        self
    }

    pub fn row_sort(mut self, attr: impl Into<String>, direction: SortDirection) -> Self {
        self.row_sorts.insert(attr.into(), direction);
        self
    }

    pub fn col_sort(mut self, attr: impl Into<String>, direction: SortDirection) -> Self {
        self.col_sorts.insert(attr.into(), direction);
        self
    }

    pub fn with_aggregators(mut self, aggregators: AggregatorRegistry) -> Self {
        self.aggregators = aggregators;
        self
    }

    pub fn with_sorters(mut self, sorters: Sorters) -> Self {
        self.sorters = sorters;
        self
    }

    pub fn with_derived_attributes(mut self, derived: DerivedAttributes) -> Self {
        self.derived_attributes = derived;
        self
    }
}
