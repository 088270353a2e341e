//! FILENAME: crosstab/src/lib.rs
//! Cross-tabulation (pivot) engine.
//!
//! Ingests tabular records, groups them by row and column attribute values,
//! and computes one or more aggregates per group with pluggable, stateful
//! aggregators.
//!
//! Layers:
//! - `value`, `record`: loosely typed input and the record source adapter
//! - `sort`: natural ordering and per-attribute sorter resolution
//! - `aggregator`, `format`: aggregator templates, accumulators, formatting
//! - `cell`: one accumulator per aggregation for a single bucket
//! - `definition`: serializable configuration (what the pivot IS)
//! - `engine`: the one-pass build and the query API (HOW we calculate)

pub mod aggregator;
pub mod cell;
pub mod definition;
pub mod engine;
pub mod error;
pub mod format;
pub mod record;
pub mod sort;
pub mod value;

pub use aggregator::{
    Aggregator, AggregatorFactory, AggregatorKind, AggregatorRegistry, AggregatorTemplate,
    ExtremeMode, FractionScope, MarginSource, StatMode, EMPTY_AGGREGATOR,
};
pub use cell::AggregationCell;
pub use definition::{
    normalize_aggregations, Aggregation, AggregationIndex, AggregationSpec, PivotConfig,
    ValueFilter,
};
pub use engine::{AggregatorRef, CompositeKey, PivotData, SortState};
pub use error::{PivotError, Result};
pub use format::{Formatter, NumberFormat};
pub use record::{derivers, DerivedAttributes, Deriver, PushSource, Record, RecordSource};
pub use sort::{
    compare_keys, detect_data_type, get_sort, natural_sort, sort_as, AxisOrder, BuiltinSorter,
    Comparator, SortDirection, SorterSpec, Sorters,
};
pub use value::Value;
