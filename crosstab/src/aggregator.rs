//! FILENAME: crosstab/src/aggregator.rs
//! Aggregator templates and the per-cell accumulators they produce.
//!
//! A template fixes the algorithm and the formatter. Binding it to operand
//! attributes yields an `AggregatorFactory`, which the engine asks for one
//! fresh `Aggregator` per cell.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::format::{Formatter, NumberFormat};
use crate::record::Record;
use crate::sort::{get_sort, BuiltinSorter, Comparator, Sorters};
use crate::value::Value;

// ============================================================================
// TEMPLATE KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatMode {
    Mean,
    Var,
    Stdev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtremeMode {
    Min,
    Max,
    First,
    Last,
}

/// Which margin a fraction-of aggregator divides by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FractionScope {
    Total,
    Row,
    Col,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregatorKind {
    Count,
    CountUnique,
    ListUnique { separator: String },
    Sum,
    RunningStat { mode: StatMode, ddof: u32 },
    Quantile(f64),
    Extreme(ExtremeMode),
    SumOverSum,
    FractionOf { inner: Box<AggregatorKind>, scope: FractionScope },
}

impl AggregatorKind {
    /// Number of operand attributes the algorithm reads.
    pub fn arity(&self) -> usize {
        match self {
            AggregatorKind::Count => 0,
            AggregatorKind::SumOverSum => 2,
            AggregatorKind::FractionOf { inner, .. } => inner.arity(),
            _ => 1,
        }
    }
}

// ============================================================================
// TEMPLATES
// ============================================================================

/// An aggregation algorithm paired with its formatter.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorTemplate {
    pub kind: AggregatorKind,
    pub formatter: Formatter,
}

impl AggregatorTemplate {
    pub fn new(kind: AggregatorKind, formatter: impl Into<Formatter>) -> Self {
        AggregatorTemplate {
            kind,
            formatter: formatter.into(),
        }
    }

    pub fn count() -> Self {
        Self::new(AggregatorKind::Count, NumberFormat::us_integer())
    }

    pub fn count_unique() -> Self {
        Self::new(AggregatorKind::CountUnique, NumberFormat::us_integer())
    }

    pub fn list_unique(separator: impl Into<String>) -> Self {
        AggregatorTemplate {
            kind: AggregatorKind::ListUnique {
                separator: separator.into(),
            },
            formatter: Formatter::Text,
        }
    }

    pub fn sum() -> Self {
        Self::new(AggregatorKind::Sum, NumberFormat::us())
    }

    pub fn average() -> Self {
        Self::running_stat(StatMode::Mean, 1)
    }

    pub fn variance(ddof: u32) -> Self {
        Self::running_stat(StatMode::Var, ddof)
    }

    pub fn stdev(ddof: u32) -> Self {
        Self::running_stat(StatMode::Stdev, ddof)
    }

    pub fn running_stat(mode: StatMode, ddof: u32) -> Self {
        Self::new(AggregatorKind::RunningStat { mode, ddof }, NumberFormat::us())
    }

    pub fn median() -> Self {
        Self::quantile(0.5)
    }

    /// `q` is clamped to `[0, 1]`.
    pub fn quantile(q: f64) -> Self {
        Self::new(AggregatorKind::Quantile(q.clamp(0.0, 1.0)), NumberFormat::us())
    }

    pub fn min() -> Self {
        Self::extreme(ExtremeMode::Min)
    }

    pub fn max() -> Self {
        Self::extreme(ExtremeMode::Max)
    }

    pub fn first() -> Self {
        Self::extreme(ExtremeMode::First)
    }

    pub fn last() -> Self {
        Self::extreme(ExtremeMode::Last)
    }

    fn extreme(mode: ExtremeMode) -> Self {
        AggregatorTemplate {
            kind: AggregatorKind::Extreme(mode),
            formatter: Formatter::NumberOrText(NumberFormat::us()),
        }
    }

    pub fn sum_over_sum() -> Self {
        Self::new(AggregatorKind::SumOverSum, NumberFormat::us())
    }

    /// Wraps `inner`, dividing its value by the same aggregation's value at
    /// the margin picked by `scope`. Formats as a percentage.
    pub fn fraction_of(inner: AggregatorTemplate, scope: FractionScope) -> Self {
        Self::new(
            AggregatorKind::FractionOf {
                inner: Box::new(inner.kind),
                scope,
            },
            NumberFormat::us_percent(),
        )
    }

    pub fn with_formatter(mut self, formatter: impl Into<Formatter>) -> Self {
        self.formatter = formatter.into();
        self
    }

    /// Binds the template to its operand attributes. First/last resolve
    /// their operand's sorter here, once.
    pub fn factory(&self, vals: &[String], sorters: &Sorters) -> AggregatorFactory {
        let arity = self.kind.arity();
        let sorter = match innermost(&self.kind) {
            AggregatorKind::Extreme(ExtremeMode::First | ExtremeMode::Last) => {
                Some(get_sort(sorters, vals.first().map_or("", String::as_str), None))
            }
            _ => None,
        };
        AggregatorFactory {
            kind: self.kind.clone(),
            formatter: self.formatter.clone(),
            operands: vals.iter().take(arity).cloned().collect(),
            num_inputs: arity.saturating_sub(vals.len()),
            sorter,
        }
    }
}

fn innermost(kind: &AggregatorKind) -> &AggregatorKind {
    match kind {
        AggregatorKind::FractionOf { inner, .. } => innermost(inner),
        other => other,
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// A template bound to operand attributes; creates fresh accumulators.
#[derive(Clone)]
pub struct AggregatorFactory {
    kind: AggregatorKind,
    formatter: Formatter,
    operands: Arc<[String]>,
    num_inputs: usize,
    sorter: Option<Comparator>,
}

impl AggregatorFactory {
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn create(&self) -> Aggregator {
        Aggregator {
            state: self.initial_state(&self.kind),
            formatter: self.formatter.clone(),
            operands: Arc::clone(&self.operands),
            num_inputs: self.num_inputs,
        }
    }

    fn initial_state(&self, kind: &AggregatorKind) -> AggregatorState {
        match kind {
            AggregatorKind::Count => AggregatorState::Count(0),
            AggregatorKind::CountUnique => AggregatorState::Uniques {
                seen: Vec::new(),
                separator: None,
            },
            AggregatorKind::ListUnique { separator } => AggregatorState::Uniques {
                seen: Vec::new(),
                separator: Some(separator.clone()),
            },
            AggregatorKind::Sum => AggregatorState::Sum(0.0),
            AggregatorKind::RunningStat { mode, ddof } => AggregatorState::RunningStat {
                mode: *mode,
                ddof: *ddof,
                n: 0.0,
                m: 0.0,
                s: 0.0,
            },
            AggregatorKind::Quantile(q) => AggregatorState::Quantile {
                q: *q,
                vals: Vec::new(),
            },
            AggregatorKind::Extreme(mode) => match mode {
                ExtremeMode::Min | ExtremeMode::Max => AggregatorState::MinMax {
                    mode: *mode,
                    val: None,
                },
                ExtremeMode::First | ExtremeMode::Last => AggregatorState::FirstLast {
                    mode: *mode,
                    val: None,
                    sorter: self
                        .sorter
                        .clone()
                        .unwrap_or_else(|| BuiltinSorter::Natural.comparator()),
                },
            },
            AggregatorKind::SumOverSum => AggregatorState::SumOverSum { num: 0.0, denom: 0.0 },
            AggregatorKind::FractionOf { inner, scope } => AggregatorState::FractionOf {
                inner: Box::new(Aggregator {
                    state: self.initial_state(inner),
                    formatter: self.formatter.clone(),
                    operands: Arc::clone(&self.operands),
                    num_inputs: self.num_inputs,
                }),
                scope: *scope,
            },
        }
    }
}

impl fmt::Debug for AggregatorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatorFactory")
            .field("kind", &self.kind)
            .field("operands", &self.operands)
            .field("num_inputs", &self.num_inputs)
            .finish()
    }
}

// ============================================================================
// ACCUMULATORS
// ============================================================================

/// Supplies margin values to fraction-of aggregators.
pub trait MarginSource {
    /// Value of the wrapped aggregator for the same aggregation at the
    /// margin selected by `scope`.
    fn margin_value(&self, scope: FractionScope) -> Value;
}

/// For aggregators evaluated outside an engine; every margin is unknown.
pub struct NoMargins;

impl MarginSource for NoMargins {
    fn margin_value(&self, _scope: FractionScope) -> Value {
        Value::Null
    }
}

#[derive(Clone)]
enum AggregatorState {
    Empty,
    Count(u64),
    Uniques {
        seen: Vec<Value>,
        /// `None` counts, `Some(sep)` lists.
        separator: Option<String>,
    },
    Sum(f64),
    RunningStat {
        mode: StatMode,
        ddof: u32,
        n: f64,
        m: f64,
        s: f64,
    },
    Quantile {
        q: f64,
        vals: Vec<f64>,
    },
    MinMax {
        mode: ExtremeMode,
        val: Option<f64>,
    },
    FirstLast {
        mode: ExtremeMode,
        val: Option<Value>,
        sorter: Comparator,
    },
    SumOverSum {
        num: f64,
        denom: f64,
    },
    FractionOf {
        inner: Box<Aggregator>,
        scope: FractionScope,
    },
}

/// Stateful accumulator for one (cell, aggregation) pair.
#[derive(Clone)]
pub struct Aggregator {
    state: AggregatorState,
    formatter: Formatter,
    operands: Arc<[String]>,
    num_inputs: usize,
}

/// Shared stand-in for cells that do not exist: null value, empty format.
pub static EMPTY_AGGREGATOR: Lazy<Aggregator> = Lazy::new(|| Aggregator {
    state: AggregatorState::Empty,
    formatter: Formatter::Text,
    operands: Arc::from(Vec::new()),
    num_inputs: 0,
});

impl Aggregator {
    pub fn is_empty_aggregator(&self) -> bool {
        matches!(self.state, AggregatorState::Empty)
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn operands(&self) -> &[String] {
        &self.operands
    }

    pub fn push(&mut self, record: &Record) {
        let first = self.operands.first().and_then(|attr| record.get(attr));
        let second = self.operands.get(1).and_then(|attr| record.get(attr));
        match &mut self.state {
            AggregatorState::Empty => {}
            AggregatorState::Count(count) => *count += 1,
            AggregatorState::Uniques { seen, .. } => {
                if let Some(x) = first {
                    if !seen.iter().any(|v| same_value(v, x)) {
                        seen.push(x.clone());
                    }
                }
            }
            AggregatorState::Sum(sum) => {
                let x = first.map_or(f64::NAN, Value::parse_float);
                if !x.is_nan() {
                    *sum += x;
                }
            }
            AggregatorState::RunningStat { n, m, s, .. } => {
                let x = first.map_or(f64::NAN, Value::parse_float);
                if x.is_nan() {
                    return;
                }
                // Welford's algorithm
                *n += 1.0;
                if *n == 1.0 {
                    *m = x;
                }
                let m_new = *m + (x - *m) / *n;
                *s += (x - *m) * (x - m_new);
                *m = m_new;
            }
            AggregatorState::Quantile { vals, .. } => {
                let x = first.map_or(f64::NAN, Value::parse_float);
                if !x.is_nan() {
                    vals.push(x);
                }
            }
            AggregatorState::MinMax { mode, val } => {
                let x = first.map_or(f64::NAN, Value::parse_float);
                if x.is_nan() {
                    return;
                }
                let current = val.unwrap_or(x);
                *val = Some(match mode {
                    ExtremeMode::Min => x.min(current),
                    _ => x.max(current),
                });
            }
            AggregatorState::FirstLast { mode, val, sorter } => {
                let Some(x) = first else {
                    return;
                };
                let ord = match val {
                    Some(current) => sorter(x, current),
                    None => Ordering::Equal,
                };
                // ties keep the held value for first, replace it for last
                let replace = val.is_none()
                    || match mode {
                        ExtremeMode::First => ord == Ordering::Less,
                        _ => ord != Ordering::Less,
                    };
                if replace {
                    *val = Some(x.clone());
                }
            }
            AggregatorState::SumOverSum { num, denom } => {
                let x = first.map_or(f64::NAN, Value::parse_float);
                if !x.is_nan() {
                    *num += x;
                }
                let y = second.map_or(f64::NAN, Value::parse_float);
                if !y.is_nan() {
                    *denom += y;
                }
            }
            AggregatorState::FractionOf { inner, .. } => inner.push(record),
        }
    }

    /// The aggregator's own value. Fraction-of aggregators need their
    /// margins; see `value_with`.
    pub fn value(&self) -> Value {
        self.value_with(&NoMargins)
    }

    pub fn value_with(&self, margins: &dyn MarginSource) -> Value {
        match &self.state {
            AggregatorState::FractionOf { inner, scope } => {
                let numerator = numeric(&inner.value());
                let denominator = numeric(&margins.margin_value(*scope));
                Value::Number(numerator / denominator)
            }
            _ => self.inner_value(),
        }
    }

    /// For fraction-of aggregators, the wrapped aggregator's value;
    /// otherwise the aggregator's own value.
    pub fn inner_value(&self) -> Value {
        match &self.state {
            AggregatorState::Empty => Value::Null,
            AggregatorState::Count(count) => Value::Number(*count as f64),
            AggregatorState::Uniques { seen, separator } => match separator {
                None => Value::Number(seen.len() as f64),
                Some(sep) => Value::Text(
                    seen.iter()
                        .map(|v| match v {
                            Value::Null => String::new(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(sep),
                ),
            },
            AggregatorState::Sum(sum) => Value::Number(*sum),
            AggregatorState::RunningStat { mode, ddof, n, m, s } => {
                let ddof = f64::from(*ddof);
                Value::Number(match mode {
                    StatMode::Mean if *n == 0.0 => f64::NAN,
                    StatMode::Mean => *m,
                    _ if *n <= ddof => 0.0,
                    StatMode::Var => *s / (*n - ddof),
                    StatMode::Stdev => (*s / (*n - ddof)).sqrt(),
                })
            }
            AggregatorState::Quantile { q, vals } => {
                if vals.is_empty() {
                    return Value::Null;
                }
                let mut sorted = vals.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let last = sorted.len() - 1;
                let i = last as f64 * q.clamp(0.0, 1.0);
                let lo = sorted[(i.floor() as usize).min(last)];
                let hi = sorted[(i.ceil() as usize).min(last)];
                Value::Number((lo + hi) / 2.0)
            }
            AggregatorState::MinMax { val, .. } => val.map_or(Value::Null, Value::Number),
            AggregatorState::FirstLast { val, .. } => val.clone().unwrap_or(Value::Null),
            AggregatorState::SumOverSum { num, denom } => Value::Number(num / denom),
            AggregatorState::FractionOf { inner, .. } => inner.value(),
        }
    }

    pub fn format(&self, value: &Value) -> String {
        self.formatter.format(value)
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("operands", &self.operands)
            .field("value", &self.inner_value())
            .finish()
    }
}

/// Distinctness for unique-value aggregators: NaN equals NaN, numbers and
/// their text forms stay distinct.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => a == b,
    }
}

fn numeric(value: &Value) -> f64 {
    match value {
        Value::Null => f64::NAN,
        other => other.to_number(),
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Named aggregator templates, in presentation order. The first entry is
/// the default aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorRegistry {
    templates: IndexMap<String, AggregatorTemplate>,
}

impl AggregatorRegistry {
    pub fn empty() -> Self {
        AggregatorRegistry {
            templates: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AggregatorTemplate> {
        self.templates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Adds or replaces a template; replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, template: AggregatorTemplate) {
        self.templates.insert(name.into(), template);
    }

    pub fn with(mut self, name: impl Into<String>, template: AggregatorTemplate) -> Self {
        self.insert(name, template);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.templates.keys().next().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for AggregatorRegistry {
    /// US-English names and number formatting.
    fn default() -> Self {
        use AggregatorTemplate as T;
        use FractionScope::{Col, Row, Total};

        AggregatorRegistry::empty()
            .with("Count", T::count())
            .with("Count Unique Values", T::count_unique())
            .with("List Unique Values", T::list_unique(", "))
            .with("Sum", T::sum())
            .with("Integer Sum", T::sum().with_formatter(NumberFormat::us_integer()))
            .with("Average", T::average())
            .with("Median", T::median())
            .with("Sample Variance", T::variance(1))
            .with("Sample Standard Deviation", T::stdev(1))
            .with("Minimum", T::min())
            .with("Maximum", T::max())
            .with("First", T::first())
            .with("Last", T::last())
            .with("Sum over Sum", T::sum_over_sum())
            .with("Sum as Fraction of Total", T::fraction_of(T::sum(), Total))
            .with("Sum as Fraction of Rows", T::fraction_of(T::sum(), Row))
            .with("Sum as Fraction of Columns", T::fraction_of(T::sum(), Col))
            .with("Count as Fraction of Total", T::fraction_of(T::count(), Total))
            .with("Count as Fraction of Rows", T::fraction_of(T::count(), Row))
            .with("Count as Fraction of Columns", T::fraction_of(T::count(), Col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SorterSpec;

    fn records(attr: &str, values: &[Value]) -> Vec<Record> {
        values
            .iter()
            .map(|v| Record::from_iter([(attr, v.clone())]))
            .collect()
    }

    fn run(template: AggregatorTemplate, vals: &[&str], input: &[Record]) -> Aggregator {
        let vals: Vec<String> = vals.iter().map(|s| s.to_string()).collect();
        let mut agg = template.factory(&vals, &Sorters::new()).create();
        for r in input {
            agg.push(r);
        }
        agg
    }

    fn trials() -> Vec<Record> {
        records("trials", &[103.into(), 95.into(), 112.into(), 102.into()])
    }

    #[test]
    fn test_count_and_sum() {
        let data = records("x", &[1.into(), "2".into(), "abc".into(), Value::Null]);
        assert_eq!(run(AggregatorTemplate::count(), &[], &data).value(), Value::Number(4.0));
        assert_eq!(run(AggregatorTemplate::sum(), &["x"], &data).value(), Value::Number(3.0));
    }

    #[test]
    fn test_running_stats() {
        let data = trials();
        let mean = run(AggregatorTemplate::average(), &["trials"], &data).value();
        assert_eq!(mean, Value::Number(103.0));

        let var = run(AggregatorTemplate::variance(1), &["trials"], &data).value();
        assert!((var.to_number() - 146.0 / 3.0).abs() < 1e-9);

        let stdev = run(AggregatorTemplate::stdev(1), &["trials"], &data).value();
        assert!((stdev.to_number() - (146.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_running_stats_degenerate() {
        let mean = run(AggregatorTemplate::average(), &["trials"], &[]).value();
        assert!(mean.to_number().is_nan());

        let one = records("trials", &[5.into()]);
        let var = run(AggregatorTemplate::variance(1), &["trials"], &one).value();
        assert_eq!(var, Value::Number(0.0));
    }

    #[test]
    fn test_quantiles() {
        let data = trials();
        let q = |q: f64| run(AggregatorTemplate::quantile(q), &["trials"], &data).value();
        assert_eq!(q(0.0), Value::Number(95.0));
        assert_eq!(q(0.1), Value::Number(98.5));
        assert_eq!(q(0.25), Value::Number(98.5));
        assert_eq!(q(1.0 / 3.0), Value::Number(102.0));
        assert_eq!(q(0.5), Value::Number(102.5));
        assert_eq!(q(1.0), Value::Number(112.0));
        assert_eq!(run(AggregatorTemplate::median(), &["trials"], &[]).value(), Value::Null);
    }

    #[test]
    fn test_quantile_out_of_range_is_clamped() {
        let data = records("x", &[1.into(), 2.into(), 3.into()]);
        let q = |q: f64| run(AggregatorTemplate::quantile(q), &["x"], &data).value();
        assert_eq!(q(1.5), Value::Number(3.0));
        assert_eq!(q(-0.5), Value::Number(1.0));

        // a hand-built kind bypasses the constructor clamp
        let raw = AggregatorTemplate::new(AggregatorKind::Quantile(7.0), NumberFormat::us());
        assert_eq!(run(raw, &["x"], &data).value(), Value::Number(3.0));
    }

    #[test]
    fn test_min_max() {
        let data = trials();
        let min = run(AggregatorTemplate::min(), &["trials"], &data).value();
        let max = run(AggregatorTemplate::max(), &["trials"], &data).value();
        assert_eq!(min, Value::Number(95.0));
        assert_eq!(max, Value::Number(112.0));
    }

    #[test]
    fn test_first_last_follow_sorter() {
        let names = records(
            "name",
            &["Nick".into(), "Jane".into(), "John".into(), "Carol".into()],
        );
        let first = run(AggregatorTemplate::first(), &["name"], &names).value();
        let last = run(AggregatorTemplate::last(), &["name"], &names).value();
        assert_eq!(first, Value::text("Carol"));
        assert_eq!(last, Value::text("Nick"));

        let sorters =
            Sorters::new().with("name", SorterSpec::function(|a, b| natural_sort_rev(a, b)));
        let mut first = AggregatorTemplate::first()
            .factory(&["name".to_string()], &sorters)
            .create();
        for r in &names {
            first.push(r);
        }
        assert_eq!(first.value(), Value::text("Nick"));
    }

    fn natural_sort_rev(a: &Value, b: &Value) -> Ordering {
        crate::sort::natural_sort(b, a)
    }

    #[test]
    fn test_first_keeps_and_last_replaces_on_ties() {
        let data = records("x", &["b".into(), "B".into(), "a".into(), "A".into()]);
        let sorters = Sorters::new().with("x", BuiltinSorter::StringCaseInsensitive);
        let extreme = |template: AggregatorTemplate| {
            let mut agg = template.factory(&["x".to_string()], &sorters).create();
            for r in &data {
                agg.push(r);
            }
            agg.value()
        };
        assert_eq!(extreme(AggregatorTemplate::first()), Value::text("a"));
        assert_eq!(extreme(AggregatorTemplate::last()), Value::text("B"));
    }

    #[test]
    fn test_uniques() {
        let data = records("g", &["male".into(), "female".into(), "male".into()]);
        let count = run(AggregatorTemplate::count_unique(), &["g"], &data).value();
        assert_eq!(count, Value::Number(2.0));
        assert_eq!(
            run(AggregatorTemplate::list_unique(","), &["g"], &data).value(),
            Value::text("male,female")
        );

        let mixed = records("g", &[1.into(), "1".into()]);
        let count = run(AggregatorTemplate::count_unique(), &["g"], &mixed).value();
        assert_eq!(count, Value::Number(2.0));
    }

    #[test]
    fn test_sum_over_sum() {
        let data = vec![
            Record::from_iter([("a", 1), ("b", 2)]),
            Record::from_iter([("a", 3), ("b", 4)]),
        ];
        let agg = run(AggregatorTemplate::sum_over_sum(), &["a", "b"], &data);
        assert_eq!(agg.value(), Value::Number((1.0 + 3.0) / (2.0 + 4.0)));
    }

    #[test]
    fn test_fraction_of_uses_margin() {
        struct Half;
        impl MarginSource for Half {
            fn margin_value(&self, scope: FractionScope) -> Value {
                assert_eq!(scope, FractionScope::Row);
                Value::Number(824.0)
            }
        }
        let template =
            AggregatorTemplate::fraction_of(AggregatorTemplate::sum(), FractionScope::Row);
        let agg = run(template, &["trials"], &trials());
        assert_eq!(agg.inner_value(), Value::Number(412.0));
        assert_eq!(agg.value_with(&Half), Value::Number(0.5));
        assert_eq!(agg.format(&agg.value_with(&Half)), "50.0%");
        assert!(agg.value().to_number().is_nan());
    }

    #[test]
    fn test_num_inputs() {
        let sorters = Sorters::new();
        assert_eq!(AggregatorTemplate::count().factory(&[], &sorters).num_inputs(), 0);
        assert_eq!(AggregatorTemplate::sum().factory(&[], &sorters).num_inputs(), 1);
        assert_eq!(
            AggregatorTemplate::sum_over_sum()
                .factory(&["a".to_string()], &sorters)
                .num_inputs(),
            1
        );
        let frac =
            AggregatorTemplate::fraction_of(AggregatorTemplate::sum(), FractionScope::Total);
        assert_eq!(frac.factory(&["a".to_string()], &sorters).num_inputs(), 0);
    }

    #[test]
    fn test_empty_aggregator() {
        assert_eq!(EMPTY_AGGREGATOR.value(), Value::Null);
        assert_eq!(EMPTY_AGGREGATOR.format(&EMPTY_AGGREGATOR.value()), "");
        assert_eq!(EMPTY_AGGREGATOR.num_inputs(), 0);
    }

    #[test]
    fn test_default_registry_order() {
        let registry = AggregatorRegistry::default();
        assert_eq!(registry.len(), 20);
        assert_eq!(registry.default_name(), Some("Count"));
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names[13], "Sum over Sum");
        assert_eq!(names[19], "Count as Fraction of Columns");
    }
}
