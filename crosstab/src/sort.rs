//! FILENAME: crosstab/src/sort.rs
//! Sort engine: natural ordering, built-in sorters, sorter resolution.
//!
//! Every comparator here is a total order over `Value`, so keys can be
//! sorted with the standard library sorts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Shared comparator over single key components.
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// Looks up a comparator for an attribute; `None` defers to auto-detection.
pub type SorterLookup = Arc<dyn Fn(&str) -> Option<Comparator> + Send + Sync>;

// ============================================================================
// NATURAL SORT
// ============================================================================

/// Total order over mixed values:
/// null < NaN < numbers and numeric strings < non-numeric strings.
///
/// Numbers sort before numeric strings of equal value. Strings containing
/// digits compare run by run, numerically for digit runs; a run with a
/// leading zero reads as a decimal fraction (`"a01" < "a012" < "a02" < "a1"`).
pub fn natural_sort(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let a_nan = matches!(a, Value::Number(n) if n.is_nan());
    let b_nan = matches!(b, Value::Number(n) if n.is_nan());
    match (a_nan, b_nan) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let na = a.to_number();
    let nb = b.to_number();
    if na < nb {
        return Ordering::Less;
    }
    if na > nb {
        return Ordering::Greater;
    }

    match (a, b) {
        (Value::Number(_), Value::Number(_)) => return Ordering::Equal,
        (Value::Number(_), _) => return Ordering::Less,
        (_, Value::Number(_)) => return Ordering::Greater,
        _ => {}
    }

    // numeric-looking strings (including "Infinity") before everything else
    match (na.is_nan(), nb.is_nan()) {
        (false, true) => return Ordering::Less,
        (true, false) => return Ordering::Greater,
        _ => {}
    }

    let sa = a.to_string();
    let sb = b.to_string();
    alphanumeric_cmp(&sa, &sb)
}

fn has_digit(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
}

fn alphanumeric_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if !has_digit(a) || !has_digit(b) {
        return a.cmp(b);
    }

    let ta = digit_runs(a);
    let tb = digit_runs(b);
    for (x, y) in ta.iter().zip(tb.iter()) {
        if x == y {
            continue;
        }
        let x_digits = x.as_bytes()[0].is_ascii_digit();
        let y_digits = y.as_bytes()[0].is_ascii_digit();
        if x_digits && y_digits {
            match run_value(x).partial_cmp(&run_value(y)) {
                Some(Ordering::Equal) | None => continue,
                Some(ord) => return ord,
            }
        }
        return x.cmp(y);
    }
    ta.len().cmp(&tb.len())
}

/// Splits into alternating runs of ASCII digits and non-digits.
fn digit_runs(s: &str) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=bytes.len() {
        if i == bytes.len() || bytes[i].is_ascii_digit() != bytes[start].is_ascii_digit() {
            runs.push(&s[start..i]);
            start = i;
        }
    }
    runs
}

fn run_value(run: &str) -> f64 {
    if run.starts_with('0') {
        format!(".{}", run).parse().unwrap_or(0.0)
    } else {
        run.parse().unwrap_or(f64::NAN)
    }
}

// ============================================================================
// BUILT-IN SORTERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuiltinSorter {
    Number,
    Date,
    String,
    StringCaseInsensitive,
    Natural,
}

impl BuiltinSorter {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinSorter::Number => "number",
            BuiltinSorter::Date => "date",
            BuiltinSorter::String => "string",
            BuiltinSorter::StringCaseInsensitive => "stringCaseInsensitive",
            BuiltinSorter::Natural => "natural",
        }
    }

    /// Empty values (null, `""`) sort first for every sorter except `Natural`.
    pub fn compare(self, a: &Value, b: &Value) -> Ordering {
        if self == BuiltinSorter::Natural {
            return natural_sort(a, b);
        }
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
        match self {
            BuiltinSorter::Number => compare_parsed(
                Some(a.parse_float()).filter(|n| !n.is_nan()),
                Some(b.parse_float()).filter(|n| !n.is_nan()),
            ),
            BuiltinSorter::Date => compare_parsed(
                a.to_datetime().map(|d| d.timestamp_millis() as f64),
                b.to_datetime().map(|d| d.timestamp_millis() as f64),
            ),
            BuiltinSorter::String => a.to_string().cmp(&b.to_string()),
            BuiltinSorter::StringCaseInsensitive => a
                .to_string()
                .to_lowercase()
                .cmp(&b.to_string().to_lowercase()),
            BuiltinSorter::Natural => natural_sort(a, b),
        }
    }

    pub fn comparator(self) -> Comparator {
        Arc::new(move |a, b| self.compare(a, b))
    }
}

/// Unparseable values sort before parseable ones.
fn compare_parsed(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

impl FromStr for BuiltinSorter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(BuiltinSorter::Number),
            "date" => Ok(BuiltinSorter::Date),
            "string" => Ok(BuiltinSorter::String),
            "stringCaseInsensitive" => Ok(BuiltinSorter::StringCaseInsensitive),
            "natural" => Ok(BuiltinSorter::Natural),
            other => Err(format!("unknown sorter '{}'", other)),
        }
    }
}

impl fmt::Display for BuiltinSorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// TYPE DETECTION
// ============================================================================

const DETECTION_SAMPLE_SIZE: usize = 10;

/// Majority vote over the first ten values (empties skipped):
/// number, then date (ISO `YYYY-MM-DD` prefix), then string.
pub fn detect_data_type(values: &[Value]) -> BuiltinSorter {
    let mut numbers = 0usize;
    let mut dates = 0usize;
    let mut strings = 0usize;

    for value in values.iter().take(DETECTION_SAMPLE_SIZE) {
        if value.is_empty() {
            continue;
        }
        if looks_numeric(value) {
            numbers += 1;
        } else if looks_like_iso_date(value) {
            dates += 1;
        } else {
            strings += 1;
        }
    }

    if numbers > dates && numbers > strings {
        BuiltinSorter::Number
    } else if dates > strings {
        BuiltinSorter::Date
    } else if strings > 0 {
        BuiltinSorter::String
    } else {
        BuiltinSorter::Natural
    }
}

fn looks_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        other => !other.parse_float().is_nan() && other.to_number().is_finite(),
    }
}

fn looks_like_iso_date(value: &Value) -> bool {
    let Value::Text(s) = value else {
        return false;
    };
    let b = s.as_bytes();
    let iso_prefix = b.len() >= 10
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit);
    iso_prefix && value.to_datetime().is_some()
}

// ============================================================================
// SORTER CONFIGURATION
// ============================================================================

/// How one attribute should be sorted.
#[derive(Clone)]
pub enum SorterSpec {
    Builtin(BuiltinSorter),
    /// Sample values; the sorter is picked by type detection.
    Samples(Vec<Value>),
    Function(Comparator),
}

impl SorterSpec {
    /// Unknown names fall back to natural sort.
    pub fn named(name: &str) -> Self {
        SorterSpec::Builtin(name.parse().unwrap_or(BuiltinSorter::Natural))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        SorterSpec::Function(Arc::new(f))
    }

    pub fn resolve(&self) -> Comparator {
        match self {
            SorterSpec::Builtin(builtin) => builtin.comparator(),
            SorterSpec::Samples(samples) => detect_data_type(samples).comparator(),
            SorterSpec::Function(f) => f.clone(),
        }
    }
}

impl fmt::Debug for SorterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SorterSpec::Builtin(b) => write!(f, "Builtin({})", b),
            SorterSpec::Samples(s) => write!(f, "Samples({} values)", s.len()),
            SorterSpec::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<BuiltinSorter> for SorterSpec {
    fn from(b: BuiltinSorter) -> Self {
        SorterSpec::Builtin(b)
    }
}

/// Per-attribute sorter configuration: a map, or a single lookup function.
#[derive(Clone)]
pub enum Sorters {
    Map(FxHashMap<String, SorterSpec>),
    Function(SorterLookup),
}

impl Default for Sorters {
    fn default() -> Self {
        Sorters::Map(FxHashMap::default())
    }
}

impl Sorters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<Comparator> + Send + Sync + 'static,
    {
        Sorters::Function(Arc::new(f))
    }

    /// Sets the sorter for one attribute. On a lookup function the entry
    /// takes precedence over what the function returns.
    pub fn insert(&mut self, attr: impl Into<String>, spec: impl Into<SorterSpec>) {
        let attr = attr.into();
        let spec = spec.into();
        match self {
            Sorters::Map(map) => {
                map.insert(attr, spec);
            }
            Sorters::Function(lookup) => {
                let fallback = lookup.clone();
                let comparator = spec.resolve();
                *self = Sorters::Function(Arc::new(move |a: &str| {
                    if a == attr {
                        Some(comparator.clone())
                    } else {
                        fallback(a)
                    }
                }));
            }
        }
    }

    pub fn with(mut self, attr: impl Into<String>, spec: impl Into<SorterSpec>) -> Self {
        self.insert(attr, spec);
        self
    }
}

impl fmt::Debug for Sorters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sorters::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Sorters::Function(_) => f.write_str("Sorters::Function(..)"),
        }
    }
}

/// Resolves the comparator for `attr`: configured function, then configured
/// spec, then detection over the observed values, then natural sort.
pub fn get_sort(sorters: &Sorters, attr: &str, observed: Option<&[Value]>) -> Comparator {
    match sorters {
        Sorters::Function(lookup) => {
            if let Some(comparator) = lookup(attr) {
                return comparator;
            }
        }
        Sorters::Map(map) => {
            if let Some(spec) = map.get(attr) {
                return spec.resolve();
            }
        }
    }
    match observed {
        Some(values) if !values.is_empty() => detect_data_type(values).comparator(),
        _ => BuiltinSorter::Natural.comparator(),
    }
}

/// Comparator that puts the listed values first, in list order. Values that
/// only match a listed string after lowercasing come next, then the rest in
/// natural order.
pub fn sort_as(order: &[Value]) -> Comparator {
    let mut exact: FxHashMap<String, usize> = FxHashMap::default();
    let mut lowered: FxHashMap<String, usize> = FxHashMap::default();
    for (i, value) in order.iter().enumerate() {
        exact.insert(value.to_string(), i);
        if let Value::Text(s) = value {
            lowered.insert(s.to_lowercase(), i);
        }
    }

    Arc::new(move |a: &Value, b: &Value| {
        let (ka, kb) = (a.to_string(), b.to_string());
        match (exact.get(&ka), exact.get(&kb)) {
            (Some(x), Some(y)) => return x.cmp(y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            _ => {}
        }
        match (lowered.get(&ka), lowered.get(&kb)) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            _ => natural_sort(a, b),
        }
    })
}

/// Compares composite keys position by position; first non-equal decides.
pub fn compare_keys(comparators: &[Comparator], a: &[Value], b: &[Value]) -> Ordering {
    for (i, cmp) in comparators.iter().enumerate() {
        let ord = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => cmp(x, y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

// ============================================================================
// ORDERING MODES
// ============================================================================

/// Global ordering of row or column keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AxisOrder {
    #[default]
    #[serde(rename = "key_a_to_z")]
    KeyAToZ,
    #[serde(rename = "value_a_to_z")]
    ValueAToZ,
    #[serde(rename = "value_z_to_a")]
    ValueZToA,
}

/// Per-attribute direction override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

impl SortDirection {
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(x: f64) -> Value {
        Value::Number(x)
    }

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    #[test]
    fn test_natural_sort_reference_order() {
        let sorted = vec![
            Value::Null,
            n(f64::NAN),
            n(f64::NEG_INFINITY),
            t("-Infinity"),
            n(-3.0),
            t("-3"),
            n(-2.0),
            t("-2"),
            n(-1.0),
            t("-1"),
            n(0.0),
            t("2e-1"),
            n(1.0),
            t("01"),
            t("1"),
            n(2.0),
            t("002"),
            t("002e0"),
            t("02"),
            t("2"),
            t("2e-0"),
            n(3.0),
            n(10.0),
            t("10"),
            t("11"),
            t("12"),
            t("1e2"),
            t("112"),
            n(f64::INFINITY),
            t("Infinity"),
            t("1a"),
            t("2a"),
            t("12a"),
            t("20a"),
            t("A"),
            t("A"),
            t("NaN"),
            t("a"),
            t("a"),
            t("a01"),
            t("a012"),
            t("a02"),
            t("a1"),
            t("a2"),
            t("a12"),
            t("a12"),
            t("a21"),
            t("a21"),
            t("b"),
            t("c"),
            t("d"),
            t("null"),
        ];

        let mut shuffled = sorted.clone();
        shuffled.reverse();
        shuffled.rotate_left(17);
        shuffled.sort_by(natural_sort);

        let render = |vs: &[Value]| vs.iter().map(|v| format!("{:?}", v)).collect::<Vec<_>>();
        assert_eq!(render(&shuffled), render(&sorted));
    }

    #[test]
    fn test_natural_sort_digit_runs() {
        assert_eq!(natural_sort(&t("a2"), &t("a10")), Ordering::Less);
        assert_eq!(natural_sort(&t("x0b"), &t("x00a")), Ordering::Greater);
        assert_eq!(natural_sort(&t("a1b"), &t("a1")), Ordering::Greater);
    }

    #[test]
    fn test_builtin_sorters_put_empties_first() {
        for sorter in [
            BuiltinSorter::Number,
            BuiltinSorter::Date,
            BuiltinSorter::String,
            BuiltinSorter::StringCaseInsensitive,
        ] {
            assert_eq!(sorter.compare(&t(""), &t("x")), Ordering::Less, "{}", sorter);
            assert_eq!(sorter.compare(&Value::Null, &n(1.0)), Ordering::Less, "{}", sorter);
            assert_eq!(sorter.compare(&Value::Null, &t("")), Ordering::Equal, "{}", sorter);
        }
    }

    #[test]
    fn test_number_and_date_sorters() {
        let num = BuiltinSorter::Number;
        assert_eq!(num.compare(&t("10"), &t("9")), Ordering::Greater);
        assert_eq!(num.compare(&t("abc"), &n(-5.0)), Ordering::Less);

        let date = BuiltinSorter::Date;
        assert_eq!(date.compare(&t("2020-01-02"), &t("2019-12-31")), Ordering::Greater);
        assert_eq!(date.compare(&t("nope"), &t("2019-12-31")), Ordering::Less);
    }

    #[test]
    fn test_case_insensitive_sorter() {
        let ci = BuiltinSorter::StringCaseInsensitive;
        assert_eq!(ci.compare(&t("apple"), &t("Banana")), Ordering::Less);
        assert_eq!(BuiltinSorter::String.compare(&t("apple"), &t("Banana")), Ordering::Greater);
    }

    #[test]
    fn test_detect_data_type() {
        assert_eq!(detect_data_type(&[n(1.0), t("2"), t("3.5")]), BuiltinSorter::Number);
        assert_eq!(
            detect_data_type(&[t("2020-01-01"), t("2021-05-06"), t("x")]),
            BuiltinSorter::Date
        );
        assert_eq!(detect_data_type(&[t("a"), t("b"), n(1.0)]), BuiltinSorter::String);
        assert_eq!(detect_data_type(&[t(""), Value::Null]), BuiltinSorter::Natural);
        assert_eq!(detect_data_type(&[]), BuiltinSorter::Natural);
    }

    #[test]
    fn test_get_sort_resolution_order() {
        let sorters = Sorters::new()
            .with("n", SorterSpec::named("number"))
            .with("s", SorterSpec::Samples(vec![t("x"), t("y")]))
            .with("f", SorterSpec::function(|a, b| natural_sort(b, a)));

        let by_number = get_sort(&sorters, "n", None);
        assert_eq!(by_number(&t("10"), &t("9")), Ordering::Greater);

        let by_samples = get_sort(&sorters, "s", None);
        assert_eq!(by_samples(&t("a10"), &t("a9")), Ordering::Less);

        let reversed = get_sort(&sorters, "f", None);
        assert_eq!(reversed(&n(1.0), &n(2.0)), Ordering::Greater);

        let observed = [n(1.0), n(2.0)];
        let detected = get_sort(&sorters, "other", Some(&observed));
        assert_eq!(detected(&t("abc"), &n(1.0)), Ordering::Less);

        let fallback = get_sort(&sorters, "other", None);
        assert_eq!(fallback(&t("a2"), &t("a10")), Ordering::Less);
    }

    #[test]
    fn test_function_sorters() {
        let sorters = Sorters::from_fn(|attr| {
            (attr == "desc")
                .then(|| Arc::new(|a: &Value, b: &Value| natural_sort(b, a)) as Comparator)
        })
        .with("asc", BuiltinSorter::Natural);

        assert_eq!(get_sort(&sorters, "desc", None)(&n(1.0), &n(2.0)), Ordering::Greater);
        assert_eq!(get_sort(&sorters, "asc", None)(&n(1.0), &n(2.0)), Ordering::Less);
        assert_eq!(get_sort(&sorters, "x", None)(&n(1.0), &n(2.0)), Ordering::Less);
    }

    #[test]
    fn test_sort_as() {
        let mut values = vec![n(5.0), n(2.0), n(3.0), n(4.0), n(1.0)];
        values.sort_by(|a, b| sort_as(&[n(4.0), n(3.0), n(2.0)])(a, b));
        assert_eq!(values, vec![n(4.0), n(3.0), n(2.0), n(1.0), n(5.0)]);

        let cmp = sort_as(&[t("Ab"), t("Aa")]);
        let mut words = vec![t("Ab"), t("aA"), t("aa"), t("ab")];
        words.sort_by(|a, b| cmp(a, b));
        assert_eq!(words, vec![t("Ab"), t("ab"), t("aa"), t("aA")]);
    }

    #[test]
    fn test_compare_keys_left_to_right() {
        let cmps = vec![BuiltinSorter::Natural.comparator(), BuiltinSorter::Number.comparator()];
        assert_eq!(compare_keys(&cmps, &[t("a"), n(2.0)], &[t("a"), n(10.0)]), Ordering::Less);
        assert_eq!(compare_keys(&cmps, &[t("b"), n(2.0)], &[t("a"), n(10.0)]), Ordering::Greater);
        assert_eq!(compare_keys(&cmps, &[t("a"), n(2.0)], &[t("a"), n(2.0)]), Ordering::Equal);
    }

    #[test]
    fn test_ordering_serde_spellings() {
        assert_eq!(serde_json::to_string(&AxisOrder::ValueZToA).unwrap(), "\"value_z_to_a\"");
        assert_eq!(serde_json::from_str::<SortDirection>("\"DESC\"").unwrap(), SortDirection::Desc);
        assert_eq!(
            serde_json::from_str::<BuiltinSorter>("\"stringCaseInsensitive\"").unwrap(),
            BuiltinSorter::StringCaseInsensitive
        );
    }
}
