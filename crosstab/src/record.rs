//! FILENAME: crosstab/src/record.rs
//! Record Source Adapter.
//!
//! Normalizes the supported input shapes (header + rows, keyed records, or a
//! push-style producer) into a stream of `Record`s, applying derived
//! attributes on the way. Derivation never touches the source records: an
//! augmented copy is handed to the consumer instead.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{PivotError, Result};
use crate::value::Value;

// ============================================================================
// RECORD
// ============================================================================

/// One input record: attribute name → value. Attributes may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(FxHashMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(FxHashMap::default())
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.0.get(attr)
    }

    pub fn contains(&self, attr: &str) -> bool {
        self.0.contains_key(attr)
    }

    pub fn insert(&mut self, attr: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(attr.into(), value.into());
    }

    /// The value used when the attribute takes part in a key or a filter:
    /// missing attributes read as the text `"null"`.
    pub fn key_value(&self, attr: &str) -> Value {
        self.0
            .get(attr)
            .cloned()
            .unwrap_or_else(|| Value::text("null"))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ============================================================================
// DERIVED ATTRIBUTES
// ============================================================================

/// Computes a pseudo-attribute from a record. `None` leaves it unset.
pub type Deriver = Arc<dyn Fn(&Record) -> Option<Value> + Send + Sync>;

/// Ordered set of derived attributes. Later derivers see the output of
/// earlier ones.
#[derive(Clone, Default)]
pub struct DerivedAttributes {
    entries: Vec<(String, Deriver)>,
}

impl DerivedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a deriver; re-registering a name replaces it in place.
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Record) -> Option<Value> + Send + Sync + 'static,
    {
        self.insert_deriver(name, Arc::new(f));
    }

    pub fn insert_deriver(&mut self, name: impl Into<String>, deriver: Deriver) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = deriver,
            None => self.entries.push((name, deriver)),
        }
    }

    pub fn with<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Record) -> Option<Value> + Send + Sync + 'static,
    {
        self.insert(name, f);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Returns the record augmented with every derived attribute.
    /// Borrows when there is nothing to derive.
    pub fn apply<'r>(&self, record: &'r Record) -> Cow<'r, Record> {
        if self.entries.is_empty() {
            return Cow::Borrowed(record);
        }
        let mut augmented = record.clone();
        for (name, deriver) in &self.entries {
            if let Some(value) = deriver(&augmented) {
                augmented.0.insert(name.clone(), value);
            }
        }
        Cow::Owned(augmented)
    }
}

impl fmt::Debug for DerivedAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ============================================================================
// RECORD SOURCE
// ============================================================================

/// A push-style producer: it receives a sink and calls it once per record.
pub type PushSource = Arc<dyn Fn(&mut dyn FnMut(Record)) + Send + Sync>;

/// The input shapes the engine can consume.
#[derive(Clone)]
pub enum RecordSource {
    /// Rectangular data; the first row holds the attribute names.
    Rows(Vec<Vec<Value>>),
    /// Keyed records, possibly ragged.
    Records(Vec<Record>),
    /// A producer invoked on every pass over the data.
    Push(PushSource),
}

impl RecordSource {
    pub fn push<F>(f: F) -> Self
    where
        F: Fn(&mut dyn FnMut(Record)) + Send + Sync + 'static,
    {
        RecordSource::Push(Arc::new(f))
    }

    /// Adapts a JSON document: an array of arrays (header first) or an array
    /// of objects with scalar values. Anything else is rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let items = json.as_array().ok_or_else(|| {
            PivotError::UnrecognizedInput(format!("expected an array, got {}", json_kind(json)))
        })?;

        if matches!(items.first(), Some(serde_json::Value::Array(_))) {
            let mut rows = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let cells = item.as_array().ok_or_else(|| {
                    PivotError::UnrecognizedInput(format!(
                        "row {} is {}, expected an array",
                        i,
                        json_kind(item)
                    ))
                })?;
                let row = cells
                    .iter()
                    .map(|cell| {
                        Value::from_json(cell).ok_or_else(|| {
                            PivotError::UnrecognizedInput(format!("row {} holds a nested value", i))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                rows.push(row);
            }
            return Ok(RecordSource::Rows(rows));
        }

        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let object = item.as_object().ok_or_else(|| {
                PivotError::UnrecognizedInput(format!(
                    "record {} is {}, expected an object",
                    i,
                    json_kind(item)
                ))
            })?;
            let mut record = Record::new();
            for (attr, raw) in object {
                let value = Value::from_json(raw).ok_or_else(|| {
                    PivotError::UnrecognizedInput(format!(
                        "record {} attribute '{}' is not a scalar",
                        i, attr
                    ))
                })?;
                record.insert(attr.clone(), value);
            }
            records.push(record);
        }
        Ok(RecordSource::Records(records))
    }

    /// Streams every record through `derived` and into `f`.
    pub fn for_each_record(&self, derived: &DerivedAttributes, f: &mut dyn FnMut(&Record)) {
        match self {
            RecordSource::Rows(rows) => {
                let Some((header, body)) = rows.split_first() else {
                    return;
                };
                let names: Vec<String> = header.iter().map(|h| h.to_string()).collect();
                for row in body {
                    let record: Record = names
                        .iter()
                        .zip(row.iter())
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect();
                    f(&derived.apply(&record));
                }
            }
            RecordSource::Records(records) => {
                for record in records {
                    f(&derived.apply(record));
                }
            }
            RecordSource::Push(producer) => {
                producer(&mut |record: Record| f(&derived.apply(&record)));
            }
        }
    }
}

impl fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::Rows(rows) => write!(f, "Rows({} rows)", rows.len()),
            RecordSource::Records(records) => write!(f, "Records({} records)", records.len()),
            RecordSource::Push(_) => f.write_str("Push(..)"),
        }
    }
}

impl From<Vec<Record>> for RecordSource {
    fn from(records: Vec<Record>) -> Self {
        RecordSource::Records(records)
    }
}

impl From<Vec<Vec<Value>>> for RecordSource {
    fn from(rows: Vec<Vec<Value>>) -> Self {
        RecordSource::Rows(rows)
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ============================================================================
// BUILT-IN DERIVERS
// ============================================================================

pub mod derivers {
    use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

    use super::{Deriver, Record};
    use crate::value::Value;
    use std::sync::Arc;

    pub const MONTH_NAMES_EN: [&str; 12] = [
        "Jan",
        "Feb",
        "Mar",
        "Apr",
        "May",
        "Jun",
        "Jul",
        "Aug",
        "Sep",
        "Oct",
        "Nov",
        "Dec",
    ];

    pub const DAY_NAMES_EN: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

    /// Buckets a numeric attribute into `width`-sized bins: `x - (x % width)`.
    /// Non-numeric input yields NaN.
    pub fn bin(attr: impl Into<String>, width: f64) -> Deriver {
        let attr = attr.into();
        Arc::new(move |record: &Record| {
            let x = record.get(&attr).map_or(f64::NAN, Value::to_number);
            Some(Value::Number(x - (x % width)))
        })
    }

    /// Formats a date attribute with `%y %m %n %d %w %x %H %M %S`
    /// placeholders using English month and day names.
    pub fn date_format(attr: impl Into<String>, pattern: impl Into<String>, utc: bool) -> Deriver {
        date_format_with_names(
            attr,
            pattern,
            utc,
            MONTH_NAMES_EN.map(String::from),
            DAY_NAMES_EN.map(String::from),
        )
    }

    pub fn date_format_with_names(
        attr: impl Into<String>,
        pattern: impl Into<String>,
        utc: bool,
        month_names: [String; 12],
        day_names: [String; 7],
    ) -> Deriver {
        let attr = attr.into();
        let pattern = pattern.into();
        Arc::new(move |record: &Record| {
            let Some(date) = record.get(&attr).and_then(Value::to_datetime) else {
                return Some(Value::text(""));
            };
            let text = if utc {
                render(&pattern, &date, &month_names, &day_names)
            } else {
                let local = Local.from_utc_datetime(&date.naive_utc());
                render(&pattern, &local, &month_names, &day_names)
            };
            Some(Value::Text(text))
        })
    }

    fn render<Tz: TimeZone>(
        pattern: &str,
        date: &DateTime<Tz>,
        month_names: &[String; 12],
        day_names: &[String; 7],
    ) -> String {
        let mut out = String::with_capacity(pattern.len() + 8);
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let Some(p) = chars.next() else {
                out.push('%');
                break;
            };
            let weekday = date.weekday().num_days_from_sunday() as usize;
            match p {
                'y' => out.push_str(&date.year().to_string()),
                'm' => out.push_str(&format!("{:02}", date.month())),
                'n' => out.push_str(&month_names[date.month0() as usize]),
                'd' => out.push_str(&format!("{:02}", date.day())),
                'w' => out.push_str(&day_names[weekday]),
                'x' => out.push_str(&weekday.to_string()),
                'H' => out.push_str(&format!("{:02}", date.hour())),
                'M' => out.push_str(&format!("{:02}", date.minute())),
                'S' => out.push_str(&format!("{:02}", date.second())),
                other => {
                    out.push('%');
                    out.push(other);
                }
            }
        }
        out
    }
}
