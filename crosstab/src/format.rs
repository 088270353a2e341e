//! FILENAME: crosstab/src/format.rs
//! Number formatting for aggregator output.

use serde::{Deserialize, Serialize};

use crate::value::{number_to_string, Value};

/// Fixed-point number format with grouping, scaling and affixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberFormat {
    pub digits_after_decimal: usize,
    /// Multiplied into the value before formatting (100 for percentages).
    pub scaler: f64,
    /// Empty disables grouping.
    pub thousands_sep: String,
    pub decimal_sep: String,
    pub prefix: String,
    pub suffix: String,
    /// Skip rounding, grouping and affixes; render the scaled value as is.
    pub show_original: bool,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat {
            digits_after_decimal: 2,
            scaler: 1.0,
            thousands_sep: ",".to_string(),
            decimal_sep: ".".to_string(),
            prefix: String::new(),
            suffix: String::new(),
            show_original: false,
        }
    }
}

impl NumberFormat {
    /// `1,234.57`
    pub fn us() -> Self {
        Self::default()
    }

    /// `1,235`
    pub fn us_integer() -> Self {
        NumberFormat {
            digits_after_decimal: 0,
            ..Self::default()
        }
    }

    /// `12.3%`
    pub fn us_percent() -> Self {
        NumberFormat {
            digits_after_decimal: 1,
            scaler: 100.0,
            suffix: "%".to_string(),
            ..Self::default()
        }
    }

    /// Non-finite input formats as the empty string.
    pub fn format_number(&self, x: f64) -> String {
        if !x.is_finite() {
            return String::new();
        }
        let scaled = self.scaler * x;
        if self.show_original {
            return number_to_string(scaled);
        }

        let fixed = format!("{:.*}", self.digits_after_decimal, scaled);
        let body = if self.thousands_sep.is_empty() {
            fixed.replacen('.', &self.decimal_sep, 1)
        } else {
            add_separators(&fixed, &self.thousands_sep, &self.decimal_sep)
        };
        format!("{}{}{}", self.prefix, body, self.suffix)
    }

    /// Text is coerced to a number first; null formats as the empty string.
    pub fn format(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            other => self.format_number(other.to_number()),
        }
    }
}

fn add_separators(s: &str, thousands_sep: &str, decimal_sep: &str) -> String {
    let (integer_part, decimal_part) = match s.split_once('.') {
        Some((int, dec)) => (int, Some(dec)),
        None => (s, None),
    };

    let negative = integer_part.starts_with('-');
    let digits: Vec<char> = integer_part.chars().filter(|c| c.is_ascii_digit()).collect();
    let len = digits.len();

    let mut result = String::with_capacity(s.len() + len / 3 * thousands_sep.len());
    if negative {
        result.push('-');
    }
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push_str(thousands_sep);
        }
        result.push(*c);
    }

    if let Some(decimal) = decimal_part {
        result.push_str(decimal_sep);
        result.push_str(decimal);
    }

    result
}

// ============================================================================
// FORMATTER
// ============================================================================

/// How an aggregator renders its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Formatter {
    Number(NumberFormat),
    /// Values are shown as text (unique-value lists).
    Text,
    /// Numeric values use the number format, anything else is shown as text
    /// (first/last over non-numeric attributes).
    NumberOrText(NumberFormat),
}

impl Formatter {
    pub fn format(&self, value: &Value) -> String {
        match self {
            Formatter::Number(nf) => nf.format(value),
            Formatter::Text => match value {
                Value::Null => String::new(),
                other => other.to_string(),
            },
            Formatter::NumberOrText(nf) => match value {
                Value::Text(s) if s.trim().is_empty() || value.to_number().is_nan() => s.clone(),
                other => nf.format(other),
            },
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::Number(NumberFormat::us())
    }
}

impl From<NumberFormat> for Formatter {
    fn from(nf: NumberFormat) -> Self {
        Formatter::Number(nf)
    }
}
