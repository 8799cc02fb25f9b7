//! Text to typed value coercion for export rows
//!
//! Export CSVs carry every value as text. [`RecordCoercer`] converts each
//! declared column to its schema type. It never fails: values that cannot be
//! represented (malformed numbers, NaN, infinities) become `null` and are
//! logged at debug level.

use crate::schema::{FieldSchema, SemanticType};
use serde_json::{Map, Number, Value};
use std::str::FromStr;
use tracing::debug;

/// A typed record: column name to JSON value, in file column order
pub type Record = Map<String, Value>;

/// Converts raw string rows into typed records
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordCoercer;

impl RecordCoercer {
    /// Coerce a raw row against a schema
    ///
    /// Columns not declared in `schema` pass through as strings; `None`
    /// values stay `null` regardless of type.
    pub fn coerce<I, K>(&self, row: I, schema: &FieldSchema) -> Record
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let mut record = Record::new();
        for (name, value) in row {
            let name = name.into();
            let value = match (value, schema.get(&name)) {
                (None, _) => Value::Null,
                (Some(text), None) => Value::String(text),
                (Some(text), Some(property)) => {
                    coerce_value(&name, text, property.semantic_type)
                }
            };
            record.insert(name, value);
        }
        record
    }
}

fn coerce_value(column: &str, text: String, semantic_type: SemanticType) -> Value {
    if semantic_type.is_numeric() {
        coerce_number(column, &text)
    } else if semantic_type == SemanticType::Boolean {
        Value::Bool(text.to_lowercase() == "true")
    } else {
        Value::String(text)
    }
}

fn coerce_number(column: &str, text: &str) -> Value {
    match parse_decimal(text) {
        Some(number) => Value::Number(number),
        None if is_non_finite_literal(text) => {
            debug!(
                column,
                value = text,
                "non-finite value is not supported as a JSON number, handling as null"
            );
            Value::Null
        }
        None => {
            debug!(column, value = text, "handling invalid decimal as null");
            Value::Null
        }
    }
}

/// Parse a decimal string into an exact JSON number
///
/// Accepts surrounding whitespace, a leading `+`, leading zeros, a bare
/// leading or trailing decimal point and an exponent. Returns `None` for
/// anything else, including NaN and infinity spellings.
pub fn parse_decimal(text: &str) -> Option<Number> {
    let normalized = normalize_decimal(text)?;
    Number::from_str(&normalized).ok()
}

fn normalize_decimal(text: &str) -> Option<String> {
    let s = text.trim();
    let (sign, rest) = match s.as_bytes().first()? {
        b'-' => ("-", &s[1..]),
        b'+' => ("", &s[1..]),
        _ => ("", s),
    };

    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(i) => (&rest[..i], Some(&rest[i + 1..])),
        None => (rest, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    let int_part = match int_part.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };

    let mut out = format!("{sign}{int_part}");
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }

    if let Some(exponent) = exponent {
        let (exp_sign, exp_digits) = match exponent.as_bytes().first() {
            Some(b'-') => ("-", &exponent[1..]),
            Some(b'+') => ("", &exponent[1..]),
            _ => ("", exponent),
        };
        if exp_digits.is_empty() || !all_digits(exp_digits) {
            return None;
        }
        out.push('e');
        out.push_str(exp_sign);
        out.push_str(exp_digits);
    }

    Some(out)
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

fn is_non_finite_literal(text: &str) -> bool {
    let lowered = text.trim().trim_start_matches(['+', '-']).to_ascii_lowercase();
    matches!(lowered.as_str(), "nan" | "snan" | "inf" | "infinity")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::from_types([
            ("ContactID", SemanticType::int32()),
            ("Score", SemanticType::Number),
            ("Acknowledged", SemanticType::Boolean),
            ("TimeStamp", SemanticType::DateTime),
        ])
    }

    fn coerce_one(column: &str, value: Option<&str>) -> Value {
        let record = RecordCoercer.coerce([(column, value.map(String::from))], &schema());
        record[column].clone()
    }

    #[test]
    fn integers_and_numbers_keep_exact_digits() {
        assert_eq!(coerce_one("ContactID", Some("1")), json!(1));
        assert_eq!(
            coerce_one("Score", Some("0.1000000000000000055511151231257827")).to_string(),
            "0.1000000000000000055511151231257827"
        );
        assert_eq!(coerce_one("Score", Some("-2.5")).to_string(), "-2.5");
    }

    #[test]
    fn decimal_spellings_are_normalized() {
        let cases = [
            (" 42 ", "42"),
            ("+7", "7"),
            ("007", "7"),
            (".5", "0.5"),
            ("5.", "5"),
            ("1E3", "1e3"),
            ("-1.5e-2", "-1.5e-2"),
            ("0", "0"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                parse_decimal(input).map(|n| n.to_string()).as_deref(),
                Some(expected),
                "{input:?}"
            );
        }
    }

    #[test]
    fn malformed_and_non_finite_numbers_become_null() {
        for input in [
            "", " ", "abc", "1.2.3", "NaN", "nan", "sNaN", "Infinity", "-Infinity", "inf",
            "1e", "e5", "--1", "1,000", ".",
        ] {
            assert_eq!(coerce_one("Score", Some(input)), Value::Null, "{input:?}");
        }
    }

    #[test]
    fn booleans_are_true_only_for_true_literal() {
        assert_eq!(coerce_one("Acknowledged", Some("TRUE")), json!(true));
        assert_eq!(coerce_one("Acknowledged", Some("True")), json!(true));
        assert_eq!(coerce_one("Acknowledged", Some("false")), json!(false));
        assert_eq!(coerce_one("Acknowledged", Some("0")), json!(false));
        assert_eq!(coerce_one("Acknowledged", Some("")), json!(false));
        assert_eq!(coerce_one("Acknowledged", None), Value::Null);
    }

    #[test]
    fn null_is_preserved_for_every_type() {
        for column in ["ContactID", "Score", "Acknowledged", "TimeStamp", "Extra"] {
            assert_eq!(coerce_one(column, None), Value::Null, "{column}");
        }
    }

    #[test]
    fn other_types_and_unknown_columns_pass_through() {
        let record = RecordCoercer.coerce(
            [
                ("TimeStamp", Some("2024-01-01T00:00:00Z".to_string())),
                ("Unexpected", Some("12".to_string())),
            ],
            &schema(),
        );

        assert_eq!(record["TimeStamp"], json!("2024-01-01T00:00:00Z"));
        assert_eq!(record["Unexpected"], json!("12"));
        assert!(!record.contains_key("ContactID"), "no padding for missing columns");
    }

    #[test]
    fn record_preserves_row_column_order() {
        let record = RecordCoercer.coerce(
            [
                ("TimeStamp", Some("t".to_string())),
                ("ContactID", Some("3".to_string())),
                ("Score", Some("1".to_string())),
            ],
            &schema(),
        );
        let keys: Vec<&String> = record.keys().collect();
        assert_eq!(keys, vec!["TimeStamp", "ContactID", "Score"]);
    }
}
