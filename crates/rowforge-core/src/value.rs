use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single cell value.
///
/// `Null` is a real variant, never an absent map key, so three-valued
/// logic and NULL-aware uniqueness can be applied uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `Decimal`.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(value) => Some(Decimal::from(*value)),
            Value::Decimal(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Date view; timestamps project onto their date and date-shaped
    /// strings are coerced, matching comparison coercion rules.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(value) => Some(*value),
            Value::Timestamp(value) => Some(value.date()),
            Value::Text(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Typed ordering used by comparisons and bound checks.
    ///
    /// Returns `None` when the operands are incomparable (type mismatch
    /// or either side NULL); callers map that to UNKNOWN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.as_str().cmp(b.as_str())),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Decimal(_), _) | (_, Value::Decimal(_)) => {
                let a = self.as_decimal()?;
                let b = other.as_decimal()?;
                Some(a.cmp(&b))
            }
            (Value::Date(_), _) | (_, Value::Date(_)) => {
                let a = self.as_date()?;
                let b = other.as_date()?;
                Some(a.cmp(&b))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_coerces_int_and_decimal() {
        let a = Value::Int(2);
        let b = Value::Decimal(Decimal::new(150, 2)); // 1.50
        assert_eq!(a.compare(&b), Some(Ordering::Greater));
    }

    #[test]
    fn compare_coerces_date_strings() {
        let a = Value::Date(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap());
        let b = Value::Text("2020-06-01".to_string());
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn null_is_incomparable() {
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert_eq!(Value::Int(1).compare(&Value::Null), None);
    }

    #[test]
    fn mismatched_types_are_incomparable() {
        assert_eq!(Value::Bool(true).compare(&Value::Int(1)), None);
    }
}
