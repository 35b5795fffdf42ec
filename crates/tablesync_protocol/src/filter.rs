//! Filter expressions over table rows.
//!
//! A [`Filter`] is both evaluated locally (against a [`Row`]) and rendered
//! to an OData-style `$filter` string for transports and logs.

use crate::system;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use tablesync_storage::Row;

/// A constant a column is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
    /// An instant, matched against RFC 3339 string columns.
    Timestamp(DateTime<Utc>),
}

impl Literal {
    /// Compares a column value with this literal.
    ///
    /// Returns `None` when the two are not comparable (different kinds, or a
    /// string column that does not parse as a timestamp).
    fn compare(&self, value: &Value) -> Option<Ordering> {
        match (value, self) {
            (Value::Null, Literal::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
            (Value::Number(a), Literal::Integer(b)) => match a.as_i64() {
                Some(a) => Some(a.cmp(b)),
                None => a.as_f64()?.partial_cmp(&(*b as f64)),
            },
            (Value::Number(a), Literal::Float(b)) => a.as_f64()?.partial_cmp(b),
            (Value::String(a), Literal::Text(b)) => Some(a.as_str().cmp(b.as_str())),
            (Value::String(a), Literal::Timestamp(b)) => {
                system::parse_timestamp(a).map(|a| a.cmp(b))
            }
            _ => None,
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Integer(i64::from(i))
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Text(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Text(s)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(t: DateTime<Utc>) -> Self {
        Literal::Timestamp(t)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Timestamp(t) => {
                write!(f, "datetimeoffset'{}'", system::format_timestamp(t))
            }
        }
    }
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
}

impl CompareOp {
    fn keyword(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        }
    }

    fn holds(&self, ordering: Option<Ordering>) -> bool {
        match self {
            CompareOp::Eq => ordering == Some(Ordering::Equal),
            CompareOp::Ne => ordering != Some(Ordering::Equal),
            CompareOp::Gt => ordering == Some(Ordering::Greater),
            CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Lt => ordering == Some(Ordering::Less),
            CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// A boolean predicate over the columns of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field op value`.
    Compare {
        /// Column name.
        field: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        value: Literal,
    },
    /// Both sides hold.
    And(Box<Filter>, Box<Filter>),
    /// Either side holds.
    Or(Box<Filter>, Box<Filter>),
    /// The inner filter does not hold.
    Not(Box<Filter>),
}

impl Filter {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Literal>) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field eq value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// `field ne value`.
    pub fn ne(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// `field gt value`.
    pub fn gt(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// `field ge value`.
    pub fn ge(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    /// `field lt value`.
    pub fn lt(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// `field le value`.
    pub fn le(field: impl Into<String>, value: impl Into<Literal>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    /// `self and other`.
    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    /// `self or other`.
    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// `not self`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Evaluates the filter against a row. A missing column reads as `null`.
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Compare { field, op, value } => {
                let column = row.get(field).unwrap_or(&Value::Null);
                op.holds(value.compare(column))
            }
            Filter::And(a, b) => a.matches(row) && b.matches(row),
            Filter::Or(a, b) => a.matches(row) || b.matches(row),
            Filter::Not(inner) => !inner.matches(row),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { field, op, value } => {
                write!(f, "({field} {} {value})", op.keyword())
            }
            Filter::And(a, b) => write!(f, "({a} and {b})"),
            Filter::Or(a, b) => write!(f, "({a} or {b})"),
            Filter::Not(inner) => write!(f, "not{inner}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn compare_numbers_and_text() {
        let r = row(json!({"n": 5, "x": 2.5, "s": "milk", "b": true}));
        assert!(Filter::gt("n", 4).matches(&r));
        assert!(!Filter::gt("n", 5).matches(&r));
        assert!(Filter::le("x", 2.5).matches(&r));
        assert!(Filter::lt("x", 3).matches(&r));
        assert!(Filter::eq("s", "milk").matches(&r));
        assert!(Filter::eq("b", true).matches(&r));
    }

    #[test]
    fn missing_column_reads_as_null() {
        let r = row(json!({"id": "a"}));
        assert!(Filter::eq("owner", Literal::Null).matches(&r));
        assert!(Filter::ne("owner", "bob").matches(&r));
        assert!(!Filter::gt("owner", 1).matches(&r));
    }

    #[test]
    fn compare_timestamps() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let r = row(json!({"updatedAt": "2024-03-01T00:00:00Z"}));
        assert!(Filter::ge("updatedAt", t).matches(&r));
        assert!(!Filter::gt("updatedAt", t).matches(&r));
        assert!(Filter::ge("updatedAt", system::beginning_of_time()).matches(&r));

        let bad = row(json!({"updatedAt": "garbage"}));
        assert!(!Filter::ge("updatedAt", t).matches(&bad));
    }

    #[test]
    fn boolean_combinators() {
        let r = row(json!({"n": 1, "s": "a"}));
        let f = Filter::eq("n", 1).and(Filter::eq("s", "b"));
        assert!(!f.matches(&r));
        assert!(f.clone().not().matches(&r));
        assert!(Filter::eq("n", 2).or(Filter::eq("s", "a")).matches(&r));
    }

    #[test]
    fn renders_odata() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let f = Filter::eq("title", "it's").and(Filter::ge("updatedAt", t).not());
        assert_eq!(
            f.to_string(),
            "((title eq 'it''s') and not(updatedAt ge datetimeoffset'2024-03-01T00:00:00Z'))"
        );
        assert_eq!(Filter::eq("x", 1.0).to_string(), "(x eq 1.0)");
        assert_eq!(Filter::eq("x", Literal::Null).to_string(), "(x eq null)");
    }
}
