//! System columns every synchronized table carries.
//!
//! The remote source stamps each row with an id, a soft-delete flag and the
//! instant it last changed. Pull relies on all three.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde_json::Value;
use tablesync_storage::Row;

/// Primary key column.
pub const ID: &str = tablesync_storage::ID_COLUMN;

/// Soft-delete flag column.
pub const DELETED: &str = "deleted";

/// Change timestamp column.
pub const UPDATED_AT: &str = "updatedAt";

/// The cursor value used when no checkpoint exists.
///
/// This is the minimum representable timestamp, so every row satisfies
/// `updatedAt >= beginning_of_time()`.
pub fn beginning_of_time() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

/// Parses an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Formats a timestamp the way it is stored in rows.
///
/// RFC 3339 only covers years 0 through 9999; instants outside that range
/// (such as [`beginning_of_time`]) fall back to an extended-year form.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    if (0..=9999).contains(&timestamp.year()) {
        timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    } else {
        format!("{timestamp:?}")
    }
}

/// Reads the change timestamp of a row.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingSystemColumn`] if the column is absent or
/// null, and [`ProtocolError::MalformedSystemColumn`] if it is not an
/// RFC 3339 string.
pub fn updated_at(row: &Row) -> ProtocolResult<DateTime<Utc>> {
    match row.get(UPDATED_AT) {
        None | Some(Value::Null) => Err(ProtocolError::MissingSystemColumn {
            column: UPDATED_AT,
        }),
        Some(Value::String(text)) => {
            parse_timestamp(text).ok_or_else(|| ProtocolError::MalformedSystemColumn {
                column: UPDATED_AT,
                reason: format!("{text:?} is not a valid timestamp"),
            })
        }
        Some(other) => Err(ProtocolError::MalformedSystemColumn {
            column: UPDATED_AT,
            reason: format!("expected a timestamp string, found {other}"),
        }),
    }
}

/// Reads the soft-delete flag of a row.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingSystemColumn`] unless the column holds a
/// boolean.
pub fn deleted_flag(row: &Row) -> ProtocolResult<bool> {
    match row.get(DELETED) {
        Some(Value::Bool(flag)) => Ok(*flag),
        _ => Err(ProtocolError::MissingSystemColumn { column: DELETED }),
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
    fn beginning_of_time_precedes_everything() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert!(beginning_of_time() < epoch);
    }

    #[test]
    fn timestamp_round_trip_keeps_millis() {
        let t = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let text = format_timestamp(&t);
        assert!(text.ends_with('Z'));
        assert_eq!(parse_timestamp(&text), Some(t));
    }

    #[test]
    fn format_beginning_of_time() {
        let text = format_timestamp(&beginning_of_time());
        assert!(text.starts_with('-'));
    }

    #[test]
    fn parse_timestamp_normalizes_offsets() {
        let a = parse_timestamp("2024-05-01T12:00:00+02:00").unwrap();
        let b = parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn updated_at_errors() {
        assert_eq!(
            updated_at(&row(json!({"id": "a"}))),
            Err(ProtocolError::MissingSystemColumn { column: UPDATED_AT })
        );
        assert!(matches!(
            updated_at(&row(json!({"updatedAt": "soon"}))),
            Err(ProtocolError::MalformedSystemColumn { .. })
        ));
        assert!(matches!(
            updated_at(&row(json!({"updatedAt": 12}))),
            Err(ProtocolError::MalformedSystemColumn { .. })
        ));
        assert!(updated_at(&row(json!({"updatedAt": "2024-01-01T00:00:00Z"}))).is_ok());
    }

    #[test]
    fn deleted_flag_must_be_boolean() {
        assert_eq!(deleted_flag(&row(json!({"deleted": true}))), Ok(true));
        assert_eq!(deleted_flag(&row(json!({"deleted": false}))), Ok(false));
        assert!(deleted_flag(&row(json!({"deleted": "false"}))).is_err());
        assert!(deleted_flag(&row(json!({}))).is_err());
    }
}
