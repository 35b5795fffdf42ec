//! Record id validation.

use crate::error::{ProtocolError, ProtocolResult};
use serde_json::Value;
use tablesync_storage::RowId;

/// Maximum length of a string record id, in characters.
pub const MAX_ID_LENGTH: usize = 255;

const FORBIDDEN_ID_CHARS: &[char] = &['"', '+', '?', '\\', '/', '`'];

/// Validates a remote record id and converts it to a [`RowId`].
///
/// A string id must be non-empty, at most [`MAX_ID_LENGTH`] characters, not
/// `.` or `..`, and free of control characters and of `" + ? \ / `` ` ``.
/// An integer id must be positive.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidId`] for anything else, including a
/// missing id.
pub fn validate_record_id(value: Option<&Value>) -> ProtocolResult<RowId> {
    match value {
        None | Some(Value::Null) => Err(ProtocolError::invalid_id("record has no id")),
        Some(Value::String(text)) => validate_text_id(text).map(|_| RowId::Text(text.clone())),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(i) if i > 0 => Ok(RowId::Integer(i)),
            _ => Err(ProtocolError::invalid_id(format!(
                "{number} is not a positive integer"
            ))),
        },
        Some(other) => Err(ProtocolError::invalid_id(format!(
            "{other} is neither a string nor an integer"
        ))),
    }
}

fn validate_text_id(text: &str) -> ProtocolResult<()> {
    if text.is_empty() {
        return Err(ProtocolError::invalid_id("id is empty"));
    }
    if text.chars().count() > MAX_ID_LENGTH {
        return Err(ProtocolError::invalid_id(format!(
            "id is longer than {MAX_ID_LENGTH} characters"
        )));
    }
    if text == "." || text == ".." {
        return Err(ProtocolError::invalid_id(format!("{text:?} is reserved")));
    }
    if let Some(c) = text
        .chars()
        .find(|c| c.is_control() || FORBIDDEN_ID_CHARS.contains(c))
    {
        return Err(ProtocolError::invalid_id(format!(
            "{text:?} contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn accepts_plain_ids() {
        assert_eq!(
            validate_record_id(Some(&json!("abc-123"))),
            Ok(RowId::from("abc-123"))
        );
        assert_eq!(validate_record_id(Some(&json!(5))), Ok(RowId::from(5)));
    }

    #[test]
    fn rejects_missing_and_empty() {
        assert!(validate_record_id(None).is_err());
        assert!(validate_record_id(Some(&Value::Null)).is_err());
        assert!(validate_record_id(Some(&json!(""))).is_err());
    }

    #[test]
    fn rejects_reserved_and_forbidden() {
        for bad in [".", "..", "a/b", "a\\b", "a?b", "a+b", "a\"b", "a`b", "a\nb"] {
            assert!(
                validate_record_id(Some(&json!(bad))).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_positive_and_non_integer_numbers() {
        assert!(validate_record_id(Some(&json!(0))).is_err());
        assert!(validate_record_id(Some(&json!(-4))).is_err());
        assert!(validate_record_id(Some(&json!(1.5))).is_err());
        assert!(validate_record_id(Some(&json!(true))).is_err());
    }

    #[test]
    fn rejects_overlong() {
        let long = "x".repeat(MAX_ID_LENGTH + 1);
        assert!(validate_record_id(Some(&json!(long))).is_err());
        let max = "x".repeat(MAX_ID_LENGTH);
        assert!(validate_record_id(Some(&json!(max))).is_ok());
    }

    proptest! {
        #[test]
        fn alphanumeric_ids_are_valid(id in "[a-zA-Z0-9_-]{1,64}") {
            prop_assert_eq!(
                validate_record_id(Some(&json!(id.clone()))),
                Ok(RowId::Text(id))
            );
        }
    }
}
