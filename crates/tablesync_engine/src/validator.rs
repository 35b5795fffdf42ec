//! Query and identity validation.
//!
//! Pull owns ordering and paging so that its cursor stays correct; a query
//! that tries to order, page, project or count is rejected before any I/O.

use crate::error::{PullError, PullResult};
use tablesync_protocol::SyncQuery;

/// Checks that a query only names a table and a filter.
///
/// # Errors
///
/// Returns [`PullError::InvalidQuery`] if the table name is empty or the
/// query specifies ordering, skip, take, a projection or a total count.
pub fn validate_query(query: &SyncQuery) -> PullResult<()> {
    if query.table.is_empty() {
        return Err(PullError::InvalidQuery("table name must not be empty".into()));
    }
    if !query.ordering.is_empty() {
        return Err(unsupported("ordering"));
    }
    if query.skip.is_some() {
        return Err(unsupported("skip"));
    }
    if query.take.is_some() {
        return Err(unsupported("take"));
    }
    if !query.selection.is_empty() {
        return Err(unsupported("selection"));
    }
    if query.include_total_count {
        return Err(unsupported("total count"));
    }
    Ok(())
}

/// Checks a pull identity. `None` (a vanilla pull) is always valid.
///
/// # Errors
///
/// Returns [`PullError::InvalidSettings`] if the identity is empty, longer
/// than `max_len` characters, or contains control characters.
pub fn validate_identity(identity: Option<&str>, max_len: usize) -> PullResult<()> {
    let Some(identity) = identity else {
        return Ok(());
    };
    if identity.is_empty() {
        return Err(PullError::InvalidSettings("pull identity must not be empty".into()));
    }
    if identity.chars().count() > max_len {
        return Err(PullError::InvalidSettings(format!(
            "pull identity is longer than {max_len} characters"
        )));
    }
    if identity.chars().any(char::is_control) {
        return Err(PullError::InvalidSettings(
            "pull identity contains control characters".into(),
        ));
    }
    Ok(())
}

fn unsupported(clause: &str) -> PullError {
    PullError::InvalidQuery(format!("pull does not support queries with {clause}"))
}
