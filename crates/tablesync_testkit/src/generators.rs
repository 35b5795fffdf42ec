//! Property-based test generators using proptest.
//!
//! Remote tables are generated with few distinct timestamps so that runs of
//! records sharing one instant, and page boundaries inside such runs, are
//! common.

use crate::fixtures::{at, record};
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use tablesync_storage::Row;

/// Strategy for generating valid string record ids.
pub fn record_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,32}").expect("Invalid regex")
}

/// Strategy for generating change timestamps drawn from a handful of
/// instants.
pub fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..6).prop_map(at)
}

/// Strategy for generating page sizes.
pub fn page_size_strategy() -> impl Strategy<Value = u32> {
    1u32..8
}

/// Strategy for generating a remote table of up to `max_rows` records.
///
/// Ids are the integers `1..=n`; timestamps and delete flags are random.
pub fn remote_table_strategy(max_rows: usize) -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec((instant_strategy(), any::<bool>()), 0..=max_rows).prop_map(
        |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (updated_at, deleted))| record(i as i64 + 1, updated_at, deleted))
                .collect()
        },
    )
}
