//! Remote source abstraction.

use crate::error::{PullError, PullResult};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use tablesync_protocol::{system, OrderBy, PageQuery, ReadOptions, SortDirection};
use tablesync_storage::{Row, RowId};

/// The remote, authoritative table source.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-memory for testing, etc.). Timeouts and
/// connection handling belong to the implementation.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Reads one page of rows.
    ///
    /// Implementations must honor the page's filter, ordering, `skip` and
    /// `top`, and return soft-deleted rows when `options.include_deleted`
    /// is set. They may return fewer than `top` rows even when more match.
    async fn read(&self, query: &PageQuery, options: &ReadOptions) -> PullResult<Vec<Row>>;
}

/// An in-memory remote source.
///
/// Evaluates page queries against rows held in memory, the way a server
/// would. Useful for tests and offline tooling.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    max_page_size: Option<u32>,
    reads: Mutex<Vec<PageQuery>>,
    failures: Mutex<VecDeque<PullError>>,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every response at `size` rows, whatever the page asks for.
    pub fn with_max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = Some(size);
        self
    }

    /// Inserts a row, replacing any row with the same id.
    ///
    /// Replaced rows keep their position, so rows sharing a timestamp keep
    /// a stable order.
    pub fn put(&self, table: &str, row: Row) {
        let id = row.get(system::ID).and_then(RowId::from_value);
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        let existing = id.as_ref().and_then(|id| {
            rows.iter()
                .position(|r| r.get(system::ID).and_then(RowId::from_value).as_ref() == Some(id))
        });
        match existing {
            Some(index) => rows[index] = row,
            None => rows.push(row),
        }
    }

    /// Inserts several rows.
    pub fn put_all(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            self.put(table, row);
        }
    }

    /// Makes the next read fail with `error`.
    pub fn fail_next_read(&self, error: PullError) {
        self.failures.lock().push_back(error);
    }

    /// Returns every page query received so far.
    pub fn reads(&self) -> Vec<PageQuery> {
        self.reads.lock().clone()
    }

    /// Returns the number of reads received so far.
    pub fn read_count(&self) -> usize {
        self.reads.lock().len()
    }
}

#[async_trait]
impl RemoteSource for MemoryRemote {
    async fn read(&self, query: &PageQuery, options: &ReadOptions) -> PullResult<Vec<Row>> {
        self.reads.lock().push(query.clone());
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        let tables = self.tables.read();
        let mut rows: Vec<&Row> = tables
            .get(&query.table)
            .map(|rows| rows.iter().collect())
            .unwrap_or_default();

        rows.retain(|row| {
            let deleted = matches!(row.get(system::DELETED), Some(Value::Bool(true)));
            (options.include_deleted || !deleted) && query.filter.matches(row)
        });
        rows.sort_by(|a, b| compare_rows(a, b, &query.ordering));

        let limit = match self.max_page_size {
            Some(max) => query.top.min(max),
            None => query.top,
        };
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);

        Ok(rows
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

fn compare_rows(a: &Row, b: &Row, ordering: &[OrderBy]) -> Ordering {
    for order in ordering {
        let left = a.get(&order.field).unwrap_or(&Value::Null);
        let right = b.get(&order.field).unwrap_or(&Value::Null);
        let ord = compare_values(left, right);
        let ord = match order.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Orders JSON values: nulls first, then booleans, numbers, strings.
/// Strings that both parse as timestamps compare as instants.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => {
            match (system::parse_timestamp(x), system::parse_timestamp(y)) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tablesync_protocol::Filter;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> MemoryRemote {
        let remote = MemoryRemote::new();
        remote.put_all(
            "todo",
            [
                row(json!({"id": "c", "updatedAt": "2024-01-03T00:00:00Z", "deleted": false})),
                row(json!({"id": "a", "updatedAt": "2024-01-01T00:00:00Z", "deleted": false})),
                row(json!({"id": "b", "updatedAt": "2024-01-02T00:00:00Z", "deleted": true})),
            ],
        );
        remote
    }

    fn ids(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|r| r["id"].as_str().unwrap()).collect()
    }

    #[tokio::test]
    async fn read_orders_and_filters() {
        let remote = seeded();
        let page = PageQuery::at_cursor("todo", None, system::beginning_of_time(), 10);

        let all = remote.read(&page, &ReadOptions::including_deleted()).await.unwrap();
        assert_eq!(ids(&all), vec!["a", "b", "c"]);

        let live = remote.read(&page, &ReadOptions::default()).await.unwrap();
        assert_eq!(ids(&live), vec!["a", "c"]);

        let cursor = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let later = PageQuery::at_cursor("todo", None, cursor, 10);
        let rows = remote.read(&later, &ReadOptions::including_deleted()).await.unwrap();
        assert_eq!(ids(&rows), vec!["b", "c"]);
        assert_eq!(remote.read_count(), 3);
    }

    #[tokio::test]
    async fn read_honors_skip_top_and_server_cap() {
        let remote = seeded().with_max_page_size(1);
        let mut page = PageQuery::at_cursor("todo", None, system::beginning_of_time(), 2);
        page.skip = 1;

        let rows = remote.read(&page, &ReadOptions::including_deleted()).await.unwrap();
        assert_eq!(ids(&rows), vec!["b"]);
    }

    #[tokio::test]
    async fn read_applies_base_filter() {
        let remote = seeded();
        let base = Filter::ne("id", "a");
        let page = PageQuery::at_cursor("todo", Some(&base), system::beginning_of_time(), 10);
        let rows = remote.read(&page, &ReadOptions::including_deleted()).await.unwrap();
        assert_eq!(ids(&rows), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn put_replaces_in_place() {
        let remote = seeded();
        remote.put(
            "todo",
            row(json!({"id": "a", "updatedAt": "2024-01-01T00:00:00Z", "deleted": true})),
        );
        let page = PageQuery::at_cursor("todo", None, system::beginning_of_time(), 10);
        let rows = remote.read(&page, &ReadOptions::default()).await.unwrap();
        assert_eq!(ids(&rows), vec!["c"]);
    }

    #[tokio::test]
    async fn injected_failure_fails_once() {
        let remote = seeded();
        remote.fail_next_read(PullError::transport_retryable("offline"));
        let page = PageQuery::at_cursor("todo", None, system::beginning_of_time(), 10);

        assert!(remote.read(&page, &ReadOptions::default()).await.is_err());
        assert!(remote.read(&page, &ReadOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_table_reads_empty() {
        let remote = MemoryRemote::new();
        let page = PageQuery::at_cursor("nope", None, system::beginning_of_time(), 10);
        assert!(remote.read(&page, &ReadOptions::default()).await.unwrap().is_empty());
    }
}
