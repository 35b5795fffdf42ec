//! Pull queries.

use crate::filter::Filter;
use crate::system;
use chrono::{DateTime, Utc};
use std::fmt;

/// Direction of an ordering clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One ordering clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column name.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

impl OrderBy {
    /// Ascending order on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending order on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SortDirection::Ascending => write!(f, "{} asc", self.field),
            SortDirection::Descending => write!(f, "{} desc", self.field),
        }
    }
}

/// A caller's description of what to pull from one table.
///
/// The shape is general enough to express any table query, but pull only
/// accepts a table name and a filter: ordering, skip, take, selection and
/// total-count requests are rejected before any I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncQuery {
    /// Target table.
    pub table: String,
    /// Row predicate; `None` pulls the whole table.
    pub filter: Option<Filter>,
    /// Ordering clauses.
    pub ordering: Vec<OrderBy>,
    /// Rows to skip.
    pub skip: Option<u64>,
    /// Maximum rows to return.
    pub take: Option<u64>,
    /// Projected columns; empty means all.
    pub selection: Vec<String>,
    /// Whether a total row count is requested.
    pub include_total_count: bool,
}

impl SyncQuery {
    /// A query over the whole of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            ordering: Vec::new(),
            skip: None,
            take: None,
            selection: Vec::new(),
            include_total_count: false,
        }
    }

    /// Adds a predicate, and-ed with any existing one.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    /// Appends an ordering clause.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.ordering.push(order);
        self
    }

    /// Sets the number of rows to skip.
    pub fn skip(mut self, count: u64) -> Self {
        self.skip = Some(count);
        self
    }

    /// Sets the maximum number of rows.
    pub fn take(mut self, count: u64) -> Self {
        self.take = Some(count);
        self
    }

    /// Sets the projected columns.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Requests a total row count.
    pub fn include_total_count(mut self) -> Self {
        self.include_total_count = true;
        self
    }
}

/// Per-read flags sent alongside a page query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Return soft-deleted rows as well as live ones.
    pub include_deleted: bool,
}

impl ReadOptions {
    /// Options used by pull: soft-deleted rows included.
    pub fn including_deleted() -> Self {
        Self {
            include_deleted: true,
        }
    }
}

/// One page of an incremental pull.
///
/// `filter` already contains the `updatedAt ge cursor` clause; `cursor` is
/// kept alongside it so the page can be advanced without re-parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    /// Target table.
    pub table: String,
    /// Base filter and-ed with the cursor clause.
    pub filter: Filter,
    /// Lower bound on the change timestamp.
    pub cursor: DateTime<Utc>,
    /// Ordering; always the change timestamp ascending.
    pub ordering: Vec<OrderBy>,
    /// Requested page size.
    pub top: u32,
    /// Rows sharing `cursor` already consumed.
    pub skip: u64,
}

impl PageQuery {
    /// Builds the page starting at `cursor`, with no rows skipped.
    pub fn at_cursor(
        table: impl Into<String>,
        base: Option<&Filter>,
        cursor: DateTime<Utc>,
        top: u32,
    ) -> Self {
        let cursor_clause = Filter::ge(system::UPDATED_AT, cursor);
        let filter = match base {
            Some(base) => base.clone().and(cursor_clause),
            None => cursor_clause,
        };
        Self {
            table: table.into(),
            filter,
            cursor,
            ordering: vec![OrderBy::asc(system::UPDATED_AT)],
            top,
            skip: 0,
        }
    }

    /// Renders the query string a transport sends for this page.
    pub fn to_query_string(&self, options: &ReadOptions) -> String {
        let mut query = self.to_string();
        if options.include_deleted {
            query.push_str("&__includeDeleted=true");
        }
        query
    }
}

impl fmt::Display for PageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ordering = self
            .ordering
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "$filter={}&$orderby={}&$top={}&$skip={}",
            self.filter, ordering, self.top, self.skip
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn builder_sets_fields() {
        let q = SyncQuery::new("todo")
            .with_filter(Filter::eq("done", false))
            .with_filter(Filter::eq("owner", "me"))
            .order_by(OrderBy::desc("title"))
            .skip(3)
            .take(4)
            .select(["title"])
            .include_total_count();

        assert_eq!(q.table, "todo");
        assert_eq!(
            q.filter,
            Some(Filter::eq("done", false).and(Filter::eq("owner", "me")))
        );
        assert_eq!(q.ordering, vec![OrderBy::desc("title")]);
        assert_eq!(q.skip, Some(3));
        assert_eq!(q.take, Some(4));
        assert_eq!(q.selection, vec!["title".to_string()]);
        assert!(q.include_total_count);
    }

    #[test]
    fn page_query_combines_filter_and_cursor() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let base = Filter::eq("done", false);
        let page = PageQuery::at_cursor("todo", Some(&base), t, 50);

        assert_eq!(page.filter, base.and(Filter::ge("updatedAt", t)));
        assert_eq!(page.ordering, vec![OrderBy::asc("updatedAt")]);
        assert_eq!(page.skip, 0);
        assert_eq!(page.top, 50);
    }

    #[test]
    fn page_query_string() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut page = PageQuery::at_cursor("todo", None, t, 10);
        page.skip = 20;

        assert_eq!(
            page.to_query_string(&ReadOptions::including_deleted()),
            "$filter=(updatedAt ge datetimeoffset'2024-01-02T03:04:05Z')\
             &$orderby=updatedAt asc&$top=10&$skip=20&__includeDeleted=true"
        );
        assert!(!page
            .to_query_string(&ReadOptions::default())
            .contains("includeDeleted"));
    }
}
