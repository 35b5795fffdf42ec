//! Page query construction and cursor advance.

use chrono::{DateTime, Utc};
use tablesync_protocol::{Filter, PageQuery, SyncQuery};

/// How the cursor moved after a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    /// The cursor moved to a later timestamp; skip reset to 0.
    Advanced,
    /// The whole page sat on the cursor instant; skip grew by the page length.
    Skipped,
}

/// Derives page queries from a base query.
///
/// Every page is `base filter and updatedAt ge cursor`, ordered by
/// `updatedAt` ascending, limited to the page size. Ordering on the change
/// timestamp keeps rows that share an instant in a stable relative order,
/// which is what makes skipping within one instant safe.
#[derive(Debug, Clone)]
pub struct PageQueryBuilder {
    table: String,
    base: Option<Filter>,
    page_size: u32,
}

impl PageQueryBuilder {
    /// Creates a builder for a validated query.
    pub fn new(query: &SyncQuery, page_size: u32) -> Self {
        Self {
            table: query.table.clone(),
            base: query.filter.clone(),
            page_size,
        }
    }

    /// Returns the page size.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Builds the first page at `cursor`.
    pub fn build(&self, cursor: DateTime<Utc>) -> PageQuery {
        PageQuery::at_cursor(self.table.as_str(), self.base.as_ref(), cursor, self.page_size)
    }

    /// Moves `page` past a page of `fetched` records whose last record
    /// changed at `last_updated_at`.
    ///
    /// If the last record sits on the current cursor, more rows of that
    /// instant may remain, so the cursor stays and `skip` grows. Otherwise
    /// the cursor moves to the last record's timestamp and `skip` resets.
    pub fn advance(
        &self,
        page: &mut PageQuery,
        last_updated_at: DateTime<Utc>,
        fetched: usize,
    ) -> CursorMove {
        if last_updated_at == page.cursor {
            page.skip += fetched as u64;
            CursorMove::Skipped
        } else {
            *page = self.build(last_updated_at);
            CursorMove::Advanced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tablesync_protocol::system;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn build_first_page() {
        let query = SyncQuery::new("todo").with_filter(Filter::eq("done", false));
        let builder = PageQueryBuilder::new(&query, 25);
        let page = builder.build(system::beginning_of_time());

        assert_eq!(page.table, "todo");
        assert_eq!(page.top, 25);
        assert_eq!(page.skip, 0);
        assert_eq!(page.cursor, system::beginning_of_time());
        assert_eq!(
            page.filter,
            Filter::eq("done", false).and(Filter::ge("updatedAt", system::beginning_of_time()))
        );
    }

    #[test]
    fn advance_to_later_timestamp_resets_skip() {
        let builder = PageQueryBuilder::new(&SyncQuery::new("todo"), 2);
        let mut page = builder.build(t(1));
        page.skip = 4;

        assert_eq!(builder.advance(&mut page, t(2), 2), CursorMove::Advanced);
        assert_eq!(page.cursor, t(2));
        assert_eq!(page.skip, 0);
        assert_eq!(page.filter, Filter::ge("updatedAt", t(2)));
    }

    #[test]
    fn advance_on_same_instant_grows_skip() {
        let builder = PageQueryBuilder::new(&SyncQuery::new("todo"), 2);
        let mut page = builder.build(t(1));

        assert_eq!(builder.advance(&mut page, t(1), 2), CursorMove::Skipped);
        assert_eq!(builder.advance(&mut page, t(1), 2), CursorMove::Skipped);
        assert_eq!(page.cursor, t(1));
        assert_eq!(page.skip, 4);
    }
}
