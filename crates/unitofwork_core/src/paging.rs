//! Paged-list computation shared by repository queries.
//!
//! # Responsibility
//! - Cut one zero-based page out of an already filtered, ordered source.
//! - Compute total item and page counts at construction time.
//!
//! # Invariants
//! - `total_pages == ceil(total_count / page_size)`.
//! - Items are `source[page_index * page_size ..][..page_size]`, empty past
//!   the end.
//! - `page_size == 0` is rejected instead of clamped.

use crate::db::{suspend, DbError};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Page size used when callers do not pick one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PagingError {
    #[error("page size must be at least 1")]
    InvalidPageSize,
}

/// One page of results plus count metadata. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagedList<T> {
    page_index: usize,
    page_size: usize,
    total_count: usize,
    total_pages: usize,
    items: Vec<T>,
}

impl<T> PagedList<T> {
    /// Builds page `page_index` of `source`.
    pub fn new(source: Vec<T>, page_index: usize, page_size: usize) -> Result<Self, PagingError> {
        if page_size == 0 {
            return Err(PagingError::InvalidPageSize);
        }

        let total_count = source.len();
        let total_pages = total_count.div_ceil(page_size);
        let items = source
            .into_iter()
            .skip(page_index.saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(Self {
            page_index,
            page_size,
            total_count,
            total_pages,
            items,
        })
    }

    /// Same as `new`, after a cancellable suspension point.
    pub async fn new_async(
        source: Vec<T>,
        page_index: usize,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Self, PagedListAsyncError> {
        suspend(cancel).await?;
        Ok(Self::new(source, page_index, page_size)?)
    }

    /// An empty first page, used when a source has no rows.
    pub fn empty(page_size: usize) -> Result<Self, PagingError> {
        Self::new(Vec::new(), 0, page_size)
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous_page(&self) -> bool {
        self.page_index > 0
    }

    pub fn has_next_page(&self) -> bool {
        self.page_index.saturating_add(1) < self.total_pages
    }

    /// Projects every item, keeping the page metadata.
    pub fn map<R>(self, selector: impl FnMut(T) -> R) -> PagedList<R> {
        PagedList {
            page_index: self.page_index,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            items: self.items.into_iter().map(selector).collect(),
        }
    }
}

impl<T> IntoIterator for PagedList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Failure of `PagedList::new_async`.
#[derive(Debug, Error)]
pub enum PagedListAsyncError {
    #[error(transparent)]
    Paging(#[from] PagingError),
    #[error(transparent)]
    Db(#[from] DbError),
}

#[cfg(test)]
mod tests {
    use super::{PagedList, PagedListAsyncError, PagingError};
    use tokio_util::sync::CancellationToken;

    fn source() -> Vec<u32> {
        (1..=7).collect()
    }

    #[test]
    fn computes_window_and_counts() {
        let page = PagedList::new(source(), 1, 3).expect("page");
        assert_eq!(page.items(), &[4, 5, 6]);
        assert_eq!(page.total_count(), 7);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_previous_page());
        assert!(page.has_next_page());
    }

    #[test]
    fn last_page_is_short_and_past_the_end_is_empty() {
        let last = PagedList::new(source(), 2, 3).expect("last");
        assert_eq!(last.items(), &[7]);
        assert!(!last.has_next_page());

        let beyond = PagedList::new(source(), 9, 3).expect("beyond");
        assert!(beyond.is_empty());
        assert_eq!(beyond.total_pages(), 3);
    }

    #[test]
    fn rejects_zero_page_size() {
        assert_eq!(
            PagedList::new(source(), 0, 0).expect_err("zero size"),
            PagingError::InvalidPageSize
        );
    }

    #[test]
    fn empty_source_has_no_pages() {
        let page = PagedList::<u32>::empty(20).expect("empty");
        assert_eq!(page.total_pages(), 0);
        assert!(!page.has_next_page());
    }

    #[test]
    fn map_keeps_metadata() {
        let page = PagedList::new(source(), 0, 2)
            .expect("page")
            .map(|value| value.to_string());
        assert_eq!(page.items(), &["1".to_string(), "2".to_string()]);
        assert_eq!(page.total_count(), 7);
    }

    #[tokio::test]
    async fn async_variant_matches_sync_variant() {
        let cancel = CancellationToken::new();
        let sync_page = PagedList::new(source(), 1, 2).expect("sync");
        let async_page = PagedList::new_async(source(), 1, 2, &cancel)
            .await
            .expect("async");
        assert_eq!(sync_page, async_page);
    }

    #[tokio::test]
    async fn async_variant_honours_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = PagedList::new_async(source(), 0, 2, &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, PagedListAsyncError::Db(_)));
    }
}
