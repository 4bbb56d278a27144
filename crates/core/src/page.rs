//! Paging primitives for search operations.

use serde::Serialize;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Ordering applied to search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first (creation time descending).
    #[default]
    CreatedDesc,
    /// Natural key ascending (login name for users, name for groups).
    NaturalKeyAsc,
}

/// 0-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
    pub sort: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: SortOrder::CreatedDesc,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size: size.max(1),
            sort: SortOrder::CreatedDesc,
        }
    }

    pub fn sorted_by(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Index of the first item on this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    /// Cut one page out of an already ordered, fully materialised result.
    pub fn slice<T>(&self, ordered: Vec<T>) -> Page<T> {
        let total = ordered.len();
        let items = ordered
            .into_iter()
            .skip(self.offset())
            .take(self.size)
            .collect();
        Page {
            items,
            total,
            page: self.page,
            size: self.size,
        }
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub size: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_returns_requested_window_and_total() {
        let page = PageRequest::new(1, 2).slice(vec![1, 2, 3, 4, 5]);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);
    }

    #[test]
    fn slice_past_the_end_is_empty() {
        let page = PageRequest::new(9, 10).slice(vec![1, 2, 3]);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn zero_size_is_raised_to_one() {
        assert_eq!(PageRequest::new(0, 0).size, 1);
    }
}
