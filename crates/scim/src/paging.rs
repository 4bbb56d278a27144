//! 1-based external paging -> 0-based page/size.

use iamdir_core::page::DEFAULT_PAGE_SIZE;
use iamdir_core::{PageRequest, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationWindow {
    pub page: usize,
    pub size: usize,
}

impl PaginationWindow {
    /// Value reported back as `startIndex`.
    pub fn start_index(&self) -> usize {
        self.page.saturating_mul(self.size).saturating_add(1)
    }

    pub fn to_request(self, sort: SortOrder) -> PageRequest {
        PageRequest::new(self.page, self.size).sorted_by(sort)
    }
}

/// `start_index` selects the page number (`start_index - 1`), not an item
/// offset. Absent or non-positive values clamp to page 0 and size 100.
pub fn pagination_window(start_index: Option<i64>, count: Option<i64>) -> PaginationWindow {
    let page = match start_index {
        Some(i) if i > 0 => usize::try_from(i - 1).unwrap_or(usize::MAX),
        _ => 0,
    };
    let size = match count {
        Some(c) if c > 0 => usize::try_from(c).unwrap_or(usize::MAX),
        _ => DEFAULT_PAGE_SIZE,
    };
    PaginationWindow { page, size }
}
