//! Pagination view over a store snapshot.
//!
//! [`paginate`] is pure; [`PageView`] only remembers which page the display
//! layer is on.

use serde::Serialize;

use crate::events::EventRecord;

/// Reference page size.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Records on this page, newest first.
    pub records: Vec<EventRecord>,
    /// 1-based page number.
    pub page: usize,
    /// Records per page.
    pub page_size: usize,
    /// `ceil(total_records / page_size)`.
    pub total_pages: usize,
    /// Records in the whole store.
    pub total_records: usize,
}

/// Number of pages needed for `len` records.
#[must_use]
pub const fn total_pages(len: usize, page_size: usize) -> usize {
    len.div_ceil(if page_size == 0 { 1 } else { page_size })
}

/// Slice `[(page-1)*size, page*size)` of `records`, clamped to its bounds.
///
/// Page 0 is treated as page 1; a page size of 0 as 1.
#[must_use]
pub fn paginate(records: &[EventRecord], page_size: usize, page: usize) -> Page {
    let page_size = page_size.max(1);
    let page = page.max(1);

    let start = (page - 1).saturating_mul(page_size).min(records.len());
    let end = page.saturating_mul(page_size).min(records.len());

    Page {
        records: records[start..end].to_vec(),
        page,
        page_size,
        total_pages: total_pages(records.len(), page_size),
        total_records: records.len(),
    }
}

/// The display layer's position in the paginated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageView {
    page_size: usize,
    current_page: usize,
}

impl PageView {
    /// Start on page 1.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 1,
        }
    }

    /// Current 1-based page.
    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    /// Records per page.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Switch to `page` (0 is treated as 1).
    pub fn change_page(&mut self, page: usize) {
        self.current_page = page.max(1);
    }

    /// Render the current page of `records`.
    #[must_use]
    pub fn render(&self, records: &[EventRecord]) -> Page {
        paginate(records, self.page_size, self.current_page)
    }
}

impl Default for PageView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}
