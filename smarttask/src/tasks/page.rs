//! Client-side pagination over the cached task list.

use thiserror::Error;

/// Page sizes the dashboard offers.
pub const ROWS_PER_PAGE_OPTIONS: [usize; 3] = [10, 20, 50];

/// Default page size.
pub const DEFAULT_ROWS_PER_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("rows per page must be one of 10, 20 or 50 (got {0})")]
    UnsupportedRowsPerPage(usize),
}

/// Current page and page size. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    rows_per_page: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self {
            page: 1,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
        }
    }
}

impl Pager {
    /// First page, given page size.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::UnsupportedRowsPerPage`] for sizes outside
    /// [`ROWS_PER_PAGE_OPTIONS`].
    pub fn with_rows_per_page(rows_per_page: usize) -> Result<Self, PageError> {
        let mut pager = Self::default();
        pager.set_rows_per_page(rows_per_page)?;
        Ok(pager)
    }

    #[must_use]
    pub const fn page(&self) -> usize {
        self.page
    }

    #[must_use]
    pub const fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    /// Changes the page size and goes back to page 1.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::UnsupportedRowsPerPage`] for sizes outside
    /// [`ROWS_PER_PAGE_OPTIONS`]; the pager is left unchanged.
    pub fn set_rows_per_page(&mut self, rows_per_page: usize) -> Result<(), PageError> {
        if !ROWS_PER_PAGE_OPTIONS.contains(&rows_per_page) {
            return Err(PageError::UnsupportedRowsPerPage(rows_per_page));
        }
        self.rows_per_page = rows_per_page;
        self.page = 1;
        Ok(())
    }

    /// Number of pages for `total` rows. Zero when there are none.
    #[must_use]
    pub const fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.rows_per_page)
    }

    /// Pulls the current page back inside range after the list shrank.
    pub fn clamp(&mut self, total: usize) {
        let last = self.total_pages(total).max(1);
        if self.page > last {
            self.page = last;
        }
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self, total: usize) -> bool {
        self.page < self.total_pages(total)
    }

    pub fn prev(&mut self) {
        if self.has_prev() {
            self.page -= 1;
        }
    }

    pub fn next(&mut self, total: usize) {
        if self.has_next(total) {
            self.page += 1;
        }
    }

    /// Jumps to `page`, clamped to the available range.
    pub fn go_to(&mut self, page: usize, total: usize) {
        self.page = page.clamp(1, self.total_pages(total).max(1));
    }

    /// Rows of the current page.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.page - 1).saturating_mul(self.rows_per_page);
        if start >= items.len() {
            return &[];
        }
        let end = start.saturating_add(self.rows_per_page).min(items.len());
        &items[start..end]
    }

    /// "Page X of Y", with Y at least 1.
    #[must_use]
    pub fn label(&self, total: usize) -> String {
        format!(
            "Page {} of {}",
            self.page,
            self.total_pages(total).max(1)
        )
    }
}
