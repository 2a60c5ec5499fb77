//! Pagination for chapter listings.
//!
//! Pure and synchronous: the paginator keeps its own ordered copy of the
//! items and never touches the caller's list. Page indices are 1-based.

use crate::config::PaginationConfig;
use serde::Serialize;
use ts_rs::TS;

/// Most page numbers shown in the page selector at once.
pub const MAX_VISIBLE_PAGE_NUMBERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct PaginationView {
    pub items_per_page: usize,
    pub current_page_index: usize,
    pub ascending: bool,
    pub total_pages: usize,
    pub visible_page_numbers: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Paginator<T> {
    source: Vec<T>,
    ordered: Vec<T>,
    items_per_page: usize,
    current_page: usize,
    ascending: bool,
}

impl<T: Clone> Paginator<T> {
    pub fn new(items: &[T], items_per_page: usize, initial_page: usize, ascending: bool) -> Self {
        let mut paginator = Self {
            source: items.to_vec(),
            ordered: Vec::new(),
            items_per_page: items_per_page.max(1),
            current_page: 1,
            ascending,
        };
        paginator.reorder();
        paginator.change_page(initial_page);
        paginator
    }

    pub fn from_config(items: &[T], config: &PaginationConfig) -> Self {
        Self::new(items, config.items_per_page, 1, config.ascending)
    }

    /// Replace the listed items, keeping order and page (clamped).
    pub fn set_items(&mut self, items: &[T]) {
        self.source = items.to_vec();
        self.reorder();
        self.change_page(self.current_page);
    }

    pub fn total_pages(&self) -> usize {
        self.ordered.len().div_ceil(self.items_per_page)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    /// All items in display order.
    pub fn items(&self) -> &[T] {
        &self.ordered
    }

    pub fn current_items(&self) -> &[T] {
        let start = (self.current_page - 1) * self.items_per_page;
        if start >= self.ordered.len() {
            return &[];
        }
        let end = (start + self.items_per_page).min(self.ordered.len());
        &self.ordered[start..end]
    }

    /// Up to [`MAX_VISIBLE_PAGE_NUMBERS`] page numbers around the current
    /// page, kept inside `1..=total_pages`.
    pub fn visible_page_numbers(&self) -> Vec<usize> {
        let total = self.total_pages();
        if total == 0 {
            return Vec::new();
        }
        let window = MAX_VISIBLE_PAGE_NUMBERS.min(total);
        let mut start = self
            .current_page
            .saturating_sub(MAX_VISIBLE_PAGE_NUMBERS / 2)
            .max(1);
        if start + window - 1 > total {
            start = total - window + 1;
        }
        (start..start + window).collect()
    }

    /// Jump to `target`, clamped into `1..=total_pages`. Returns the page
    /// actually selected.
    pub fn change_page(&mut self, target: usize) -> usize {
        let last = self.total_pages().max(1);
        self.current_page = target.clamp(1, last);
        self.current_page
    }

    /// Flip the sort direction. Always returns to the first page.
    pub fn toggle_order(&mut self) {
        self.ascending = !self.ascending;
        self.reorder();
        self.current_page = 1;
    }

    pub fn view(&self) -> PaginationView {
        PaginationView {
            items_per_page: self.items_per_page,
            current_page_index: self.current_page,
            ascending: self.ascending,
            total_pages: self.total_pages(),
            visible_page_numbers: self.visible_page_numbers(),
        }
    }

    fn reorder(&mut self) {
        self.ordered = self.source.clone();
        if !self.ascending {
            self.ordered.reverse();
        }
    }
}
