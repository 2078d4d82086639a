//! Slicing ordered lists into pages.

/// One page of a list. Page indexes are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: usize,
    /// Never 0: an empty list is a single empty page
    pub total_pages: usize,
    pub total_items: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Returns page `page` of `items`, `per_page` items per page.
///
/// A `per_page` of 0 is treated as 1. Pages past the end come back empty.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);

    let start = page.saturating_mul(per_page);
    let slice: Vec<T> = items.into_iter().skip(start).take(per_page).collect();

    Page {
        items: slice,
        current_page: page,
        total_pages,
        total_items,
        has_next: page.checked_add(1).is_some_and(|next| next < total_pages),
        has_prev: page > 0,
    }
}
