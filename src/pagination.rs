use serde::{Deserialize, Serialize};

/// A `(skip, count)` request plus the total the source reported for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageWindow {
    pub skip: u64,
    pub count: u64,
    pub total: Option<u64>,
}

impl PageWindow {
    /// Window with a pre-validated skip and a count of at least one.
    pub fn new(skip: u64, count: u64) -> Self {
        Self {
            skip,
            count: count.max(1),
            total: None,
        }
    }

    pub fn with_total(self, total: u64) -> Self {
        Self {
            total: Some(total),
            ..self
        }
    }

    /// `skip + count < total`, using the most recently reported total.
    pub fn has_more(&self) -> bool {
        self.total
            .map_or(false, |total| self.skip.saturating_add(self.count) < total)
    }

    pub fn end(&self) -> u64 {
        self.skip.saturating_add(self.count)
    }

    /// Slice bounds for a list of `len` items.
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        let start = usize::try_from(self.skip).unwrap_or(usize::MAX).min(len);
        let end = usize::try_from(self.end()).unwrap_or(usize::MAX).min(len);
        (start, end)
    }
}

/// Maps caller-supplied offsets and page indexes onto [`PageWindow`]s.
///
/// `base_skip` reserves leading positions: the "recent with main" listing uses
/// a base of 1 so the main article is never repeated in paged results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    pub default_count: u64,
    pub base_skip: u64,
}

impl Paginator {
    pub fn new(default_count: u64) -> Self {
        Self {
            default_count: default_count.max(1),
            base_skip: 0,
        }
    }

    pub fn with_base_skip(mut self, base_skip: u64) -> Self {
        self.base_skip = base_skip;
        self
    }

    /// Clamp a raw request: negative skip becomes 0 (then at least
    /// `base_skip`), non-positive count becomes the default.
    pub fn window(&self, skip: i64, count: i64) -> PageWindow {
        let skip = u64::try_from(skip).unwrap_or(0).max(self.base_skip);
        let count = match u64::try_from(count) {
            Ok(count) if count > 0 => count,
            _ => self.default_count,
        };
        PageWindow::new(skip, count)
    }

    /// Window for 0-based page `n`: `skip = base_skip + n * count`.
    pub fn page(&self, n: u64) -> PageWindow {
        PageWindow::new(
            self.base_skip
                .saturating_add(n.saturating_mul(self.default_count)),
            self.default_count,
        )
    }

    /// Whether page `n + 1` exists given the total reported by the last fetch.
    pub fn has_next_page(&self, n: u64, total: u64) -> bool {
        total > self.page(n).end()
    }

    pub fn has_more(&self, window: &PageWindow) -> bool {
        window.has_more()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps_inputs() {
        let paginator = Paginator::new(6);

        assert_eq!(paginator.window(-3, 4), PageWindow::new(0, 4));
        assert_eq!(paginator.window(2, 0), PageWindow::new(2, 6));
        assert_eq!(paginator.window(2, -9), PageWindow::new(2, 6));
    }

    #[test]
    fn test_base_skip_reserves_main_article() {
        let paginator = Paginator::new(6).with_base_skip(1);

        assert_eq!(paginator.window(0, 3).skip, 1);
        assert_eq!(paginator.window(7, 3).skip, 7);
        assert_eq!(paginator.page(0).skip, 1);
        assert_eq!(paginator.page(2).skip, 13);
    }

    #[test]
    fn test_cursor_with_total_ten() {
        let paginator = Paginator::new(4);

        let first = paginator.page(0).with_total(10);
        assert!(paginator.has_more(&first));
        assert!(paginator.has_next_page(0, 10));

        let third = paginator.page(2).with_total(10);
        assert_eq!(third.skip, 8);
        assert!(!third.has_more());
        assert!(!paginator.has_next_page(2, 10));
    }

    #[test]
    fn test_next_page_counts_reserved_slots() {
        let paginator = Paginator::new(6).with_base_skip(1);

        // Main article plus six: nothing left after page 0.
        assert!(!paginator.has_next_page(0, 7));
        assert!(!paginator.page(0).with_total(7).has_more());
        assert!(paginator.has_next_page(0, 8));
    }

    #[test]
    fn test_unknown_total_has_no_more() {
        assert!(!PageWindow::new(0, 5).has_more());
    }

    #[test]
    fn test_bounds_clip_to_len() {
        assert_eq!(PageWindow::new(1, 5).bounds(3), (1, 3));
        assert_eq!(PageWindow::new(9, 5).bounds(3), (3, 3));
        assert_eq!(PageWindow::new(u64::MAX, 5).bounds(3), (3, 3));
    }
}
