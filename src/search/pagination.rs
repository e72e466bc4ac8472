//! One-result-per-page pagination with collapsed page ranges.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "page", rename_all = "snake_case")]
pub enum PageItem {
    Page(usize),
    Ellipsis,
}

/// `current` is 1-based; both are 0 when there are no results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub current: usize,
}

impl Pagination {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self { total, current: usize::from(total > 0) }
    }

    /// Page buttons: first and last always shown, current ±1 between them,
    /// gaps collapsed to an ellipsis.
    #[must_use]
    pub fn items(&self) -> Vec<PageItem> {
        if self.total == 0 {
            return Vec::new();
        }
        if self.total == 1 {
            return vec![PageItem::Page(1)];
        }
        let mut items = vec![PageItem::Page(1)];
        let from = self.current.saturating_sub(1).max(2);
        let to = (self.current + 1).min(self.total - 1);
        if from > 2 {
            items.push(PageItem::Ellipsis);
        }
        items.extend((from..=to).map(PageItem::Page));
        if to + 1 < self.total {
            items.push(PageItem::Ellipsis);
        }
        items.push(PageItem::Page(self.total));
        items
    }

    /// Move to `page` if it exists. Returns whether the page changed.
    pub fn go_to(&mut self, page: usize) -> bool {
        if (1..=self.total).contains(&page) && page != self.current {
            self.current = page;
            return true;
        }
        false
    }

    /// Handle the manual page-jump input: digits only, out-of-range ignored.
    pub fn jump(&mut self, input: &str) -> bool {
        let digits: String = input.chars().filter(char::is_ascii_digit).collect();
        match digits.parse::<usize>() {
            Ok(page) => self.go_to(page),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageItem::{Ellipsis, Page};

    fn at(total: usize, current: usize) -> Pagination {
        Pagination { total, current }
    }

    #[test]
    fn new_starts_on_first_page() {
        assert_eq!(Pagination::new(5), at(5, 1));
        assert_eq!(Pagination::new(0), at(0, 0));
    }

    #[test]
    fn small_ranges_have_no_ellipsis() {
        assert_eq!(at(1, 1).items(), [Page(1)]);
        assert_eq!(at(2, 1).items(), [Page(1), Page(2)]);
        assert_eq!(at(3, 2).items(), [Page(1), Page(2), Page(3)]);
        assert_eq!(at(4, 2).items(), [Page(1), Page(2), Page(3), Page(4)]);
    }

    #[test]
    fn long_ranges_collapse_around_current() {
        assert_eq!(at(10, 1).items(), [Page(1), Page(2), Ellipsis, Page(10)]);
        assert_eq!(at(10, 5).items(), [Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]);
        assert_eq!(at(10, 10).items(), [Page(1), Ellipsis, Page(9), Page(10)]);
        assert_eq!(at(10, 3).items(), [Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)]);
    }

    #[test]
    fn empty_has_no_items() {
        assert!(at(0, 0).items().is_empty());
    }

    #[test]
    fn jump_ignores_out_of_range() {
        let mut pages = Pagination::new(5);
        assert!(!pages.jump("9"));
        assert_eq!(pages.current, 1);
        assert!(pages.jump("3"));
        assert_eq!(pages.current, 3);
        assert!(!pages.jump("0"));
        assert_eq!(pages.current, 3);
    }

    #[test]
    fn jump_keeps_digits_only() {
        let mut pages = Pagination::new(20);
        assert!(pages.jump("1a2"));
        assert_eq!(pages.current, 12);
        assert!(!pages.jump("abc"));
        assert!(!pages.jump(""));
        assert_eq!(pages.current, 12);
    }

    #[test]
    fn go_to_bounds() {
        let mut pages = Pagination::new(3);
        assert!(pages.go_to(3));
        assert!(!pages.go_to(4));
        assert!(!pages.go_to(3));
        assert_eq!(pages.current, 3);
    }

    #[test]
    fn items_serialize_tagged() {
        let json = serde_json::to_value(at(10, 5).items()).unwrap();
        assert_eq!(json[0], serde_json::json!({ "kind": "page", "page": 1 }));
        assert_eq!(json[1], serde_json::json!({ "kind": "ellipsis" }));
    }
}
