use serde::{Deserialize, Serialize};

use crate::{constants::MAX_PAGE_SIZE, error::ErrorKind};

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A 1-based page number and its size, as requested through `page` and `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
}

impl Page {
    pub fn new(number: Option<i64>, size: Option<i64>, default_size: i64) -> Self {
        Self {
            number: number.unwrap_or(1).max(1),
            size: size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Saturates, so absurd page numbers land past the last row instead of
    /// overflowing.
    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    /// Only the first page may be empty.
    pub fn ensure_exists(&self, row_count: usize) -> Result<(), potion::Error> {
        if row_count == 0 && self.number > 1 {
            return Err(ErrorKind::NotFound.new("Invalid page."));
        }

        Ok(())
    }
}

impl<T> PageContext<T> {
    pub fn from_rows<F>(rows: Vec<T>, total_rows: i64, page: Page, link: F) -> Self
    where
        F: Fn(i64) -> String,
    {
        if rows.is_empty() {
            return Self::no_rows(total_rows);
        }

        let next = if page.number.saturating_mul(page.size) < total_rows {
            Some(link(page.number + 1))
        } else {
            None
        };
        let previous = if page.number > 1 {
            Some(link(page.number - 1))
        } else {
            None
        };

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn no_rows(total_rows: i64) -> Self {
        Self {
            count: total_rows,
            next: None,
            previous: None,
            results: vec![],
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(n: i64) -> String {
        format!("/api/recipes/?page={n}")
    }

    #[test]
    fn middle_page_links_both_ways() {
        let page = Page::new(Some(2), Some(6), 6);
        let context = PageContext::from_rows(vec![1, 2, 3, 4, 5, 6], 20, page, link);

        assert_eq!(page.offset(), 6);
        assert_eq!(context.next.as_deref(), Some("/api/recipes/?page=3"));
        assert_eq!(context.previous.as_deref(), Some("/api/recipes/?page=1"));
    }

    #[test]
    fn last_page_has_no_next() {
        let page = Page::new(Some(4), Some(6), 6);
        let context = PageContext::from_rows(vec![1, 2], 20, page, link);

        assert_eq!(context.count, 20);
        assert!(context.next.is_none());
    }

    #[test]
    fn page_parameters_are_clamped() {
        let page = Page::new(Some(-3), Some(10_000), 6);

        assert_eq!(page.number, 1);
        assert_eq!(page.size, MAX_PAGE_SIZE);
        assert_eq!(Page::new(None, None, 6).size, 6);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let page = Page::new(Some(i64::MAX / 2), Some(6), 6);

        assert_eq!(page.offset(), i64::MAX);
        assert!(page.ensure_exists(0).is_err());

        let context = PageContext::from_rows(vec![1], 20, page, link);
        assert!(context.next.is_none());
        assert_eq!(
            context.previous,
            Some(format!("/api/recipes/?page={}", i64::MAX / 2 - 1))
        );
    }

    #[test]
    fn empty_page_past_the_first_is_missing() {
        assert!(Page::new(Some(1), None, 6).ensure_exists(0).is_ok());
        assert!(Page::new(Some(3), None, 6).ensure_exists(0).is_err());
        assert!(Page::new(Some(3), None, 6).ensure_exists(2).is_ok());
    }
}
