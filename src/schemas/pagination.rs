use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page number
    pub page: Option<String>,
    pub page_size: Option<u64>,
}

/// A validated page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub page_size: u64,
}

impl PageWindow {
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

impl PageQuery {
    /// Resolve the requested page against `count` rows.
    ///
    /// The first page is always valid, even when there are no rows.
    pub fn window(&self, count: u64) -> Result<PageWindow> {
        let page_size = self
            .page_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        let page = match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| AppError::NotFound("Invalid page.".to_string()))?,
        };
        let pages = count.div_ceil(page_size).max(1);
        if page == 0 || page > pages {
            return Err(AppError::NotFound("Invalid page.".to_string()));
        }
        Ok(PageWindow { page, page_size })
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

fn page_link(path: &str, params: &[(&str, String)], page: u64, page_size: u64) -> String {
    let mut query: Vec<String> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    query.push(format!("page={}", page));
    if page_size != DEFAULT_PAGE_SIZE {
        query.push(format!("page_size={}", page_size));
    }
    format!("{}?{}", path, query.join("&"))
}

impl<T> Paginated<T> {
    /// Wrap one page of results. `params` are the filters to carry into the links.
    pub fn new(
        results: Vec<T>,
        count: u64,
        window: PageWindow,
        path: &str,
        params: &[(&str, String)],
    ) -> Self {
        let pages = count.div_ceil(window.page_size).max(1);
        let next = (window.page < pages)
            .then(|| page_link(path, params, window.page + 1, window.page_size));
        let previous = (window.page > 1)
            .then(|| page_link(path, params, window.page - 1, window.page_size));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, page_size: Option<u64>) -> PageQuery {
        PageQuery {
            page: page.map(str::to_string),
            page_size,
        }
    }

    #[test]
    fn test_defaults_and_cap() {
        let w = query(None, None).window(0).unwrap();
        assert_eq!(w, PageWindow { page: 1, page_size: 20 });

        let w = query(None, Some(1000)).window(500).unwrap();
        assert_eq!(w.page_size, 100);
    }

    #[test]
    fn test_invalid_pages() {
        assert!(matches!(query(Some("0"), None).window(5), Err(AppError::NotFound(_))));
        assert!(matches!(query(Some("2"), None).window(20), Err(AppError::NotFound(_))));
        assert!(matches!(query(Some("abc"), None).window(20), Err(AppError::NotFound(_))));
        assert!(query(Some("2"), None).window(21).is_ok());
    }

    #[test]
    fn test_links() {
        let window = query(Some("2"), Some(10)).window(35).unwrap();
        assert_eq!(window.offset(), 10);

        let page: Paginated<i32> = Paginated::new(
            vec![],
            35,
            window,
            "/api/v1/courses",
            &[("search", "rust intro".to_string())],
        );
        assert_eq!(
            page.next.as_deref(),
            Some("/api/v1/courses?search=rust%20intro&page=3&page_size=10")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/v1/courses?search=rust%20intro&page=1&page_size=10")
        );
    }

    #[test]
    fn test_single_page_has_no_links() {
        let window = query(None, None).window(3).unwrap();
        let page = Paginated::new(vec![1, 2, 3], 3, window, "/api/v1/users", &[]);
        assert!(page.next.is_none());
        assert!(page.previous.is_none());
    }
}
