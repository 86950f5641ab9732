//! HATEOAS navigation links for offset pagination.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::page::PageMeta;

/// Navigation links for a page; `next` and `prev` are present only when that
/// page exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    /// Link to the current page.
    #[serde(rename = "self")]
    pub self_link: String,
    /// Link to the first page.
    pub first: String,
    /// Link to the last page.
    pub last: String,
    /// Link to the following page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Link to the preceding page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

impl PageLinks {
    /// Build links relative to `base_url`, which may be absolute or a path.
    ///
    /// # Examples
    /// ```
    /// use pagination::{PageLinks, PageMeta};
    ///
    /// let links = PageLinks::build("/items", &PageMeta::new(30, 2, 10));
    /// assert_eq!(links.self_link, "/items?page=2&page_size=10");
    /// assert_eq!(links.next.as_deref(), Some("/items?page=3&page_size=10"));
    /// ```
    #[must_use]
    pub fn build(base_url: &str, meta: &PageMeta) -> Self {
        let page = u64::from(meta.page);
        let link = |target: u64| page_url(base_url, target, meta.page_size);
        Self {
            self_link: link(page),
            first: link(1),
            last: link(meta.total_pages),
            next: meta.has_next.then(|| link(page + 1)),
            prev: meta.has_prev.then(|| link(page - 1)),
        }
    }
}

fn page_url(base_url: &str, page: u64, page_size: u32) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("page", &page.to_string())
        .append_pair("page_size", &page_size.to_string())
        .finish();
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn first_page_has_no_prev() {
        let links = PageLinks::build("https://api.test/items", &PageMeta::new(25, 1, 10));
        assert_eq!(links.first, "https://api.test/items?page=1&page_size=10");
        assert_eq!(links.last, "https://api.test/items?page=3&page_size=10");
        assert!(links.prev.is_none());
        assert_eq!(
            links.next.as_deref(),
            Some("https://api.test/items?page=2&page_size=10")
        );
    }

    #[rstest]
    fn last_page_has_no_next() {
        let links = PageLinks::build("/items", &PageMeta::new(25, 3, 10));
        assert!(links.next.is_none());
        assert_eq!(links.prev.as_deref(), Some("/items?page=2&page_size=10"));
    }

    #[rstest]
    fn existing_query_is_extended() {
        let links = PageLinks::build("/items?q=a", &PageMeta::new(5, 1, 5));
        assert_eq!(links.self_link, "/items?q=a&page=1&page_size=5");
    }

    #[rstest]
    fn serialises_self_key() {
        let links = PageLinks::build("/items", &PageMeta::new(5, 1, 5));
        let json = serde_json::to_value(&links).expect("serialise");
        assert!(json.get("self").is_some());
        assert!(json.get("next").is_none());
    }
}
