//! Client pagination and sorting requests.

use serde::{Deserialize, Deserializer, Serialize};

use crate::page::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, offset};

/// Column used for ordering when the client does not pick one.
pub const DEFAULT_SORT_BY: &str = "created_at";

/// Requested ordering direction.
///
/// Deserialisation is lenient in the same way as [`SortOrder::parse_lenient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse a client-supplied order; anything other than `asc` is descending.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    /// SQL keyword for the direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl<'de> Deserialize<'de> for SortOrder {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

/// Offset pagination request with sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationRequest {
    /// One-based page number.
    pub page: i64,
    /// Requested page size.
    pub page_size: i64,
    /// Column to order by.
    pub sort_by: String,
    /// Ordering direction.
    pub sort_order: SortOrder,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page: i64::from(DEFAULT_PAGE),
            page_size: i64::from(DEFAULT_PAGE_SIZE),
            sort_by: DEFAULT_SORT_BY.to_owned(),
            sort_order: SortOrder::Desc,
        }
    }
}

impl PaginationRequest {
    /// Clamp the request into the accepted range in place.
    ///
    /// A page below one becomes one, a page size below one becomes the
    /// default, and an oversized page size becomes the ceiling. An empty sort
    /// column falls back to [`DEFAULT_SORT_BY`].
    pub fn normalise(&mut self) {
        if self.page < 1 {
            self.page = i64::from(DEFAULT_PAGE);
        }
        if self.page_size < 1 {
            self.page_size = i64::from(DEFAULT_PAGE_SIZE);
        }
        if self.page_size > i64::from(MAX_PAGE_SIZE) {
            self.page_size = i64::from(MAX_PAGE_SIZE);
        }
        if self.sort_by.trim().is_empty() {
            DEFAULT_SORT_BY.clone_into(&mut self.sort_by);
        }
    }

    /// Rows to skip for the normalised request.
    #[must_use]
    pub fn offset(&self) -> u64 {
        let page = u32::try_from(self.page.max(1)).unwrap_or(u32::MAX);
        offset(page, self.limit())
    }

    /// Rows to fetch for the normalised request.
    #[must_use]
    pub fn limit(&self) -> u32 {
        u32::try_from(self.page_size.clamp(1, i64::from(MAX_PAGE_SIZE)))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// Keyset pagination request with sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorPaginationRequest {
    /// Opaque position returned by a previous page.
    pub cursor: Option<String>,
    /// Requested number of items.
    pub limit: i64,
    /// Column to order by.
    pub sort_by: String,
    /// Ordering direction.
    pub sort_order: SortOrder,
}

impl Default for CursorPaginationRequest {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: i64::from(DEFAULT_PAGE_SIZE),
            sort_by: DEFAULT_SORT_BY.to_owned(),
            sort_order: SortOrder::Desc,
        }
    }
}

impl CursorPaginationRequest {
    /// Clamp the limit into `1..=MAX_PAGE_SIZE` and drop empty cursors.
    pub fn normalise(&mut self) {
        if self.limit < 1 {
            self.limit = i64::from(DEFAULT_PAGE_SIZE);
        }
        if self.limit > i64::from(MAX_PAGE_SIZE) {
            self.limit = i64::from(MAX_PAGE_SIZE);
        }
        if self.cursor.as_deref().is_some_and(|c| c.trim().is_empty()) {
            self.cursor = None;
        }
        if self.sort_by.trim().is_empty() {
            DEFAULT_SORT_BY.clone_into(&mut self.sort_by);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("asc", SortOrder::Asc)]
    #[case("ASC", SortOrder::Asc)]
    #[case("desc", SortOrder::Desc)]
    #[case("sideways", SortOrder::Desc)]
    #[case("", SortOrder::Desc)]
    fn sort_order_is_lenient(#[case] raw: &str, #[case] expected: SortOrder) {
        assert_eq!(SortOrder::parse_lenient(raw), expected);
    }

    #[rstest]
    fn defaults_match_documented_values() {
        let request = PaginationRequest::default();
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 10);
        assert_eq!(request.sort_by, "created_at");
        assert_eq!(request.sort_order, SortOrder::Desc);
    }

    #[rstest]
    #[case(0, 0, 1, 10)]
    #[case(-3, 250, 1, 100)]
    #[case(4, 25, 4, 25)]
    fn pagination_request_normalises(
        #[case] page: i64,
        #[case] page_size: i64,
        #[case] expected_page: i64,
        #[case] expected_size: i64,
    ) {
        let mut request = PaginationRequest {
            page,
            page_size,
            sort_by: String::new(),
            sort_order: SortOrder::Asc,
        };
        request.normalise();
        assert_eq!(request.page, expected_page);
        assert_eq!(request.page_size, expected_size);
        assert_eq!(request.sort_by, DEFAULT_SORT_BY);
        assert_eq!(request.sort_order, SortOrder::Asc);
    }

    #[rstest]
    fn offset_and_limit_follow_page() {
        let request = PaginationRequest {
            page: 3,
            page_size: 20,
            ..PaginationRequest::default()
        };
        assert_eq!(request.offset(), 40);
        assert_eq!(request.limit(), 20);
    }

    #[rstest]
    fn cursor_request_normalises() {
        let mut request = CursorPaginationRequest {
            cursor: Some("  ".to_owned()),
            limit: 500,
            ..CursorPaginationRequest::default()
        };
        request.normalise();
        assert_eq!(request.limit, 100);
        assert!(request.cursor.is_none());
    }

    #[rstest]
    fn deserialises_with_missing_fields() {
        let request: PaginationRequest =
            serde_json::from_str(r#"{"page": 2, "sort_order": "asc"}"#).expect("valid json");
        assert_eq!(request.page, 2);
        assert_eq!(request.page_size, 10);
        assert_eq!(request.sort_order, SortOrder::Asc);
    }

    #[rstest]
    #[case(r#"{"sort_order": "ASC"}"#, SortOrder::Asc)]
    #[case(r#"{"sort_order": " asc "}"#, SortOrder::Asc)]
    #[case(r#"{"sort_order": "sideways"}"#, SortOrder::Desc)]
    #[case(r#"{"sort_order": ""}"#, SortOrder::Desc)]
    fn unknown_sort_orders_deserialise_as_descending(
        #[case] body: &str,
        #[case] expected: SortOrder,
    ) {
        let request: PaginationRequest = serde_json::from_str(body).expect("lenient sort order");
        assert_eq!(request.sort_order, expected);

        let cursor: CursorPaginationRequest =
            serde_json::from_str(body).expect("lenient sort order");
        assert_eq!(cursor.sort_order, expected);
    }
}
