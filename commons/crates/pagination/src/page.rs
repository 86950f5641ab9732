//! Offset pagination arithmetic.

use serde::{Deserialize, Serialize};

/// Page served when the client does not ask for one.
pub const DEFAULT_PAGE: u32 = 1;
/// Page size served when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Rejections raised by [`validate_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    /// The page number was zero.
    #[error("Page must be greater than 0")]
    InvalidPage,
    /// The page size was zero.
    #[error("Page size must be greater than 0")]
    InvalidPageSize,
    /// The page size exceeded the configured ceiling.
    #[error("Page size cannot exceed {max}")]
    PageSizeTooLarge {
        /// The configured maximum page size.
        max: u32,
    },
}

/// Defaults and ceiling used when normalising client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Fallback page number.
    pub default_page: u32,
    /// Fallback page size.
    pub default_page_size: u32,
    /// Largest accepted page size.
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page: DEFAULT_PAGE,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Build limits with custom defaults and ceiling.
    #[must_use]
    pub const fn new(default_page: u32, default_page_size: u32, max_page_size: u32) -> Self {
        Self {
            default_page,
            default_page_size,
            max_page_size,
        }
    }
}

/// Normalised offset pagination parameters ready for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// One-based page number.
    pub page: u32,
    /// Number of items per page.
    pub page_size: u32,
    /// Number of rows to skip.
    pub offset: u64,
    /// Number of rows to fetch; always equal to `page_size`.
    pub limit: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self::normalise(None, None, PageLimits::default())
    }
}

impl PageParams {
    /// Normalise already-parsed values.
    ///
    /// Missing or non-positive values fall back to the defaults in `limits`;
    /// oversized page sizes are clamped to the ceiling.
    ///
    /// # Examples
    /// ```
    /// use pagination::{PageLimits, PageParams};
    ///
    /// let params = PageParams::normalise(Some(3), Some(500), PageLimits::default());
    /// assert_eq!(params.page_size, 100);
    /// assert_eq!(params.offset, 200);
    /// ```
    #[must_use]
    pub fn normalise(page: Option<i64>, page_size: Option<i64>, limits: PageLimits) -> Self {
        let page = page
            .filter(|value| *value >= 1)
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(limits.default_page);
        let page_size = match page_size {
            Some(value) if value >= 1 => u32::try_from(value)
                .unwrap_or(u32::MAX)
                .min(limits.max_page_size),
            _ => limits.default_page_size.min(limits.max_page_size),
        };

        Self {
            page,
            page_size,
            offset: offset(page, page_size),
            limit: page_size,
        }
    }

    /// Normalise raw query-string values.
    ///
    /// Empty or unparsable strings are treated as absent.
    #[must_use]
    pub fn from_query(page: Option<&str>, page_size: Option<&str>, limits: PageLimits) -> Self {
        Self::normalise(parse_int(page), parse_int(page_size), limits)
    }
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse().ok())
}

/// Page metadata describing where a page sits in a result set.
///
/// # Examples
/// ```
/// use pagination::PageMeta;
///
/// let meta = PageMeta::new(25, 3, 10);
/// assert_eq!(meta.total_pages, 3);
/// assert!(!meta.has_next);
/// assert!(meta.has_prev);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Total number of items across all pages.
    pub total: u64,
    /// One-based page number.
    pub page: u32,
    /// Number of items per page.
    pub page_size: u32,
    /// Number of pages needed to hold `total` items.
    pub total_pages: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_prev: bool,
}

impl PageMeta {
    /// Compute metadata for `page` of a result set with `total` items.
    #[must_use]
    pub fn new(total: u64, page: u32, page_size: u32) -> Self {
        let total_pages = total_pages(total, page_size);
        Self {
            total,
            page,
            page_size,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Number of pages needed to hold `total` items, or zero for a zero page size.
#[must_use]
pub const fn total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size as u64)
}

/// Rows to skip before `page`; page zero is treated as the first page.
#[must_use]
pub const fn offset(page: u32, page_size: u32) -> u64 {
    (page.saturating_sub(1) as u64) * (page_size as u64)
}

/// Strictly validate client pagination input.
///
/// # Errors
///
/// Returns the first violated rule: page below one, page size below one, or
/// page size above [`MAX_PAGE_SIZE`].
pub const fn validate_page(page: u32, page_size: u32) -> Result<(), PaginationError> {
    if page < 1 {
        return Err(PaginationError::InvalidPage);
    }
    if page_size < 1 {
        return Err(PaginationError::InvalidPageSize);
    }
    if page_size > MAX_PAGE_SIZE {
        return Err(PaginationError::PageSizeTooLarge { max: MAX_PAGE_SIZE });
    }
    Ok(())
}
