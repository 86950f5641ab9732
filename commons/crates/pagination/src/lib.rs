//! Pagination primitives shared by service-commons HTTP helpers.
//!
//! This crate stays free of any web framework so the arithmetic and encoding
//! rules can be reused by handlers, repositories and tests alike:
//!
//! - [`PageMeta`] and [`PageParams`] cover offset pagination (`page`,
//!   `page_size`, `offset`, `limit`).
//! - [`PaginationRequest`] and [`CursorPaginationRequest`] carry the client
//!   sorting preferences and normalise them to safe values.
//! - [`Cursor`] encodes opaque keyset positions as URL-safe base64 JSON.
//! - [`PageLinks`] derives HATEOAS navigation links for a page.

mod cursor;
mod links;
mod page;
mod request;

pub use cursor::{Cursor, CursorError};
pub use links::PageLinks;
pub use page::{
    DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageLimits, PageMeta, PageParams,
    PaginationError, offset, total_pages, validate_page,
};
pub use request::{CursorPaginationRequest, DEFAULT_SORT_BY, PaginationRequest, SortOrder};
