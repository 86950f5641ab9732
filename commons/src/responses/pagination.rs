//! Paginated envelopes and lenient query extractors.

use std::ops::Deref;

use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{FromRequest, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::future::{Ready, ready};
use pagination::{PageLimits, PageLinks, PageMeta, PageParams};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Flat envelope: `{data, total, page, page_size, total_pages, has_next,
/// has_prev, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// Items on this page.
    pub data: T,
    /// Position of the page within the result set.
    #[serde(flatten)]
    pub meta: PageMeta,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// Envelope with nested metadata: `{data, meta, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPaginatedResponse<T> {
    /// Items on this page.
    pub data: T,
    /// Position of the page within the result set.
    pub meta: PageMeta,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// Envelope with navigation links: `{data, meta, links, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedPaginatedResponse<T> {
    /// Items on this page.
    pub data: T,
    /// Position of the page within the result set.
    pub meta: PageMeta,
    /// Navigation links.
    pub links: PageLinks,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// Keyset envelope: `{data, next_cursor?, prev_cursor?, has_next, has_prev,
/// timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPaginatedResponse<T> {
    /// Items on this page.
    pub data: T,
    /// Cursor for the following page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Cursor for the preceding page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_cursor: Option<String>,
    /// Whether a following page exists.
    pub has_next: bool,
    /// Whether a preceding page exists.
    pub has_prev: bool,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// 200 flat paginated envelope.
///
/// # Examples
/// ```
/// use actix_web::http::StatusCode;
/// use service_commons::responses::paginated;
///
/// let response = paginated(vec!["a", "b"], 12, 1, 2);
/// assert_eq!(response.status(), StatusCode::OK);
/// ```
pub fn paginated<T: Serialize>(data: T, total: u64, page: u32, page_size: u32) -> HttpResponse {
    paginated_with_status(StatusCode::OK, data, total, page, page_size)
}

/// Flat paginated envelope with an arbitrary status.
pub fn paginated_with_status<T: Serialize>(
    status: StatusCode,
    data: T,
    total: u64,
    page: u32,
    page_size: u32,
) -> HttpResponse {
    HttpResponse::build(status).json(PaginatedResponse {
        data,
        meta: PageMeta::new(total, page, page_size),
        timestamp: Utc::now(),
    })
}

/// 200 envelope with caller-supplied metadata.
pub fn paginated_with_meta<T: Serialize>(data: T, meta: PageMeta) -> HttpResponse {
    HttpResponse::Ok().json(MetaPaginatedResponse {
        data,
        meta,
        timestamp: Utc::now(),
    })
}

/// 200 envelope with navigation links built from `base_url`.
pub fn paginated_with_links<T: Serialize>(
    data: T,
    total: u64,
    page: u32,
    page_size: u32,
    base_url: &str,
) -> HttpResponse {
    let meta = PageMeta::new(total, page, page_size);
    HttpResponse::Ok().json(LinkedPaginatedResponse {
        data,
        links: PageLinks::build(base_url, &meta),
        meta,
        timestamp: Utc::now(),
    })
}

/// 200 keyset envelope.
pub fn cursor_paginated<T: Serialize>(
    data: T,
    next_cursor: Option<String>,
    prev_cursor: Option<String>,
    has_next: bool,
    has_prev: bool,
) -> HttpResponse {
    HttpResponse::Ok().json(CursorPaginatedResponse {
        data,
        next_cursor,
        prev_cursor,
        has_next,
        has_prev,
        timestamp: Utc::now(),
    })
}

/// 200 flat envelope with no items.
#[must_use]
pub fn empty_paginated(page: u32, page_size: u32) -> HttpResponse {
    paginated(Vec::<()>::new(), 0, page, page_size)
}

fn query_value(req: &HttpRequest, key: &str) -> Option<String> {
    form_urlencoded::parse(req.query_string().as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
}

/// Offset pagination parameters read leniently from `page` and
/// `page_size`.
///
/// Missing or invalid values fall back to the defaults; oversized page sizes
/// are clamped. Register a [`PageLimits`] as app data to change the defaults.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use service_commons::responses::{PageQuery, paginated};
///
/// async fn list(query: PageQuery) -> HttpResponse {
///     let items: Vec<String> = Vec::new();
///     paginated(items, 0, query.page, query.page_size)
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery(pub PageParams);

impl PageQuery {
    /// Parameters read from `req`.
    #[must_use]
    pub fn from_http_request(req: &HttpRequest) -> Self {
        let limits = req.app_data::<PageLimits>().copied().unwrap_or_default();
        let page = query_value(req, "page");
        let page_size = query_value(req, "page_size");
        Self(PageParams::from_query(
            page.as_deref(),
            page_size.as_deref(),
            limits,
        ))
    }

    /// Unwrap the parameters.
    #[must_use]
    pub fn into_inner(self) -> PageParams {
        self.0
    }
}

impl Deref for PageQuery {
    type Target = PageParams;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for PageQuery {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_http_request(req)))
    }
}

/// Keyset parameters read leniently from `cursor` and `limit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorQuery {
    /// Opaque cursor; absent when empty.
    pub cursor: Option<String>,
    /// Items to fetch, within `1..=max_page_size`.
    pub limit: u32,
}

impl CursorQuery {
    /// Parameters read from `req`.
    #[must_use]
    pub fn from_http_request(req: &HttpRequest) -> Self {
        let limits = req.app_data::<PageLimits>().copied().unwrap_or_default();
        let cursor = query_value(req, "cursor").filter(|value| !value.trim().is_empty());
        let limit = query_value(req, "limit")
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|value| *value >= 1)
            .map_or(limits.default_page_size, |value| {
                u32::try_from(value).unwrap_or(u32::MAX)
            })
            .min(limits.max_page_size);
        Self { cursor, limit }
    }
}

impl FromRequest for CursorQuery {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_http_request(req)))
    }
}
