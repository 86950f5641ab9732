//! JSON response envelopes.
//!
//! Every body carries a UTC `timestamp`. Success helpers return a ready
//! [`actix_web::HttpResponse`]; failures are modelled by [`ApiError`], which
//! handlers return through [`ApiResult`].

pub mod error;
pub mod pagination;
pub mod success;

pub use error::{
    ApiError, ApiResult, ErrorCode, ErrorResponse, error_response, error_response_with_details,
    error_response_with_metadata,
};
pub use pagination::{
    CursorPaginatedResponse, CursorQuery, LinkedPaginatedResponse, MetaPaginatedResponse,
    PageQuery, PaginatedResponse, cursor_paginated, empty_paginated, paginated,
    paginated_with_links, paginated_with_meta, paginated_with_status,
};
pub use success::{
    DataResponse, MessageResponse, SuccessResponse, accepted, created, data_only, json,
    message_only, no_content, ok, permanent_redirect, redirect, success, success_with_status,
    with_headers, with_request_id,
};
