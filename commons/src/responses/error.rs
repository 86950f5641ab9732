//! Error envelope and the [`ApiError`] handler error type.

use actix_web::http::StatusCode;
use actix_web::http::header::HeaderValue;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use pagination::{CursorError, PaginationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::middleware::request_id::{REQUEST_ID_HEADER, RequestContext, RequestId};

/// Convenient result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Stable machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed request.
    BadRequest,
    /// Missing or invalid credentials.
    Unauthorized,
    /// Authenticated but not permitted.
    Forbidden,
    /// Resource does not exist.
    NotFound,
    /// Method not supported on the resource.
    MethodNotAllowed,
    /// Request conflicts with current state.
    Conflict,
    /// Well-formed but semantically invalid.
    UnprocessableEntity,
    /// Rate limited.
    TooManyRequests,
    /// Unexpected server failure.
    InternalError,
    /// Dependency or service not ready.
    ServiceUnavailable,
    /// Field validation failed.
    ValidationFailed,
    /// Database failure.
    DatabaseError,
    /// Upstream service failure.
    ExternalServiceError,
}

impl ErrorCode {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::Conflict => "conflict",
            Self::UnprocessableEntity => "unprocessable_entity",
            Self::TooManyRequests => "too_many_requests",
            Self::InternalError => "internal_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::ValidationFailed => "validation_failed",
            Self::DatabaseError => "database_error",
            Self::ExternalServiceError => "external_service_error",
        }
    }

    /// Status used by the per-code constructors.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadRequest | Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict => StatusCode::CONFLICT,
            Self::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError | Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ExternalServiceError => StatusCode::BAD_GATEWAY,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Optional elaboration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
    /// Request path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Correlating request identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Structured extras such as field errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Handler error rendered as an [`ErrorResponse`].
///
/// Constructors capture the path and request identifier of the request in
/// scope (see [`crate::middleware::RequestIdMiddleware`]), so handlers can
/// simply return `Err(ApiError::not_found("..."))`.
///
/// # Examples
/// ```
/// use actix_web::{ResponseError, http::StatusCode};
/// use service_commons::responses::{ApiError, ErrorCode};
///
/// let err = ApiError::conflict("already exists").with_details("email taken");
/// assert_eq!(err.code(), ErrorCode::Conflict);
/// assert_eq!(err.status_code(), StatusCode::CONFLICT);
/// ```
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    code: ErrorCode,
    message: String,
    details: Option<String>,
    metadata: Option<Value>,
    path: Option<String>,
    request_id: Option<String>,
}

impl ApiError {
    /// Error with an explicit status and code.
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        let context = RequestContext::current();
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            metadata: None,
            path: context.as_ref().map(|ctx| ctx.path.clone()),
            request_id: context.map(|ctx| ctx.id.to_string()),
        }
    }

    /// Error using the default status for `code`.
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.status(), code, message)
    }

    /// Attach a details string.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach structured metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Take path and request identifier from `req`.
    #[must_use]
    pub fn with_request(mut self, req: &HttpRequest) -> Self {
        self.path = Some(req.path().to_owned());
        if let Some(id) = RequestId::from_request(req) {
            self.request_id = Some(id.to_string());
        }
        self
    }

    /// Set the request identifier.
    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// 400 `bad_request`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::BadRequest, message)
    }

    /// 401 `unauthorized`.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::Unauthorized, message)
    }

    /// 403 `forbidden`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::Forbidden, message)
    }

    /// 404 `not_found`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::NotFound, message)
    }

    /// 405 `method_not_allowed`.
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::MethodNotAllowed, message)
    }

    /// 409 `conflict`.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::Conflict, message)
    }

    /// 422 `unprocessable_entity`.
    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::UnprocessableEntity, message)
    }

    /// 429 `too_many_requests`.
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::TooManyRequests, message)
    }

    /// 500 `internal_error`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::InternalError, message)
    }

    /// 503 `service_unavailable`.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::ServiceUnavailable, message)
    }

    /// 400 `validation_failed` carrying `errors` as metadata.
    pub fn validation(message: impl Into<String>, errors: impl Serialize) -> Self {
        let error = Self::from_code(ErrorCode::ValidationFailed, message);
        match serde_json::to_value(errors) {
            Ok(metadata) => error.with_metadata(metadata),
            Err(err) => {
                error!(error = %err, "failed to serialise validation errors");
                error
            }
        }
    }

    /// 500 `database_error`.
    pub fn database(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::DatabaseError, message)
    }

    /// 502 `external_service_error`.
    pub fn external_service(message: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::ExternalServiceError, message)
    }

    /// Machine-readable code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Details string, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Metadata, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    /// Captured request path.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Captured request identifier.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Envelope stamped with the current time.
    #[must_use]
    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.message.clone(),
            code: self.code,
            details: self.details.clone(),
            timestamp: Utc::now(),
            path: self.path.clone(),
            request_id: self.request_id.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status);
        if let Some(value) = self
            .request_id
            .as_deref()
            .and_then(|id| HeaderValue::from_str(id).ok())
        {
            builder.insert_header((REQUEST_ID_HEADER, value));
        }
        builder.json(self.to_body())
    }
}

impl From<actix_web::Error> for ApiError {
    fn from(err: actix_web::Error) -> Self {
        // Do not leak implementation details to clients.
        error!(error = %err, "actix error promoted to API error");
        Self::internal("Internal server error")
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<CursorError> for ApiError {
    fn from(err: CursorError) -> Self {
        Self::bad_request("Invalid cursor").with_details(err.to_string())
    }
}

/// Render an error for `req` without going through [`ApiError`] plumbing.
///
/// # Examples
/// ```
/// use actix_web::{HttpRequest, HttpResponse, http::StatusCode};
/// use service_commons::responses::{ErrorCode, error_response};
///
/// async fn handler(req: HttpRequest) -> HttpResponse {
///     error_response(&req, StatusCode::GONE, ErrorCode::NotFound, "moved on")
/// }
/// ```
#[must_use]
pub fn error_response(
    req: &HttpRequest,
    status: StatusCode,
    code: ErrorCode,
    message: &str,
) -> HttpResponse {
    ApiError::new(status, code, message)
        .with_request(req)
        .error_response()
}

/// [`error_response`] with a details string.
#[must_use]
pub fn error_response_with_details(
    req: &HttpRequest,
    status: StatusCode,
    code: ErrorCode,
    message: &str,
    details: &str,
) -> HttpResponse {
    ApiError::new(status, code, message)
        .with_details(details)
        .with_request(req)
        .error_response()
}

/// [`error_response`] with structured metadata.
#[must_use]
pub fn error_response_with_metadata(
    req: &HttpRequest,
    status: StatusCode,
    code: ErrorCode,
    message: &str,
    metadata: Value,
) -> HttpResponse {
    ApiError::new(status, code, message)
        .with_metadata(metadata)
        .with_request(req)
        .error_response()
}
