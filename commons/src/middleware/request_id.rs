//! Request identifier middleware.
//!
//! Each request is tagged with an identifier taken from the incoming
//! `X-Request-ID` header or freshly generated. The identifier is stored in
//! the request extensions, echoed on the response, and kept in task-local
//! storage together with the request path so error payloads built anywhere
//! inside the handler can be correlated.
//!
//! Tokio task-local variables are not inherited across spawned tasks. Use
//! [`RequestContext::scope`] when moving work onto other tasks.

use std::future::Future;
use std::task::{Context, Poll};

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, HttpMessage, HttpRequest};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tokio::task_local;
use tracing::error;
use uuid::Uuid;

/// Default header carrying the request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

/// Identifier correlating a request across logs and responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier of the request currently in scope.
    ///
    /// # Examples
    /// ```
    /// use service_commons::middleware::RequestId;
    ///
    /// async fn handler() -> String {
    ///     RequestId::current()
    ///         .map(|id| id.to_string())
    ///         .unwrap_or_default()
    /// }
    /// ```
    #[must_use]
    pub fn current() -> Option<Self> {
        REQUEST_CONTEXT.try_with(|ctx| ctx.id.clone()).ok()
    }

    /// Identifier stored on `req` by [`RequestIdMiddleware`].
    #[must_use]
    pub fn from_request(req: &HttpRequest) -> Option<Self> {
        req.extensions().get::<Self>().cloned()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier and path of the request being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Request identifier.
    pub id: RequestId,
    /// Request path without the query string.
    pub path: String,
}

impl RequestContext {
    /// Context of the request currently in scope.
    #[must_use]
    pub fn current() -> Option<Self> {
        REQUEST_CONTEXT.try_with(Clone::clone).ok()
    }

    /// Run `fut` with `context` in scope.
    ///
    /// # Examples
    /// ```
    /// use service_commons::middleware::{RequestContext, RequestId};
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let context = RequestContext {
    ///     id: RequestId::new("abc"),
    ///     path: "/orders".to_owned(),
    /// };
    /// let observed = RequestContext::scope(context, async { RequestId::current() }).await;
    /// assert_eq!(observed, Some(RequestId::new("abc")));
    /// # });
    /// ```
    pub async fn scope<Fut>(context: Self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        REQUEST_CONTEXT.scope(context, fut).await
    }
}

/// 16 lowercase hex characters from 8 random bytes.
#[must_use]
pub fn generate_request_id() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

/// 8 lowercase hex characters from 4 random bytes.
#[must_use]
pub fn generate_short_request_id() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}

/// Hyphenated UUID v4.
#[must_use]
pub fn generate_uuid_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Middleware assigning a [`RequestId`] to every request.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use service_commons::middleware::RequestIdMiddleware;
///
/// let app = App::new().wrap(RequestIdMiddleware::default());
/// let short = App::new().wrap(RequestIdMiddleware::short());
/// ```
#[derive(Clone)]
pub struct RequestIdMiddleware {
    header: HeaderName,
    generator: fn() -> String,
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(REQUEST_ID_HEADER),
            generator: generate_request_id,
        }
    }
}

impl RequestIdMiddleware {
    /// Use `generator` for requests without an identifier.
    #[must_use]
    pub fn with_generator(generator: fn() -> String) -> Self {
        Self {
            generator,
            ..Self::default()
        }
    }

    /// Read and echo `header` instead of `X-Request-ID`.
    #[must_use]
    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    /// Eight-character identifiers.
    #[must_use]
    pub fn short() -> Self {
        Self::with_generator(generate_short_request_id)
    }

    /// UUID identifiers.
    #[must_use]
    pub fn uuid() -> Self {
        Self::with_generator(generate_uuid_request_id)
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestIdService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdService {
            service,
            header: self.header.clone(),
            generator: self.generator,
        }))
    }
}

/// Service wrapper produced by [`RequestIdMiddleware`].
pub struct RequestIdService<S> {
    service: S,
    header: HeaderName,
    generator: fn() -> String,
}

impl<S, B> Service<ServiceRequest> for RequestIdService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let incoming = req
            .headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);
        let id = RequestId(incoming.unwrap_or_else(self.generator));
        req.extensions_mut().insert(id.clone());

        let context = RequestContext {
            id: id.clone(),
            path: req.path().to_owned(),
        };
        let header = self.header.clone();
        let http_req = req.request().clone();
        let fut = REQUEST_CONTEXT.sync_scope(context.clone(), || self.service.call(req));
        Box::pin(RequestContext::scope(context, async move {
            let mut res = match fut.await {
                Ok(res) => res.map_into_left_body(),
                Err(err) => ServiceResponse::from_err(err, http_req).map_into_right_body(),
            };
            match HeaderValue::from_str(id.as_str()) {
                Ok(value) => {
                    res.response_mut().headers_mut().insert(header, value);
                }
                Err(error) => {
                    error!(%error, request_id = %id, "failed to encode request id header");
                }
            }
            Ok(res)
        }))
    }
}
