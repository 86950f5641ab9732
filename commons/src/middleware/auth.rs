//! Authentication and role guards.
//!
//! [`Authentication`] extracts a token, optionally validates it through a
//! [`TokenValidator`], and stores the resulting [`Claims`] in the request
//! extensions. [`RequireRole`] then gates routes on the stored roles. Token
//! cryptography is left to the validator supplied by the embedding service.

use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::body::EitherBody;
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::form_urlencoded;

use crate::config::AuthConfig;

/// Header read by [`TokenSource::ApiKeyHeader`].
pub const API_KEY_HEADER: &str = "x-api-key";

/// Challenge sent with basic authentication failures.
pub const BASIC_CHALLENGE: &str = "Basic realm=\"Authorization Required\"";

/// Authentication failures, rendered as `401 {error, code}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer token was sent.
    #[error("Authorization token is required")]
    MissingToken,
    /// The query parameter carrying the token was absent.
    #[error("Token parameter is required")]
    MissingTokenParameter,
    /// The `Authorization` header did not use the bearer scheme.
    #[error("Authorization header must use Bearer format")]
    InvalidAuthFormat,
    /// The validator rejected the token.
    #[error("Invalid authorization token")]
    InvalidToken,
    /// The validator found the token expired.
    #[error("Authorization token has expired")]
    ExpiredToken,
    /// No API key was sent.
    #[error("API key is required")]
    MissingApiKey,
    /// The API key is unknown.
    #[error("Invalid API key")]
    InvalidApiKey,
    /// No basic credentials were sent.
    #[error("Basic credentials are required")]
    MissingCredentials,
    /// Basic credentials were malformed or did not match.
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// Stored roles do not satisfy the route.
    #[error("Insufficient permissions for this operation")]
    InsufficientPermissions,
    /// Any other validator failure.
    #[error("Authentication failed")]
    Failed { reason: String },
}

impl AuthError {
    /// Machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingToken | Self::MissingTokenParameter => "missing_token",
            Self::InvalidAuthFormat => "invalid_auth_format",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::MissingApiKey => "missing_api_key",
            Self::InvalidApiKey => "invalid_api_key",
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::Failed { .. } => "auth_failed",
        }
    }

    /// Generic failure carrying a reason for the logs.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// JSON body of an authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code.
    pub code: String,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Failed { reason } = self {
            debug!(%reason, "authentication failed");
        }
        let mut response = HttpResponse::Unauthorized();
        if matches!(self, Self::MissingCredentials | Self::InvalidCredentials) {
            response.insert_header((WWW_AUTHENTICATE, BASIC_CHALLENGE));
        }
        response.json(AuthErrorResponse {
            error: self.to_string(),
            code: self.code().to_owned(),
        })
    }
}

/// Claims established for the current request.
///
/// Handlers can extract `Claims` directly (401 when absent) or
/// `Option<Claims>` on routes using optional authentication.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use service_commons::middleware::Claims;
///
/// let claims = Claims::from_value(json!({"sub": "u-1", "roles": ["admin"]}));
/// assert_eq!(claims.user_id(), Some("u-1"));
/// assert!(claims.has_role("admin"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims from a JSON object; other values yield an empty set.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Set `key` to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw claim.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// `user_id`, falling back to the token subject.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.get("user_id")
            .or_else(|| self.get("sub"))
            .and_then(Value::as_str)
    }

    /// String entries of the `roles` claim.
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        self.get("roles")
            .and_then(Value::as_array)
            .map(|roles| roles.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether `role` is among [`Claims::roles`].
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles().contains(&role)
    }
}

impl FromRequest for Claims {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Self>()
                .cloned()
                .ok_or(AuthError::MissingToken),
        )
    }
}

/// Turns a raw token into claims.
pub trait TokenValidator: Send + Sync {
    /// Validate `token`.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] to report to the client.
    fn validate(&self, token: &str) -> Result<Claims, AuthError>;
}

impl<F> TokenValidator for F
where
    F: Fn(&str) -> Result<Claims, AuthError> + Send + Sync,
{
    fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self(token)
    }
}

/// Where the credential is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// `X-API-Key: <key>`.
    ApiKeyHeader,
    /// A query parameter with the given name.
    Query(String),
    /// `Authorization: Basic <base64 user:password>`, yielding `user:password`.
    Basic,
}

impl TokenSource {
    /// Read the credential from `req`.
    ///
    /// # Errors
    ///
    /// Returns the missing-credential or format error for this source.
    pub fn extract(&self, req: &HttpRequest) -> Result<String, AuthError> {
        match self {
            Self::Bearer => {
                let header = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .filter(|value| !value.is_empty())
                    .ok_or(AuthError::MissingToken)?;
                let token = header
                    .strip_prefix("Bearer ")
                    .ok_or(AuthError::InvalidAuthFormat)?;
                if token.is_empty() {
                    return Err(AuthError::MissingToken);
                }
                Ok(token.to_owned())
            }
            Self::ApiKeyHeader => req
                .headers()
                .get(API_KEY_HEADER)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
                .ok_or(AuthError::MissingApiKey),
            Self::Query(name) => form_urlencoded::parse(req.query_string().as_bytes())
                .find(|(key, _)| key == name.as_str())
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty())
                .ok_or(AuthError::MissingTokenParameter),
            Self::Basic => {
                let encoded = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.strip_prefix("Basic "))
                    .ok_or(AuthError::MissingCredentials)?;
                let decoded = STANDARD
                    .decode(encoded.trim())
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .ok_or(AuthError::InvalidCredentials)?;
                if !decoded.contains(':') {
                    return Err(AuthError::InvalidCredentials);
                }
                Ok(decoded)
            }
        }
    }
}

/// Maps API keys to user identifiers.
///
/// # Examples
/// ```
/// use std::collections::HashMap;
/// use actix_web::App;
/// use service_commons::middleware::ApiKeyAuth;
///
/// let keys = HashMap::from([("k-123".to_owned(), "svc-reporting".to_owned())]);
/// let app = App::new().wrap(ApiKeyAuth::new(keys).middleware());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeyAuth {
    keys: HashMap<String, String>,
}

impl ApiKeyAuth {
    /// Accept the given key to user ID mapping.
    #[must_use]
    pub fn new(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }

    /// Middleware reading `X-API-Key` on every path.
    #[must_use]
    pub fn middleware(self) -> Authentication {
        Authentication::required(self)
            .with_source(TokenSource::ApiKeyHeader)
            .with_skip_paths(Vec::<String>::new())
    }
}

impl TokenValidator for ApiKeyAuth {
    fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.keys
            .get(token)
            .map(|user_id| {
                Claims::new()
                    .with("user_id", user_id.as_str())
                    .with("auth_method", "api_key")
            })
            .ok_or(AuthError::InvalidApiKey)
    }
}

/// Maps usernames to passwords for HTTP basic authentication.
///
/// # Examples
/// ```
/// use std::collections::HashMap;
/// use actix_web::App;
/// use service_commons::middleware::BasicAuth;
///
/// let users = HashMap::from([("ops".to_owned(), "s3cret".to_owned())]);
/// let app = App::new().wrap(BasicAuth::new(users).middleware());
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BasicAuth {
    credentials: HashMap<String, String>,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("users", &self.credentials.len())
            .finish()
    }
}

impl BasicAuth {
    /// Accept the given username to password mapping.
    #[must_use]
    pub fn new(credentials: HashMap<String, String>) -> Self {
        Self { credentials }
    }

    /// Middleware reading `Authorization: Basic` on every path.
    #[must_use]
    pub fn middleware(self) -> Authentication {
        Authentication::required(self)
            .with_source(TokenSource::Basic)
            .with_skip_paths(Vec::<String>::new())
    }
}

impl TokenValidator for BasicAuth {
    fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let (user, password) = token
            .split_once(':')
            .ok_or(AuthError::InvalidCredentials)?;
        match self.credentials.get(user) {
            Some(expected) if expected == password => Ok(Claims::new()
                .with("user_id", user)
                .with("preferred_username", user)
                .with("auth_method", "basic")),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}

#[derive(Clone)]
struct AuthSettings {
    skip_paths: Vec<String>,
    source: TokenSource,
    validator: Option<Arc<dyn TokenValidator>>,
    optional: bool,
}

impl AuthSettings {
    fn skips(&self, path: &str) -> bool {
        self.skip_paths
            .iter()
            .any(|skip| path == skip || path.starts_with(skip.as_str()))
    }

    fn authenticate(&self, req: &ServiceRequest) -> Result<Option<Claims>, AuthError> {
        let token = self.source.extract(req.request())?;
        self.validator
            .as_ref()
            .map(|validator| validator.validate(&token))
            .transpose()
    }

    fn inspect(&self, req: &ServiceRequest) -> Result<(), AuthError> {
        if self.skips(req.path()) {
            return Ok(());
        }
        match self.authenticate(req) {
            Ok(Some(claims)) => {
                req.extensions_mut().insert(claims);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) if self.optional => {
                debug!(code = err.code(), "continuing without authentication");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Token authentication middleware.
///
/// Skips `/health` and `/metrics` (prefix match) by default. Without a
/// validator it only requires that a token is present.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use service_commons::middleware::{AuthError, Authentication, Claims};
///
/// let auth = Authentication::required(|token: &str| {
///     if token == "letmein" {
///         Ok(Claims::new().with("sub", "u-1"))
///     } else {
///         Err(AuthError::InvalidToken)
///     }
/// });
/// let app = App::new().wrap(auth);
/// ```
#[derive(Clone)]
pub struct Authentication {
    settings: Arc<AuthSettings>,
}

impl Default for Authentication {
    fn default() -> Self {
        Self {
            settings: Arc::new(AuthSettings {
                skip_paths: vec!["/health".to_owned(), "/metrics".to_owned()],
                source: TokenSource::Bearer,
                validator: None,
                optional: false,
            }),
        }
    }
}

impl Authentication {
    /// Reject requests whose token fails `validator`.
    #[must_use]
    pub fn required(validator: impl TokenValidator + 'static) -> Self {
        Self::default().with_validator(validator)
    }

    /// Validate tokens when present but never reject the request.
    #[must_use]
    pub fn optional(validator: impl TokenValidator + 'static) -> Self {
        let mut auth = Self::required(validator);
        Arc::make_mut(&mut auth.settings).optional = true;
        auth
    }

    /// Skip paths taken from `KEYCLOAK_SKIP_PATHS`.
    #[must_use]
    pub fn from_config(config: &AuthConfig, validator: impl TokenValidator + 'static) -> Self {
        Self::required(validator).with_skip_paths(config.skip_paths.iter().cloned())
    }

    /// Replace the validator.
    #[must_use]
    pub fn with_validator(mut self, validator: impl TokenValidator + 'static) -> Self {
        Arc::make_mut(&mut self.settings).validator = Some(Arc::new(validator));
        self
    }

    /// Replace the skipped path prefixes.
    #[must_use]
    pub fn with_skip_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::make_mut(&mut self.settings).skip_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Read the credential from `source`.
    #[must_use]
    pub fn with_source(mut self, source: TokenSource) -> Self {
        Arc::make_mut(&mut self.settings).source = source;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationService {
            service,
            settings: Arc::clone(&self.settings),
        }))
    }
}

/// Service wrapper produced by [`Authentication`].
pub struct AuthenticationService<S> {
    service: S,
    settings: Arc<AuthSettings>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let outcome = self.settings.inspect(&req);
        forward_or_reject(&self.service, req, outcome)
    }
}

/// Route guard requiring roles in the stored [`Claims`].
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use service_commons::middleware::RequireRole;
///
/// let app = App::new().service(
///     web::scope("/admin").wrap(RequireRole::any_of(["admin", "ops"])),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireRole {
    roles: Arc<[String]>,
}

impl RequireRole {
    /// Require `role`.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self::any_of([role])
    }

    /// Require at least one of `roles`.
    #[must_use]
    pub fn any_of<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

fn check_roles(roles: &[String], req: &ServiceRequest) -> Result<(), AuthError> {
    let extensions = req.extensions();
    let allowed = extensions
        .get::<Claims>()
        .is_some_and(|claims| roles.iter().any(|role| claims.has_role(role)));
    if allowed {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service,
            roles: Arc::clone(&self.roles),
        }))
    }
}

/// Service wrapper produced by [`RequireRole`].
pub struct RequireRoleService<S> {
    service: S,
    roles: Arc<[String]>,
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let outcome = check_roles(&self.roles, &req);
        forward_or_reject(&self.service, req, outcome)
    }
}

fn forward_or_reject<S, B>(
    service: &S,
    req: ServiceRequest,
    outcome: Result<(), AuthError>,
) -> LocalBoxFuture<'static, Result<ServiceResponse<EitherBody<B>>, Error>>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    if let Err(err) = outcome {
        let response = req.into_response(err.error_response()).map_into_right_body();
        return Box::pin(ready(Ok(response)));
    }
    let fut = service.call(req);
    Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
}

#[cfg(test)]
mod tests;
