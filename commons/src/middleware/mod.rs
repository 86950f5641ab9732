//! actix-web middleware shared by services.
//!
//! Register request IDs outermost so the identifier is available to the
//! logger, the recovery handler and error bodies:
//!
//! ```
//! use actix_web::App;
//! use service_commons::config::LogLevel;
//! use service_commons::middleware::{
//!     CorsSettings, Recovery, RequestIdMiddleware, RequestLogger,
//! };
//!
//! // `wrap` registers outside-in from last to first.
//! let app = App::new()
//!     .wrap(CorsSettings::default().build())
//!     .wrap(Recovery::production())
//!     .wrap(RequestLogger::new(LogLevel::Info))
//!     .wrap(RequestIdMiddleware::default());
//! ```

pub mod auth;
pub mod cors;
pub mod logging;
pub mod recovery;
pub mod request_id;

pub use auth::{
    API_KEY_HEADER, ApiKeyAuth, AuthError, AuthErrorResponse, Authentication, BASIC_CHALLENGE,
    BasicAuth, Claims, RequireRole, TokenSource, TokenValidator,
};
pub use cors::CorsSettings;
pub use logging::{DEFAULT_SLOW_THRESHOLD, RequestLogger};
pub use recovery::{PanicResponse, Recovery};
pub use request_id::{
    REQUEST_ID_HEADER, RequestContext, RequestId, RequestIdMiddleware, generate_request_id,
    generate_short_request_id, generate_uuid_request_id,
};
