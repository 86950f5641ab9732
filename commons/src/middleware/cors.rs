//! Cross-origin resource sharing presets built on `actix-cors`.

use std::time::Duration;

use actix_cors::Cors;
use actix_web::http::header::HeaderName;
use actix_web::http::{Method, Uri};
use tracing::warn;

use crate::config::{Config, DEFAULT_ALLOWED_ORIGIN};

const ALL_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];
const WILDCARD: &str = "*";

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}

/// CORS policy description, converted to middleware by [`CorsSettings::build`].
///
/// A `"*"` entry in origins, headers or exposed headers allows any value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsSettings {
    /// Origins allowed to call the service.
    pub allowed_origins: Vec<String>,
    /// Methods allowed in cross-origin requests.
    pub allowed_methods: Vec<String>,
    /// Request headers clients may send.
    pub allowed_headers: Vec<String>,
    /// Response headers exposed to scripts.
    pub exposed_headers: Vec<String>,
    /// Whether cookies and authorization headers may be sent.
    pub allow_credentials: bool,
    /// How long preflight results may be cached.
    pub max_age: Duration,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: owned(&[DEFAULT_ALLOWED_ORIGIN]),
            allowed_methods: owned(&ALL_METHODS),
            allowed_headers: owned(&[
                "Origin",
                "Content-Length",
                "Content-Type",
                "Authorization",
                "X-Requested-With",
                "Accept",
                "Accept-Encoding",
                "Accept-Language",
                "Cache-Control",
            ]),
            exposed_headers: owned(&["Content-Length", "Content-Type", "X-Request-ID"]),
            allow_credentials: true,
            max_age: Duration::from_secs(12 * 60 * 60),
        }
    }
}

impl CorsSettings {
    /// Defaults with the given origins.
    #[must_use]
    pub fn with_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_origins: origins.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Defaults with the origins from `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_origins(config.allowed_origins.iter().cloned())
    }

    /// Any origin, any header.
    #[must_use]
    pub fn development() -> Self {
        Self {
            allowed_origins: owned(&[WILDCARD]),
            allowed_headers: owned(&[WILDCARD]),
            exposed_headers: owned(&[WILDCARD]),
            ..Self::default()
        }
    }

    /// Restricted methods and headers, no credentials, one hour cache.
    #[must_use]
    pub fn production<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_origins: origins.into_iter().map(Into::into).collect(),
            allowed_methods: owned(&["GET", "POST", "PUT", "PATCH", "DELETE"]),
            allowed_headers: owned(&["Origin", "Content-Type", "Authorization"]),
            exposed_headers: owned(&["Content-Type", "X-Request-ID"]),
            allow_credentials: false,
            max_age: Duration::from_secs(60 * 60),
        }
    }

    /// Build the middleware. Entries that do not parse are logged and
    /// skipped rather than failing application start-up.
    ///
    /// # Examples
    /// ```
    /// use actix_web::App;
    /// use service_commons::middleware::CorsSettings;
    ///
    /// let app = App::new().wrap(CorsSettings::production(["https://app.example.com"]).build());
    /// ```
    #[must_use]
    pub fn build(&self) -> Cors {
        let mut cors = Cors::default();

        if self.allowed_origins.iter().any(|origin| origin == WILDCARD) {
            cors = cors.allow_any_origin();
        } else {
            for origin in &self.allowed_origins {
                if origin.parse::<Uri>().is_ok() {
                    cors = cors.allowed_origin(origin);
                } else {
                    warn!(origin = %origin, "skipping unparsable CORS origin");
                }
            }
        }

        let methods: Vec<Method> = self
            .allowed_methods
            .iter()
            .filter_map(|name| match Method::from_bytes(name.as_bytes()) {
                Ok(method) => Some(method),
                Err(_) => {
                    warn!(method = %name, "skipping invalid CORS method");
                    None
                }
            })
            .collect();
        cors = cors.allowed_methods(methods);

        if self.allowed_headers.iter().any(|header| header == WILDCARD) {
            cors = cors.allow_any_header();
        } else {
            cors = cors.allowed_headers(parse_headers(&self.allowed_headers));
        }

        if self.exposed_headers.iter().any(|header| header == WILDCARD) {
            cors = cors.expose_any_header();
        } else {
            cors = cors.expose_headers(parse_headers(&self.exposed_headers));
        }

        if self.allow_credentials {
            cors = cors.supports_credentials();
        }

        let max_age = usize::try_from(self.max_age.as_secs()).unwrap_or(usize::MAX);
        cors.max_age(max_age)
    }
}

fn parse_headers(names: &[String]) -> Vec<HeaderName> {
    names
        .iter()
        .filter_map(|name| match HeaderName::try_from(name.as_str()) {
            Ok(header) => Some(header),
            Err(_) => {
                warn!(header = %name, "skipping invalid CORS header");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::{StatusCode, header};
    use actix_web::test::{self};
    use actix_web::{App, HttpResponse, web};
    use rstest::rstest;

    #[rstest]
    fn presets_differ_where_expected() {
        let default = CorsSettings::default();
        assert_eq!(default.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(default.allowed_methods.len(), 7);
        assert!(default.allow_credentials);
        assert_eq!(default.max_age, Duration::from_secs(43_200));

        let production = CorsSettings::production(["https://a.example.com"]);
        assert!(!production.allow_credentials);
        assert_eq!(production.max_age, Duration::from_secs(3_600));
        assert!(!production.allowed_methods.contains(&"OPTIONS".to_owned()));

        let development = CorsSettings::development();
        assert_eq!(development.allowed_origins, vec!["*"]);
    }

    async fn preflight(
        settings: CorsSettings,
        origin: &str,
    ) -> actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody> {
        let app = test::init_service(
            App::new()
                .wrap(settings.build())
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;
        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/")
            .insert_header((header::ORIGIN, origin))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "GET"))
            .to_request();
        test::call_service(&app, req).await
    }

    #[actix_web::test]
    async fn allowed_origin_passes_preflight() {
        let res = preflight(CorsSettings::default(), "http://localhost:3000").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|value| value.to_str().ok()),
            Some("http://localhost:3000")
        );
        assert!(res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS));
    }

    #[actix_web::test]
    async fn unknown_origin_is_not_allowed() {
        let res = preflight(CorsSettings::default(), "https://evil.example.com").await;
        assert!(
            res.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[actix_web::test]
    async fn development_allows_any_origin() {
        let res = preflight(CorsSettings::development(), "https://anything.test").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[actix_web::test]
    async fn invalid_entries_do_not_break_startup() {
        let settings = CorsSettings {
            allowed_methods: vec!["GET".to_owned(), "NOT A METHOD".to_owned()],
            allowed_headers: vec!["Content-Type".to_owned(), "bad header".to_owned()],
            ..CorsSettings::with_origins(["http://localhost:3000", "not a uri"])
        };
        let res = preflight(settings, "http://localhost:3000").await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
