//! Tests for token extraction, authentication and role guards.

use super::*;
use actix_web::http::header::HeaderValue;
use actix_web::test::{self};
use actix_web::{App, HttpResponse, web};
use rstest::{fixture, rstest};
use serde_json::json;

fn known_token(token: &str) -> Result<Claims, AuthError> {
    match token {
        "admin-token" => Ok(Claims::from_value(
            json!({"sub": "u-1", "roles": ["admin", "user"]}),
        )),
        "user-token" => Ok(Claims::from_value(json!({"user_id": "u-2", "roles": ["user"]}))),
        "stale-token" => Err(AuthError::ExpiredToken),
        _ => Err(AuthError::InvalidToken),
    }
}

async fn whoami(claims: Option<Claims>) -> HttpResponse {
    let user = claims
        .as_ref()
        .and_then(Claims::user_id)
        .unwrap_or("anonymous")
        .to_owned();
    HttpResponse::Ok().body(user)
}

#[fixture]
fn api_keys() -> HashMap<String, String> {
    HashMap::from([("k-123".to_owned(), "svc-reporting".to_owned())])
}

#[rstest]
#[case(AuthError::MissingToken, "missing_token", "Authorization token is required")]
#[case(AuthError::MissingTokenParameter, "missing_token", "Token parameter is required")]
#[case(
    AuthError::InvalidAuthFormat,
    "invalid_auth_format",
    "Authorization header must use Bearer format"
)]
#[case(AuthError::ExpiredToken, "expired_token", "Authorization token has expired")]
#[case(AuthError::InvalidApiKey, "invalid_api_key", "Invalid API key")]
#[case(
    AuthError::InvalidCredentials,
    "invalid_credentials",
    "Invalid username or password"
)]
#[case(AuthError::failed("clock skew"), "auth_failed", "Authentication failed")]
fn errors_carry_codes_and_messages(
    #[case] error: AuthError,
    #[case] code: &str,
    #[case] message: &str,
) {
    assert_eq!(error.code(), code);
    assert_eq!(error.to_string(), message);
    assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
}

#[rstest]
fn claims_expose_identity_and_roles() {
    let claims = Claims::from_value(json!({"sub": "abc", "roles": ["a", 3, "b"]}));
    assert_eq!(claims.user_id(), Some("abc"));
    assert_eq!(claims.roles(), vec!["a", "b"]);
    assert!(claims.has_role("b"));
    assert!(!claims.has_role("c"));

    let claims = claims.with("user_id", "explicit");
    assert_eq!(claims.user_id(), Some("explicit"));
    assert_eq!(Claims::from_value(json!([1, 2])), Claims::new());
}

#[rstest]
#[case(None, Err(AuthError::MissingToken))]
#[case(Some("Basic abc"), Err(AuthError::InvalidAuthFormat))]
#[case(Some("Bearer "), Err(AuthError::MissingToken))]
#[case(Some("Bearer t0k"), Ok("t0k".to_owned()))]
fn bearer_extraction(#[case] header: Option<&str>, #[case] expected: Result<String, AuthError>) {
    let mut req = test::TestRequest::default();
    if let Some(value) = header {
        req = req.insert_header((AUTHORIZATION, HeaderValue::from_str(value).expect("header")));
    }
    assert_eq!(TokenSource::Bearer.extract(&req.to_http_request()), expected);
}

#[rstest]
fn header_and_query_extraction() {
    let req = test::TestRequest::default()
        .uri("/?access_token=q%201&other=x")
        .insert_header((API_KEY_HEADER, "k"))
        .to_http_request();
    assert_eq!(TokenSource::ApiKeyHeader.extract(&req), Ok("k".to_owned()));
    assert_eq!(
        TokenSource::Query("access_token".to_owned()).extract(&req),
        Ok("q 1".to_owned())
    );
    assert_eq!(
        TokenSource::Query("token".to_owned()).extract(&req),
        Err(AuthError::MissingTokenParameter)
    );
    let bare = test::TestRequest::default().to_http_request();
    assert_eq!(
        TokenSource::ApiKeyHeader.extract(&bare),
        Err(AuthError::MissingApiKey)
    );
}

#[actix_web::test]
async fn required_authentication_rejects_and_admits() {
    let app = test::init_service(
        App::new()
            .wrap(Authentication::required(known_token))
            .route("/me", web::get().to(whoami))
            .route("/health/live", web::get().to(whoami)),
    )
    .await;

    let req = test::TestRequest::get().uri("/me").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: AuthErrorResponse = test::read_body_json(res).await;
    assert_eq!(body.code, "missing_token");

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((AUTHORIZATION, "Bearer stale-token"))
        .to_request();
    let body: AuthErrorResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.code, "expired_token");

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((AUTHORIZATION, "Bearer admin-token"))
        .to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, "u-1");

    let req = test::TestRequest::get().uri("/health/live").to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, "anonymous");
}

#[actix_web::test]
async fn optional_authentication_never_rejects() {
    let app = test::init_service(
        App::new()
            .wrap(Authentication::optional(known_token))
            .route("/me", web::get().to(whoami)),
    )
    .await;

    for header in ["Bearer nope", "Token abc"] {
        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((AUTHORIZATION, header))
            .to_request();
        assert_eq!(test::call_and_read_body(&app, req).await, "anonymous");
    }
    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((AUTHORIZATION, "Bearer user-token"))
        .to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, "u-2");
}

#[actix_web::test]
async fn presence_only_without_validator() {
    let app = test::init_service(
        App::new()
            .wrap(Authentication::default())
            .route("/me", web::get().to(whoami)),
    )
    .await;
    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((AUTHORIZATION, "Bearer anything"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn api_keys_map_to_users(api_keys: HashMap<String, String>) {
    let app = test::init_service(
        App::new()
            .wrap(ApiKeyAuth::new(api_keys).middleware())
            .route("/me", web::get().to(whoami)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((API_KEY_HEADER, "k-123"))
        .to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, "svc-reporting");

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((API_KEY_HEADER, "wrong"))
        .to_request();
    let body: AuthErrorResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.code, "invalid_api_key");

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: AuthErrorResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.code, "missing_api_key");
}

#[rstest]
fn api_key_claims_record_method(api_keys: HashMap<String, String>) {
    let claims = ApiKeyAuth::new(api_keys).validate("k-123").expect("known key");
    assert_eq!(claims.get("auth_method"), Some(&json!("api_key")));
}

#[rstest]
#[case("admin-token", StatusCode::OK)]
#[case("user-token", StatusCode::UNAUTHORIZED)]
#[actix_web::test]
async fn roles_gate_scoped_routes(#[case] token: &str, #[case] expected: StatusCode) {
    let app = test::init_service(
        App::new().wrap(Authentication::required(known_token)).service(
            web::scope("/admin")
                .wrap(RequireRole::any_of(["admin", "ops"]))
                .route("", web::get().to(whoami)),
        ),
    )
    .await;
    let req = test::TestRequest::get()
        .uri("/admin")
        .insert_header((AUTHORIZATION, format!("Bearer {token}")))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), expected);
}

#[actix_web::test]
async fn role_guard_without_claims_rejects() {
    let app = test::init_service(
        App::new()
            .wrap(RequireRole::new("admin"))
            .route("/", web::get().to(whoami)),
    )
    .await;
    let req = test::TestRequest::get().uri("/").to_request();
    let body: AuthErrorResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.code, "insufficient_permissions");
    assert_eq!(body.error, "Insufficient permissions for this operation");
}

#[actix_web::test]
async fn claims_extractor_requires_authentication() {
    let app = test::init_service(
        App::new().route(
            "/strict",
            web::get().to(|claims: Claims| async move {
                HttpResponse::Ok().body(claims.user_id().unwrap_or_default().to_owned())
            }),
        ),
    )
    .await;
    let req = test::TestRequest::get().uri("/strict").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[fixture]
fn users() -> HashMap<String, String> {
    HashMap::from([("ops".to_owned(), "s3cret".to_owned())])
}

fn basic(user_and_password: &str) -> String {
    format!("Basic {}", STANDARD.encode(user_and_password))
}

#[rstest]
#[case(None, Err(AuthError::MissingCredentials))]
#[case(Some("Bearer t0k".to_owned()), Err(AuthError::MissingCredentials))]
#[case(Some("Basic !!!".to_owned()), Err(AuthError::InvalidCredentials))]
#[case(Some(basic("no-colon")), Err(AuthError::InvalidCredentials))]
#[case(Some(basic("ops:pa:ss")), Ok("ops:pa:ss".to_owned()))]
fn basic_extraction(#[case] header: Option<String>, #[case] expected: Result<String, AuthError>) {
    let mut req = test::TestRequest::default();
    if let Some(value) = header {
        req = req.insert_header((AUTHORIZATION, value));
    }
    assert_eq!(TokenSource::Basic.extract(&req.to_http_request()), expected);
}

#[rstest]
#[case("ops:s3cret", true)]
#[case("ops:wrong", false)]
#[case("nobody:s3cret", false)]
fn basic_credentials_must_match(
    users: HashMap<String, String>,
    #[case] token: &str,
    #[case] accepted: bool,
) {
    let result = BasicAuth::new(users).validate(token);
    assert_eq!(result.is_ok(), accepted);
    if let Ok(claims) = result {
        assert_eq!(claims.user_id(), Some("ops"));
        assert_eq!(claims.get("auth_method"), Some(&json!("basic")));
    }
}

#[rstest]
#[actix_web::test]
async fn basic_auth_challenges_failures(users: HashMap<String, String>) {
    let app = test::init_service(
        App::new()
            .wrap(BasicAuth::new(users).middleware())
            .route("/me", web::get().to(whoami)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((AUTHORIZATION, basic("ops:s3cret")))
        .to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, "ops");

    let req = test::TestRequest::get()
        .uri("/me")
        .insert_header((AUTHORIZATION, basic("ops:guess")))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.headers().get(WWW_AUTHENTICATE),
        Some(&HeaderValue::from_static(BASIC_CHALLENGE))
    );

    let req = test::TestRequest::get().uri("/me").to_request();
    let body: AuthErrorResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.code, "missing_credentials");
}
