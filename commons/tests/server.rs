//! End-to-end behaviour of the assembled middleware stack.
//!
//! Requests go through [`Server::app`] so the layers run in production order.

use actix_web::http::StatusCode;
use actix_web::http::header::{self, HeaderValue};
use actix_web::{HttpResponse, test, web};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use service_commons::config::Config;
use service_commons::health::{CheckOutcome, FnCheck};
use service_commons::middleware::{
    AuthError, Authentication, Claims, REQUEST_ID_HEADER, RequireRole,
};
use service_commons::responses::{ApiError, PageQuery, paginated, success};
use service_commons::{Server, ServerOptions};

fn validate_token(token: &str) -> Result<Claims, AuthError> {
    match token {
        "admin" => Ok(Claims::from_value(json!({"sub": "a-1", "roles": ["admin"]}))),
        "reader" => Ok(Claims::from_value(json!({"sub": "r-1", "roles": ["reader"]}))),
        _ => Err(AuthError::InvalidToken),
    }
}

async fn explode() -> HttpResponse {
    panic!("handler exploded");
}

fn routes(cfg: &mut web::ServiceConfig, config: &Config) {
    let service = config.service_name.clone();
    cfg.route(
        "/hello",
        web::get().to(move || {
            let service = service.clone();
            async move { success("hello", json!({ "service": service })) }
        }),
    )
    .route(
        "/items",
        web::get().to(|query: PageQuery| async move {
            let items: Vec<u32> = (1..=3).collect();
            paginated(items, 23, query.page, query.page_size)
        }),
    )
    .route(
        "/missing",
        web::get().to(|| async { Err::<HttpResponse, _>(ApiError::not_found("no such widget")) }),
    )
    .route("/boom", web::get().to(explode))
    .service(
        web::scope("/admin")
            .wrap(RequireRole::new("admin"))
            .wrap(Authentication::required(validate_token))
            .route(
                "/whoami",
                web::get().to(|claims: Claims| async move {
                    HttpResponse::Ok().body(claims.user_id().unwrap_or_default().to_owned())
                }),
            ),
    );
}

#[fixture]
fn config() -> Config {
    let mut config = Config::default();
    config.service_name = "widgets".to_owned();
    config.auth.public_key = "test-public-key".to_owned();
    config
}

fn options(config: Config) -> ServerOptions {
    ServerOptions::new("widgets", "3.1.0", routes).with_config(config)
}

async fn call(
    options: ServerOptions,
    req: test::TestRequest,
) -> (StatusCode, actix_web::http::header::HeaderMap, Value) {
    let server = Server::new(options).expect("server builds");
    let app = test::init_service(server.app()).await;
    let res = test::call_service(&app, req.to_request()).await;
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = test::read_body(res).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

#[rstest]
#[actix_web::test]
async fn success_envelope_carries_request_id(config: Config) {
    let (status, headers, body) =
        call(options(config), test::TestRequest::get().uri("/hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(REQUEST_ID_HEADER));
    assert_eq!(body["message"], "hello");
    assert_eq!(body["data"]["service"], "widgets");
}

#[rstest]
#[actix_web::test]
async fn incoming_request_id_is_echoed(config: Config) {
    let req = test::TestRequest::get()
        .uri("/hello")
        .insert_header((REQUEST_ID_HEADER, "req-from-gateway"));
    let (_, headers, _) = call(options(config), req).await;
    assert_eq!(
        headers.get(REQUEST_ID_HEADER),
        Some(&HeaderValue::from_static("req-from-gateway"))
    );
}

#[rstest]
#[actix_web::test]
async fn api_errors_include_path_and_request_id(config: Config) {
    let req = test::TestRequest::get()
        .uri("/missing")
        .insert_header((REQUEST_ID_HEADER, "req-404"));
    let (status, _, body) = call(options(config), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    assert_eq!(body["error"], "no such widget");
    assert_eq!(body["path"], "/missing");
    assert_eq!(body["request_id"], "req-404");
}

#[rstest]
#[actix_web::test]
async fn page_queries_are_normalised(config: Config) {
    let req = test::TestRequest::get().uri("/items?page=0&page_size=10");
    let (status, _, body) = call(options(config), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 10);
    assert_eq!(body["total"], 23);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["has_next"], true);
    assert_eq!(body["has_prev"], false);
}

#[rstest]
#[actix_web::test]
async fn panics_become_internal_errors(config: Config) {
    let req = test::TestRequest::get()
        .uri("/boom")
        .insert_header((REQUEST_ID_HEADER, "req-500"));
    let (status, _, body) = call(options(config), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal_error");
    assert_eq!(body["request_id"], "req-500");
}

#[rstest]
#[case(None, StatusCode::UNAUTHORIZED)]
#[case(Some("Bearer nonsense"), StatusCode::UNAUTHORIZED)]
#[case(Some("Bearer reader"), StatusCode::UNAUTHORIZED)]
#[case(Some("Bearer admin"), StatusCode::OK)]
#[actix_web::test]
async fn admin_scope_requires_the_admin_role(
    config: Config,
    #[case] authorization: Option<&'static str>,
    #[case] expected: StatusCode,
) {
    let mut req = test::TestRequest::get().uri("/admin/whoami");
    if let Some(value) = authorization {
        req = req.insert_header((header::AUTHORIZATION, value));
    }
    let (status, _, _) = call(options(config), req).await;
    assert_eq!(status, expected);
}

#[rstest]
#[actix_web::test]
async fn health_reports_registered_checks(config: Config) {
    let options = options(config).with_health_check(FnCheck::new("cache", || async {
        CheckOutcome::degraded("evicting")
    }));
    let (status, _, body) = call(options, test::TestRequest::get().uri("/health/detailed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["service"], "widgets");
    assert_eq!(body["checks"][0]["name"], "cache");
}

#[rstest]
#[actix_web::test]
async fn readiness_follows_server_state(config: Config) {
    let server = Server::new(options(config)).expect("server builds");
    let app = test::init_service(server.app()).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/ready").to_request()).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    server.health().state().mark_ready();
    let res = test::call_service(&app, test::TestRequest::get().uri("/ready").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn custom_health_path_moves_the_routes(config: Config) {
    let options = options(config).with_health_path("/status/");
    let (status, _, _) = call(options.clone(), test::TestRequest::get().uri("/status")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = call(options, test::TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[rstest]
#[actix_web::test]
async fn cors_preflight_is_answered(config: Config) {
    let req = test::TestRequest::default()
        .method(actix_web::http::Method::OPTIONS)
        .uri("/hello")
        .insert_header((header::ORIGIN, "http://localhost:3000"))
        .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "GET"));
    let (status, headers, _) = call(options(config), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&HeaderValue::from_static("http://localhost:3000"))
    );
}
