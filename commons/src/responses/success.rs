//! Success envelopes.

use actix_web::http::StatusCode;
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::{HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::request_id::{REQUEST_ID_HEADER, RequestId};

/// `{message, data?, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    /// Human-readable message.
    pub message: String,
    /// Payload; omitted when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

impl<T> SuccessResponse<T> {
    /// Envelope stamped with the current time.
    pub fn new(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// `{data, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse<T> {
    /// Payload.
    pub data: T,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// `{message, timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// 200 with message and data.
///
/// # Examples
/// ```
/// use actix_web::http::StatusCode;
/// use service_commons::responses::success;
///
/// let response = success("fetched", vec![1, 2, 3]);
/// assert_eq!(response.status(), StatusCode::OK);
/// ```
pub fn success<T: Serialize>(message: &str, data: T) -> HttpResponse {
    success_with_status(StatusCode::OK, message, data)
}

/// Success envelope with an arbitrary status.
pub fn success_with_status<T: Serialize>(
    status: StatusCode,
    message: &str,
    data: T,
) -> HttpResponse {
    HttpResponse::build(status).json(SuccessResponse::new(message, Some(data)))
}

/// 201 Created.
pub fn created<T: Serialize>(message: &str, data: T) -> HttpResponse {
    success_with_status(StatusCode::CREATED, message, data)
}

/// 202 Accepted.
pub fn accepted<T: Serialize>(message: &str, data: T) -> HttpResponse {
    success_with_status(StatusCode::ACCEPTED, message, data)
}

/// 204 with an empty body.
#[must_use]
pub fn no_content() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// 200 with only a message; `data` is omitted.
#[must_use]
pub fn ok(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(SuccessResponse::<()>::new(message, None))
}

/// 200 `{data, timestamp}`.
pub fn data_only<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(DataResponse {
        data,
        timestamp: Utc::now(),
    })
}

/// 200 `{message, timestamp}`.
#[must_use]
pub fn message_only(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse {
        message: message.to_owned(),
        timestamp: Utc::now(),
    })
}

/// Arbitrary JSON body with `status`.
pub fn json<T: Serialize>(status: StatusCode, body: T) -> HttpResponse {
    HttpResponse::build(status).json(body)
}

/// JSON body with extra headers; invalid header pairs are skipped.
pub fn with_headers<T: Serialize>(
    status: StatusCode,
    headers: &[(&str, &str)],
    body: T,
) -> HttpResponse {
    let mut builder = HttpResponse::build(status);
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(*name),
            HeaderValue::from_str(value),
        ) {
            builder.insert_header((name, value));
        }
    }
    builder.json(body)
}

/// JSON body echoing the request identifier in `X-Request-ID`.
pub fn with_request_id<T: Serialize>(req: &HttpRequest, status: StatusCode, body: T) -> HttpResponse {
    let mut builder = HttpResponse::build(status);
    if let Some(value) = RequestId::from_request(req)
        .or_else(RequestId::current)
        .and_then(|id| HeaderValue::from_str(id.as_str()).ok())
    {
        builder.insert_header((REQUEST_ID_HEADER, value));
    }
    builder.json(body)
}

/// 302 Found to `location`.
#[must_use]
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// 301 Moved Permanently to `location`.
#[must_use]
pub fn permanent_redirect(location: &str) -> HttpResponse {
    HttpResponse::MovedPermanently()
        .insert_header((header::LOCATION, location))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::RequestIdMiddleware;
    use actix_web::body::to_bytes;
    use actix_web::test::{self};
    use actix_web::{App, web};
    use rstest::rstest;
    use serde_json::{Value, json};

    async fn json_body(response: HttpResponse) -> Value {
        let bytes = to_bytes(response.into_body()).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[rstest]
    #[case(success("ok", json!({"id": 1})), StatusCode::OK)]
    #[case(created("made", json!({"id": 1})), StatusCode::CREATED)]
    #[case(accepted("queued", json!({"id": 1})), StatusCode::ACCEPTED)]
    #[case(success_with_status(StatusCode::IM_USED, "odd", json!({"id": 1})), StatusCode::IM_USED)]
    #[actix_web::test]
    async fn envelopes_carry_data(#[case] response: HttpResponse, #[case] status: StatusCode) {
        assert_eq!(response.status(), status);
        let body = json_body(response).await;
        assert_eq!(body["data"], json!({"id": 1}));
        assert!(body["message"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[rstest]
    #[actix_web::test]
    async fn ok_omits_data() {
        let body = json_body(ok("done")).await;
        assert_eq!(body["message"], "done");
        assert!(body.get("data").is_none());
    }

    #[rstest]
    #[actix_web::test]
    async fn data_and_message_only_shapes() {
        let data = json_body(data_only([1, 2])).await;
        assert_eq!(data["data"], json!([1, 2]));
        assert!(data.get("message").is_none());

        let message = json_body(message_only("hi")).await;
        assert_eq!(message["message"], "hi");
        assert!(message.get("data").is_none());
    }

    #[rstest]
    fn no_content_has_no_body() {
        assert_eq!(no_content().status(), StatusCode::NO_CONTENT);
    }

    #[rstest]
    #[case(redirect("/next"), StatusCode::FOUND)]
    #[case(permanent_redirect("/next"), StatusCode::MOVED_PERMANENTLY)]
    fn redirects_set_location(#[case] response: HttpResponse, #[case] status: StatusCode) {
        assert_eq!(response.status(), status);
        assert_eq!(
            response.headers().get(header::LOCATION).map(HeaderValue::as_bytes),
            Some(&b"/next"[..])
        );
    }

    #[rstest]
    fn with_headers_skips_invalid_names() {
        let response = with_headers(
            StatusCode::OK,
            &[("x-total", "3"), ("bad header", "x")],
            json!({}),
        );
        assert!(response.headers().contains_key("x-total"));
        assert_eq!(response.headers().len(), 2);
    }

    #[actix_web::test]
    async fn with_request_id_echoes_header() {
        let app = test::init_service(App::new().wrap(RequestIdMiddleware::default()).route(
            "/",
            web::get().to(|req: HttpRequest| async move {
                with_request_id(&req, StatusCode::OK, json!({"ok": true}))
            }),
        ))
        .await;
        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("X-Request-ID", "r-9"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(
            res.headers().get(REQUEST_ID_HEADER).map(HeaderValue::as_bytes),
            Some(&b"r-9"[..])
        );
    }
}
