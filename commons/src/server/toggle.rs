//! Middleware that can be switched off without changing the app type.

use actix_service::boxed::{self, BoxService};
use actix_service::{Service, ServiceExt as _, Transform};
use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use futures_util::future::LocalBoxFuture;

/// Wraps `T` when enabled and passes requests straight through otherwise.
/// Either way the response body is boxed, so the stack has one type.
#[derive(Clone)]
pub(crate) enum Toggle<T> {
    Enabled(T),
    Disabled,
}

impl<T> Toggle<T> {
    pub(crate) fn from_option(layer: Option<T>) -> Self {
        match layer {
            Some(layer) => Self::Enabled(layer),
            None => Self::Disabled,
        }
    }

    pub(crate) fn when(enabled: bool, build: impl FnOnce() -> T) -> Self {
        Self::from_option(enabled.then(build))
    }
}

impl<T, S, B, B2> Transform<S, ServiceRequest> for Toggle<T>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
    T: Transform<
            S,
            ServiceRequest,
            Response = ServiceResponse<B2>,
            Error = actix_web::Error,
            InitError = (),
        >,
    T::Future: 'static,
    <T as Transform<S, ServiceRequest>>::Transform: 'static,
    <<T as Transform<S, ServiceRequest>>::Transform as Service<ServiceRequest>>::Future: 'static,
    B2: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = BoxService<ServiceRequest, ServiceResponse<BoxBody>, actix_web::Error>;
    type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        match self {
            Self::Enabled(layer) => {
                let fut = layer.new_transform(service);
                Box::pin(async move {
                    let svc = fut.await?;
                    let svc = svc.map(|res: ServiceResponse<B2>| res.map_into_boxed_body());
                    Ok(boxed::service(svc))
                })
            }
            Self::Disabled => {
                let svc = service.map(|res: ServiceResponse<B>| res.map_into_boxed_body());
                Box::pin(async move { Ok(boxed::service(svc)) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{REQUEST_ID_HEADER, RequestIdMiddleware};
    use actix_web::test::{self};
    use actix_web::{App, HttpResponse, web};
    use rstest::rstest;

    #[rstest]
    #[case(true, true)]
    #[case(false, false)]
    #[actix_web::test]
    async fn disabled_layers_pass_through(#[case] enabled: bool, #[case] has_header: bool) {
        let app = test::init_service(
            App::new()
                .wrap(Toggle::when(enabled, RequestIdMiddleware::default))
                .route("/", web::get().to(|| async { HttpResponse::Ok().body("hi") })),
        )
        .await;
        let req = test::TestRequest::get().uri("/").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.headers().contains_key(REQUEST_ID_HEADER), has_header);
        assert_eq!(test::read_body(res).await, "hi");
    }
}
