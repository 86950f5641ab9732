//! Panic recovery.
//!
//! Panics raised while a request is being handled are caught and turned into
//! a `500` JSON body instead of tearing down the worker. The panic hook still
//! runs, so the default hook output remains visible on stderr.
//!
//! Stack traces are taken inside a chained panic hook, before unwinding, and
//! handed to the middleware through a thread-local slot.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::Once;
use std::task::{Context, Poll};

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpRequest, HttpResponse};
use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::Config;
use crate::middleware::request_id::RequestId;

const INTERNAL_ERROR: &str = "Internal server error";

static BACKTRACE_HOOK: Once = Once::new();

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

/// Chain a hook that records the panic-site backtrace while a recovering
/// service is running. Installed at most once per process.
fn install_backtrace_hook() {
    BACKTRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let backtrace = Backtrace::force_capture();
                PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            }
            previous(info);
        }));
    });
}

/// Restores the previous capture flag, including during unwinding.
struct CaptureGuard(bool);

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(self.0));
    }
}

/// Run `f` with backtrace capture switched on for this thread.
fn capturing<R>(enabled: bool, f: impl FnOnce() -> R) -> R {
    if !enabled {
        return f();
    }
    let _guard = CaptureGuard(CAPTURING.with(|flag| flag.replace(true)));
    f()
}

/// Backtrace recorded by the most recent captured panic on this thread.
fn take_backtrace() -> Option<Backtrace> {
    PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Body returned after a recovered panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanicResponse {
    /// Always `"Internal server error"`.
    pub error: String,
    /// Always `"internal_error"`.
    pub code: String,
    /// Request identifier, when one was assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Panic message (development only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Request path (development only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Request method (development only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecoverySettings {
    expose_details: bool,
    stack_trace: bool,
    log: bool,
}

/// Panic-catching middleware.
///
/// # Examples
/// ```
/// use actix_web::App;
/// use service_commons::middleware::Recovery;
///
/// let app = App::new().wrap(Recovery::production());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    settings: RecoverySettings,
}

impl Default for Recovery {
    fn default() -> Self {
        Self {
            settings: RecoverySettings {
                expose_details: false,
                stack_trace: true,
                log: true,
            },
        }
    }
}

impl Recovery {
    /// Log without stack traces.
    #[must_use]
    pub fn production() -> Self {
        Self::default().with_stack_trace(false)
    }

    /// Include panic message, path and method in the body.
    #[must_use]
    pub fn development() -> Self {
        let mut recovery = Self::default();
        recovery.settings.expose_details = true;
        recovery
    }

    /// Respond without logging.
    #[must_use]
    pub fn silent() -> Self {
        let mut recovery = Self::production();
        recovery.settings.log = false;
        recovery
    }

    /// Development mode for `dev` environments, production otherwise.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        if config.is_development() {
            Self::development()
        } else {
            Self::production()
        }
    }

    /// Toggle stack trace capture in the log event.
    #[must_use]
    pub fn with_stack_trace(mut self, enabled: bool) -> Self {
        self.settings.stack_trace = enabled;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for Recovery
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RecoveryService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        if self.settings.captures_backtrace() {
            install_backtrace_hook();
        }
        ready(Ok(RecoveryService {
            service: Rc::new(service),
            settings: self.settings,
        }))
    }
}

/// Service wrapper produced by [`Recovery`].
pub struct RecoveryService<S> {
    service: Rc<S>,
    settings: RecoverySettings,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned())
}

impl RecoverySettings {
    const fn captures_backtrace(self) -> bool {
        self.log && self.stack_trace
    }

    fn respond<B>(self, req: HttpRequest, payload: &(dyn Any + Send)) -> ServiceResponse<EitherBody<B>> {
        let message = panic_message(payload);
        let request_id = RequestId::from_request(&req).map(|id| id.to_string());
        let backtrace = take_backtrace();
        if self.log {
            let request_id = request_id.as_deref().unwrap_or("");
            if let Some(backtrace) = backtrace.filter(|_| self.stack_trace) {
                error!(
                    panic = %message,
                    method = %req.method(),
                    path = %req.path(),
                    request_id,
                    %backtrace,
                    "recovered from panic"
                );
            } else {
                error!(
                    panic = %message,
                    method = %req.method(),
                    path = %req.path(),
                    request_id,
                    "recovered from panic"
                );
            }
        }

        let body = PanicResponse {
            error: INTERNAL_ERROR.to_owned(),
            code: "internal_error".to_owned(),
            request_id,
            details: self.expose_details.then_some(message),
            path: self.expose_details.then(|| req.path().to_owned()),
            method: self.expose_details.then(|| req.method().to_string()),
        };
        let response = HttpResponse::InternalServerError().json(body);
        ServiceResponse::new(req, response).map_into_right_body()
    }
}

impl<S, B> Service<ServiceRequest> for RecoveryService<S>
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
        let http_req = req.request().clone();
        let settings = self.settings;
        let service = Rc::clone(&self.service);
        let capture = settings.captures_backtrace();
        let called = capturing(capture, || {
            catch_unwind(AssertUnwindSafe(move || service.call(req)))
        });
        let mut fut = match called {
            Ok(fut) => Box::pin(fut),
            Err(payload) => {
                let response = settings.respond(http_req, payload.as_ref());
                return Box::pin(ready(Ok(response)));
            }
        };
        let polled = futures_util::future::poll_fn(move |cx| {
            capturing(capture, || fut.as_mut().poll(cx))
        });
        Box::pin(async move {
            match AssertUnwindSafe(polled).catch_unwind().await {
                Ok(result) => result.map(ServiceResponse::map_into_left_body),
                Err(payload) => Ok(settings.respond(http_req, payload.as_ref())),
            }
        })
    }
}
