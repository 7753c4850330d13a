//! Request error normalizer
//!
//! Sits on a handler's result channel. Successful values pass through
//! untouched; every failure, whatever its type, is re-raised as a
//! [`NormalizedError`] classified as a bad request. The normalizer keeps no
//! state and does not log.

use akeray_common::{ErrorBody, StatusClass};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use tower_http::catch_panic::CatchPanicLayer;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Payload used when a panic carries no string message
pub const OPAQUE_PANIC_MESSAGE: &str = "handler panicked";

/// A handler failure rewritten into the single client-facing shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedError<E> {
    status: StatusClass,
    payload: E,
}

impl<E> NormalizedError<E> {
    /// Wrap an original error. The classification is always bad request.
    pub fn new(payload: E) -> Self {
        Self {
            status: StatusClass::BadRequest,
            payload,
        }
    }

    pub fn status(&self) -> StatusClass {
        self.status
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status.code()).unwrap_or(StatusCode::BAD_REQUEST)
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Wire body borrowing the payload
    pub fn body(&self) -> ErrorBody<&E> {
        ErrorBody::new(self.status, &self.payload)
    }
}

impl<E: fmt::Debug> fmt::Display for NormalizedError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.status, self.payload)
    }
}

impl<E: fmt::Debug> std::error::Error for NormalizedError<E> {}

/// Response extension set on every normalized response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalized;

impl<E: Serialize> IntoResponse for NormalizedError<E> {
    fn into_response(self) -> Response {
        let bytes = match serde_json::to_vec(&self.body()) {
            Ok(bytes) => bytes,
            // The payload itself is unserializable; report why, still as 400
            Err(e) => serde_json::to_vec(&ErrorBody::new(self.status, e.to_string()))
                .unwrap_or_default(),
        };

        let mut response = (
            self.status_code(),
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            bytes,
        )
            .into_response();
        response.extensions_mut().insert(Normalized);
        response
    }
}

/// Map a handler result: values unchanged, errors normalized.
pub fn normalize<T, E>(result: Result<T, E>) -> Result<T, NormalizedError<E>> {
    result.map_err(NormalizedError::new)
}

/// Await a fallible computation and normalize its result.
pub async fn normalize_future<F, T, E>(fut: F) -> Result<T, NormalizedError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    normalize(fut.await)
}

/// Tower layer applying [`normalize`] to a service's error channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeErrorLayer;

impl NormalizeErrorLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for NormalizeErrorLayer {
    type Service = NormalizeErrorService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NormalizeErrorService { inner }
    }
}

/// Service produced by [`NormalizeErrorLayer`].
#[derive(Debug, Clone)]
pub struct NormalizeErrorService<S> {
    inner: S,
}

impl<S, R> Service<R> for NormalizeErrorService<S>
where
    S: Service<R>,
    S::Response: 'static,
    S::Error: 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = NormalizedError<S::Error>;
    type Future = BoxFuture<Result<S::Response, NormalizedError<S::Error>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(NormalizedError::new)
    }

    fn call(&mut self, request: R) -> Self::Future {
        Box::pin(normalize_future(self.inner.call(request)))
    }
}

/// Infallible service that renders normalized errors as HTTP responses.
///
/// Mountable with `Router::route_service` or `post_service`.
#[derive(Debug, Clone)]
pub struct NormalizedResponseService<S> {
    inner: NormalizeErrorService<S>,
}

/// Normalize a fallible service and turn its errors into 400 responses.
pub fn into_response_service<S>(service: S) -> NormalizedResponseService<S> {
    NormalizedResponseService {
        inner: NormalizeErrorLayer.layer(service),
    }
}

impl<S, R> Service<R> for NormalizedResponseService<S>
where
    S: Service<R> + Clone + Send + 'static,
    S::Response: IntoResponse + 'static,
    S::Error: Serialize + 'static,
    S::Future: Send + 'static,
    R: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is driven per call so its failures become responses too
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = match inner.oneshot(request).await {
                Ok(response) => response.into_response(),
                Err(normalized) => normalized.into_response(),
            };
            Ok(response)
        })
    }
}

/// Panic hook signature accepted by [`CatchPanicLayer::custom`]
pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> Response;

/// Layer turning handler panics into normalized bad-request responses.
pub fn catch_panic_layer() -> CatchPanicLayer<PanicHandler> {
    CatchPanicLayer::custom(panic_response as PanicHandler)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        OPAQUE_PANIC_MESSAGE.to_string()
    };

    NormalizedError::new(message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::Request, http, routing::get, Router};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use tower::service_fn;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_normalize_success_is_identity() {
        let value = json!({"id": 1});
        let result: Result<Value, String> = Ok(value.clone());
        assert_eq!(normalize(result), Ok(value));
    }

    #[test]
    fn test_normalize_failure_keeps_payload() {
        let err = normalize::<(), _>(Err("not found")).unwrap_err();
        assert_eq!(err.status(), StatusClass::BadRequest);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(*err.payload(), "not found");
        assert_eq!(err.into_payload(), "not found");
    }

    #[test]
    fn test_normalize_error_instance() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = normalize::<(), _>(Err(io)).unwrap_err();
        assert_eq!(err.status(), StatusClass::BadRequest);
        assert_eq!(err.payload().kind(), std::io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_display() {
        let err = NormalizedError::new("not found");
        assert_eq!(err.to_string(), "400 Bad Request: \"not found\"");
    }

    #[tokio::test]
    async fn test_normalize_future() {
        let ok = normalize_future(async { Ok::<_, String>(7u32) }).await;
        assert_eq!(ok, Ok(7));

        let err = normalize_future(async { Err::<u32, _>(json!({"code": 42})) })
            .await
            .unwrap_err();
        assert_eq!(err.payload(), &json!({"code": 42}));
    }

    #[tokio::test]
    async fn test_layer_passes_success_through() {
        let svc = NormalizeErrorLayer::new()
            .layer(service_fn(|id: u32| async move { Ok::<_, String>(json!({"id": id})) }));

        let response = svc.oneshot(1).await.unwrap();
        assert_eq!(response, json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_layer_normalizes_failures_of_any_shape() {
        let svc = NormalizeErrorLayer::new().layer(service_fn(|input: Value| async move {
            Err::<(), _>(input)
        }));

        for payload in [
            json!("not found"),
            json!({"code": 42, "message": "x"}),
            json!([1, 2, 3]),
            Value::Null,
        ] {
            let err = svc.clone().oneshot(payload.clone()).await.unwrap_err();
            assert_eq!(err.status(), StatusClass::BadRequest);
            assert_eq!(err.payload(), &payload);
        }
    }

    #[derive(Clone)]
    struct NeverReady;

    impl Service<()> for NeverReady {
        type Response = ();
        type Error = &'static str;
        type Future = std::future::Ready<Result<(), &'static str>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Err("overloaded"))
        }

        fn call(&mut self, _request: ()) -> Self::Future {
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_readiness_errors_are_normalized() {
        let err = NormalizeErrorLayer.layer(NeverReady).oneshot(()).await.unwrap_err();
        assert_eq!(err, NormalizedError::new("overloaded"));

        let response = into_response_service(NeverReady).oneshot(()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["payload"], "overloaded");
    }

    #[tokio::test]
    async fn test_into_response_shape() {
        let response = NormalizedError::new(json!({"code": 42, "message": "x"})).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static("application/json")
        );
        assert!(response.extensions().get::<Normalized>().is_some());
        assert_eq!(
            body_json(response).await,
            json!({
                "statusCode": 400,
                "error": "Bad Request",
                "payload": {"code": 42, "message": "x"}
            })
        );
    }

    #[tokio::test]
    async fn test_unserializable_payload_still_bad_request() {
        let mut payload = BTreeMap::new();
        payload.insert(vec![1u8, 2], 3u8);

        let response = NormalizedError::new(payload).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["statusCode"], 400);
        assert!(body["payload"].as_str().unwrap().contains("key must be a string"));
    }

    #[tokio::test]
    async fn test_response_service_keeps_success_status() {
        let svc = into_response_service(service_fn(|_req: Request| async {
            Ok::<_, Value>((StatusCode::CREATED, "made"))
        }));

        let response = svc.oneshot(Request::new(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.extensions().get::<Normalized>().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_calls_do_not_interfere() {
        let svc = NormalizeErrorLayer.layer(service_fn(|n: u64| async move {
            tokio::task::yield_now().await;
            if n % 2 == 0 {
                Ok(n)
            } else {
                Err(format!("odd {}", n))
            }
        }));

        let mut handles = Vec::new();
        for n in 0..64u64 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { (n, svc.oneshot(n).await) }));
        }

        for handle in handles {
            let (n, result) = handle.await.unwrap();
            if n % 2 == 0 {
                assert_eq!(result, Ok(n));
            } else {
                let err = result.unwrap_err();
                assert_eq!(err.status(), StatusClass::BadRequest);
                assert_eq!(err.payload(), &format!("odd {}", n));
            }
        }
    }

    #[tokio::test]
    async fn test_panics_become_bad_requests() {
        async fn boom() -> &'static str {
            panic!("ledger exploded")
        }
        async fn opaque() -> &'static str {
            std::panic::panic_any(17u32)
        }

        let app = Router::new()
            .route("/boom", get(boom))
            .route("/opaque", get(opaque))
            .layer(catch_panic_layer());

        let response = app
            .clone()
            .oneshot(http::Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["payload"], "ledger exploded");

        let response = app
            .oneshot(http::Request::get("/opaque").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["payload"], OPAQUE_PANIC_MESSAGE);
    }
}
