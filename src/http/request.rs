//! Request correlation.
//!
//! # Responsibilities
//! - Accept a caller-supplied `X-Request-ID` when it is a UUID
//! - Otherwise generate one (UUIDv4, hex)
//! - Expose it to handlers (extension + task-local) and echo it back
//!
//! # Design Decisions
//! - Request ID added as early as possible, so this layer sits outermost
//! - Invalid incoming ids are replaced, never trusted

use std::task::{Context, Poll};

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::observability::correlation;

/// Header carrying the correlation id in both directions.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation id of the exchange, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Convenience accessor for the correlation id.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.extensions().get::<RequestId>().map(|id| id.0.as_str())
    }
}

/// Pick the incoming id when valid, else a fresh one.
fn resolve(headers: &HeaderMap) -> String {
    match headers.get(&X_REQUEST_ID).map(|v| v.to_str()) {
        Some(Ok(id)) if correlation::is_valid(id) => id.to_string(),
        Some(_) => {
            tracing::warn!("generating new request id, since header value was invalid");
            correlation::generate()
        }
        None => correlation::generate(),
    }
}

/// Layer that assigns every exchange a correlation id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B, ResBody> Service<Request<B>> for RequestIdService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let id = resolve(request.headers());
        let header = HeaderValue::from_str(&id).ok();
        if let Some(value) = &header {
            request.headers_mut().insert(X_REQUEST_ID, value.clone());
        }
        request.extensions_mut().insert(RequestId(id.clone()));

        let future = self.inner.call(request);
        Box::pin(async move {
            let mut response = correlation::scope(id, future).await?;
            if let Some(value) = header {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
            Ok(response)
        })
    }
}
