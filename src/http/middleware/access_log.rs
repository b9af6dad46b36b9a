//! Request/response logging middleware.
//!
//! Logs one line when a request arrives and one line when its response
//! body has been fully produced. The response body is observed frame by
//! frame and forwarded untouched, in order.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, RawPathParams, State},
    http::{header, request::Parts, uri::Authority, Method, Request, StatusCode, Version},
    middleware::Next,
    response::Response,
};
use bytes::{Bytes, BytesMut};
use futures_util::task::noop_waker_ref;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use indexmap::IndexMap;

use crate::fields;
use crate::observability::correlation;
use crate::observability::{Fields, Logger};

/// Placeholder for an unavailable client address part.
const UNKNOWN: &str = "unknown";

/// Kind of inbound exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Http,
    WebSocket,
}

impl ExchangeKind {
    pub fn of<B>(request: &Request<B>) -> Self {
        let headers = request.headers();
        let upgrade = headers
            .get(header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"));
        let connection_upgrade = headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

        if upgrade && connection_upgrade {
            ExchangeKind::WebSocket
        } else {
            ExchangeKind::Http
        }
    }
}

/// Request metadata captured before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub client: Option<SocketAddr>,
    pub headers: IndexMap<String, String>,
    pub http_version: &'static str,
    pub method: String,
    pub path_params: IndexMap<String, String>,
    pub query_params: IndexMap<String, String>,
    pub url: String,
    pub path: String,
    pub port: Option<u16>,
    pub scheme: String,
}

impl RequestSnapshot {
    pub fn capture(parts: &Parts, path_params: Option<&RawPathParams>) -> Self {
        let client = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        // First value of a repeated header wins.
        let mut headers = IndexMap::new();
        for (name, value) in parts.headers.iter() {
            headers
                .entry(name.as_str().to_string())
                .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        // Last value of a repeated query key wins.
        let query_params: IndexMap<String, String> = parts
            .uri
            .query()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        let path_params: IndexMap<String, String> = path_params
            .map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let scheme = parts.uri.scheme_str().unwrap_or("http").to_string();
        let authority = parts
            .uri
            .authority()
            .map(|a| a.as_str().to_string())
            .or_else(|| {
                parts
                    .headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "localhost".to_string());
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        // Explicit ports are kept, default ones included.
        let port = authority
            .parse::<Authority>()
            .ok()
            .and_then(|a| a.port_u16());
        let url = format!("{scheme}://{authority}{path_and_query}");
        let path = parts.uri.path().to_string();

        Self {
            client,
            headers,
            http_version: http_version(parts.version),
            method: parts.method.as_str().to_string(),
            path_params,
            query_params,
            url,
            path,
            port,
            scheme,
        }
    }

    /// `host:port - "METHOD URL HTTP/x.y"`
    pub fn request_line(&self) -> String {
        let (host, port) = match self.client {
            Some(addr) => (addr.ip().to_string(), addr.port().to_string()),
            None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        };
        format!(
            "{host}:{port} - \"{} {} HTTP/{}\"",
            self.method, self.url, self.http_version
        )
    }

    pub fn to_fields(&self) -> Fields {
        let client = match self.client {
            Some(addr) => fields! { "host" => addr.ip().to_string(), "port" => addr.port() },
            None => Fields::new(),
        };
        fields! {
            "client" => client,
            "headers" => pairs(&self.headers),
            "http_version" => self.http_version,
            "method" => self.method.clone(),
            "path_params" => pairs(&self.path_params),
            "query_params" => pairs(&self.query_params),
            "url" => fields! {
                "path" => self.path.clone(),
                "port" => self.port,
                "scheme" => self.scheme.clone(),
            },
        }
    }
}

fn pairs(pairs: &IndexMap<String, String>) -> Fields {
    pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_11 => "1.1",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "",
    }
}

/// `200 OK`, `404 Not Found`; unknown codes keep a trailing space.
pub fn status_line(status: StatusCode) -> String {
    format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or(""))
}

/// Response state of one exchange, logged once.
#[derive(Debug)]
pub struct ResponseLog {
    logger: Logger,
    request_line: String,
    correlation_id: Option<String>,
    status: StatusCode,
    body: BytesMut,
}

impl ResponseLog {
    pub fn new(
        logger: Logger,
        request_line: String,
        correlation_id: Option<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            logger,
            request_line,
            correlation_id,
            status,
            body: BytesMut::new(),
        }
    }

    fn append(&mut self, chunk: &Bytes) {
        self.body.extend_from_slice(chunk);
    }

    fn emit(self) {
        let message = format!("{} {}", self.request_line, status_line(self.status));
        let extra = fields! {
            "body" => self.body.freeze(),
            "status_code" => self.status.as_u16(),
        };
        let logger = self.logger;
        let log = move || logger.info(message, extra);
        match self.correlation_id {
            Some(id) => correlation::scope_sync(id, log),
            None => log(),
        }
    }
}

/// Response body that records every data frame it forwards.
///
/// The response line is emitted on the terminal frame. A body dropped
/// mid-stream is never logged. A body dropped before its first poll (an
/// outer layer replaced it, or the server had nothing to send) is drained
/// of the frames it has ready and logged if that reaches the end.
#[derive(Debug)]
pub struct LoggedBody {
    inner: Body,
    pending: Option<ResponseLog>,
    polled: bool,
}

impl LoggedBody {
    pub fn new(inner: Body, log: ResponseLog) -> Self {
        Self {
            inner,
            pending: Some(log),
            polled: false,
        }
    }

    fn record(&mut self, frame: &Frame<Bytes>) {
        if let (Some(chunk), Some(log)) = (frame.data_ref(), self.pending.as_mut()) {
            log.append(chunk);
        }
    }

    fn finish(&mut self) {
        if let Some(log) = self.pending.take() {
            log.emit();
        }
    }

    /// Poll without a task until the body ends or has nothing ready.
    fn drain_ready(&mut self) {
        let mut cx = Context::from_waker(noop_waker_ref());
        while self.pending.is_some() {
            if self.inner.is_end_stream() {
                self.finish();
                return;
            }
            match Pin::new(&mut self.inner).poll_frame(&mut cx) {
                Poll::Ready(Some(Ok(frame))) => self.record(&frame),
                Poll::Ready(None) => self.finish(),
                Poll::Ready(Some(Err(_))) | Poll::Pending => return,
            }
        }
    }
}

impl HttpBody for LoggedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        this.polled = true;
        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));
        match &frame {
            Some(Ok(frame)) => {
                this.record(frame);
                if this.inner.is_end_stream() {
                    this.finish();
                }
            }
            Some(Err(_)) => {}
            None => this.finish(),
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for LoggedBody {
    fn drop(&mut self) {
        if self.pending.is_none() {
            return;
        }
        if !self.polled {
            self.drain_ready();
        } else if self.inner.is_end_stream() {
            self.finish();
        }
    }
}

/// Log the request on arrival and the response once it is complete.
///
/// WebSocket upgrades pass through without any record. A HEAD response has
/// no body to send, so it is logged as soon as the handler returns.
pub async fn access_log_middleware(
    State(logger): State<Logger>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if ExchangeKind::of(&request) != ExchangeKind::Http {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let is_head = parts.method == Method::HEAD;
    let path_params = RawPathParams::from_request_parts(&mut parts, &()).await.ok();
    let snapshot = RequestSnapshot::capture(&parts, path_params.as_ref());
    let request_line = snapshot.request_line();
    logger.info(request_line.clone(), snapshot.to_fields());

    let response = next.run(Request::from_parts(parts, body)).await;

    let log = ResponseLog::new(
        logger,
        request_line,
        correlation::current(),
        response.status(),
    );
    if is_head {
        log.emit();
        return response;
    }

    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(LoggedBody::new(body, log)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{Level, LoggerOptions, LoggerRegistry, MemorySink, Sink};
    use futures_util::stream;
    use serde_json::Value;

    fn logger() -> (Logger, MemorySink) {
        let registry = LoggerRegistry::new();
        let (sink, lines) = Sink::memory();
        let logger = registry.create_logger(
            "access",
            LoggerOptions {
                level: Level::INFO,
                as_json: true,
                filters: Vec::new(),
                sink,
            },
        );
        (logger, lines)
    }

    fn records(lines: &MemorySink) -> Vec<Value> {
        lines
            .lines()
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn pending(logger: Logger, status: StatusCode) -> ResponseLog {
        ResponseLog::new(logger, "unknown:unknown - \"GET / HTTP/1.1\"".into(), None, status)
    }

    #[test]
    fn status_lines() {
        assert_eq!(status_line(StatusCode::OK), "200 OK");
        assert_eq!(status_line(StatusCode::NOT_FOUND), "404 Not Found");
        assert_eq!(status_line(StatusCode::from_u16(999).unwrap()), "999 ");
    }

    #[tokio::test]
    async fn chunks_are_forwarded_and_accumulated() {
        let (logger, lines) = logger();
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"a\":")),
            Ok(Bytes::from_static(b"")),
            Ok(Bytes::from_static(b"[1,2]}")),
        ];
        let body = LoggedBody::new(
            Body::from_stream(stream::iter(chunks)),
            pending(logger, StatusCode::OK),
        );

        let forwarded = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        assert_eq!(&forwarded[..], b"{\"a\":[1,2]}");

        let records = records(&lines);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "unknown:unknown - \"GET / HTTP/1.1\" 200 OK");
        assert_eq!(records[0]["extra"]["body"]["a"], serde_json::json!([1, 2]));
        assert_eq!(records[0]["extra"]["status_code"], 200);
    }

    #[tokio::test]
    async fn empty_body_logged_on_drop() {
        let (logger, lines) = logger();
        let body = LoggedBody::new(Body::empty(), pending(logger, StatusCode::NO_CONTENT));
        drop(body);

        let records = records(&lines);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["extra"]["body"], "");
    }

    #[tokio::test]
    async fn unpolled_complete_body_is_logged_on_drop() {
        let (logger, lines) = logger();
        let body = LoggedBody::new(Body::from("{\"ok\":true}"), pending(logger, StatusCode::OK));
        drop(body);

        let records = records(&lines);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["extra"]["body"], serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn abandoned_stream_is_not_logged() {
        let (logger, lines) = logger();
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from_static(b"first")), Ok(Bytes::from_static(b"second"))];
        let mut body = LoggedBody::new(
            Body::from_stream(stream::iter(chunks)),
            pending(logger, StatusCode::OK),
        );

        let first = std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await;
        assert!(first.is_some());
        drop(body);

        assert!(lines.lines().is_empty());
    }

    #[test]
    fn websocket_upgrades_are_not_http() {
        let upgrade = Request::get("/ws")
            .header(header::CONNECTION, "keep-alive, Upgrade")
            .header(header::UPGRADE, "websocket")
            .body(())
            .unwrap();
        assert_eq!(ExchangeKind::of(&upgrade), ExchangeKind::WebSocket);

        let plain = Request::get("/").body(()).unwrap();
        assert_eq!(ExchangeKind::of(&plain), ExchangeKind::Http);
    }

    #[test]
    fn snapshot_without_client_renders_unknown() {
        let (parts, _) = Request::get("/items/?page=2&page=3&sleep=false")
            .header(header::HOST, "api.local:8000")
            .header("x-trace", "one")
            .header("x-trace", "two")
            .body(())
            .unwrap()
            .into_parts();
        let snapshot = RequestSnapshot::capture(&parts, None);

        assert_eq!(
            snapshot.request_line(),
            "unknown:unknown - \"GET http://api.local:8000/items/?page=2&page=3&sleep=false HTTP/1.1\""
        );
        assert_eq!(snapshot.port, Some(8000));
        assert_eq!(snapshot.path, "/items/");
        assert_eq!(snapshot.query_params["page"], "3");
        assert_eq!(snapshot.query_params["sleep"], "false");
        assert_eq!(snapshot.headers["x-trace"], "one");
        assert!(snapshot.path_params.is_empty());
    }

    #[test]
    fn explicit_default_port_is_kept() {
        let (parts, _) = Request::get("/items/")
            .header(header::HOST, "api.local:80")
            .body(())
            .unwrap()
            .into_parts();
        let snapshot = RequestSnapshot::capture(&parts, None);

        assert_eq!(snapshot.url, "http://api.local:80/items/");
        assert_eq!(snapshot.port, Some(80));

        let (parts, _) = Request::get("/").body(()).unwrap().into_parts();
        assert_eq!(RequestSnapshot::capture(&parts, None).port, None);
    }
}
