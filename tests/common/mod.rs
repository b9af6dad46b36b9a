//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Response;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use items_api::config::Settings;
use items_api::http::HttpServer;
use items_api::lifecycle::Shutdown;
use items_api::observability::{app_logger, Logger, LoggerRegistry, MemorySink, Sink};
use items_api::store::MemoryStore;

/// Production settings: JSON lines, DEBUG level.
pub fn settings() -> Settings {
    Settings {
        app_name: "items-api-test".to_string(),
        app_version: "9.9.9".to_string(),
        ..Settings::default()
    }
}

/// Application logger writing JSON lines to memory.
pub fn memory_logger() -> (LoggerRegistry, Logger, MemorySink) {
    let registry = LoggerRegistry::new();
    let (sink, lines) = Sink::memory();
    let logger = app_logger(&registry, &settings(), sink);
    (registry, logger, lines)
}

pub struct TestApp {
    pub server: HttpServer,
    pub lines: MemorySink,
    pub store: Arc<MemoryStore>,
    _registry: LoggerRegistry,
}

pub fn test_app() -> TestApp {
    let (registry, logger, lines) = memory_logger();
    let store = Arc::new(MemoryStore::new());
    let server = HttpServer::new(settings(), logger, store.clone());
    TestApp {
        server,
        lines,
        store,
        _registry: registry,
    }
}

/// A server bound to an ephemeral local port.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub lines: MemorySink,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
    _registry: LoggerRegistry,
}

pub async fn spawn_server() -> RunningServer {
    let (registry, logger, lines) = memory_logger();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(settings(), logger, Arc::new(MemoryStore::new()));

    let shutdown = Shutdown::new();
    let signal = shutdown.signal();
    let handle = tokio::spawn(server.run(listener, signal));

    RunningServer {
        addr,
        lines,
        shutdown,
        handle,
        _registry: registry,
    }
}

/// Parsed JSON records written so far.
pub fn records(lines: &MemorySink) -> Vec<Value> {
    lines
        .lines()
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Records whose message starts with `prefix`.
pub fn records_starting_with(lines: &MemorySink, prefix: &str) -> Vec<Value> {
    records(lines)
        .into_iter()
        .filter(|r| r["message"].as_str().is_some_and(|m| m.starts_with(prefix)))
        .collect()
}

/// Poll until at least `count` lines exist, or give up after a second.
pub async fn wait_for_lines(lines: &MemorySink, count: usize) {
    for _ in 0..100 {
        if lines.lines().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
