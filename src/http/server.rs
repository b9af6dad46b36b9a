//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (limits, timeout, access log, request ID)
//! - Bind server to listener and serve until shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::Settings;
use crate::fields;
use crate::http::handlers;
use crate::http::middleware::access_log_middleware;
use crate::http::request::RequestIdLayer;
use crate::observability::Logger;
use crate::store::ItemStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub logger: Logger,
}

/// HTTP server for the items API.
pub struct HttpServer {
    router: Router,
    settings: Settings,
    logger: Logger,
}

impl HttpServer {
    pub fn new(settings: Settings, logger: Logger, store: Arc<dyn ItemStore>) -> Self {
        let state = AppState {
            store,
            logger: logger.clone(),
        };
        let router = build_router(&settings, state);
        Self {
            router,
            settings,
            logger,
        }
    }

    /// The fully layered router, for driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        self.logger.info(
            format!("running on http://{addr} (Press CTRL+C to quit)"),
            fields! {},
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.logger.info("shutdown complete", fields! {});
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layers run outermost first: request id, access log, then limits.
#[allow(deprecated)]
pub fn build_router(settings: &Settings, state: AppState) -> Router {
    let logger = state.logger.clone();
    Router::new()
        .route("/items/", post(handlers::post_items).get(handlers::get_items))
        .route("/items/{id}", get(handlers::get_item))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(settings.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            settings.request_timeout_secs,
        )))
        .layer(middleware::from_fn_with_state(logger, access_log_middleware))
        .layer(RequestIdLayer)
}
