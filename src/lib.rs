//! Items API: a small CRUD service with structured request/response logging.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod store;

pub use config::Settings;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
