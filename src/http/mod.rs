//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (correlation id: reuse or generate, echo back)
//!     → middleware/access_log.rs (request line, then response line on completion)
//!     → tower-http timeout and body limit
//!     → handlers.rs (items CRUD against the store)
//!     → response.rs (errors as {"detail": ...})
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{build_router, AppState, HttpServer};
