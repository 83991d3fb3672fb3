//! # Observability Module
//!
//! - **Structured Logging**: pretty or JSON logs filtered by `RUST_LOG`
//! - **Request Tracing**: request ID propagation through a span per request
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axum::Router;
//! use gopkg_node::observability::{init_logging, request_id_layer, LogFormat};
//!
//! init_logging("info", LogFormat::Json);
//!
//! let app: Router<()> = Router::new().layer(request_id_layer());
//! ```

mod logging;
pub mod middleware;

pub use logging::{init_logging, LogFormat};
pub use middleware::{request_id_layer, MiddlewareLayer, REQUEST_ID_HEADER};
