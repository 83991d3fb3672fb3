//! # gopkg Node
//!
//! A gateway serving versioned Go import paths such as
//! `gopkg.example.com/owner/name.v2` from an ordinary Git host.
//!
//! Git clients fetching through the gateway see `HEAD` and `master` pointing
//! at the newest branch or tag matching the major version in the path, so
//! `go get` resolves each major version to its own line of releases.
//!
//! ```text
//!  client ──► api (axum) ──► router ──► upstream (reqwest) ──► Git host
//!                 │                          │
//!                 │            gopkg-git: rewrite HEAD/master
//!                 └──► gopkg-web: go-get and package pages
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! GOPKG_GOPKG_URL=https://gopkg.example.com \
//! GOPKG_VCS_URL=https://git.example.com \
//! cargo run --bin gopkg-node -- --addr 127.0.0.1:8080
//! ```
//!
//! ## Modules
//!
//! - [`api`] - HTTP routes and the per-request gateway pipeline
//! - [`config`] - Layered file and environment configuration
//! - [`router`] - Import path parsing
//! - [`upstream`] - Client for the upstream Git host
//! - [`observability`] - Logging and request IDs

pub mod api;
pub mod config;
pub mod observability;
pub mod router;
pub mod upstream;

pub use api::{create_router, ApiError, AppState};
pub use config::{ConfigError, GatewayConfig};
pub use router::{ImportRouter, RouteError};
pub use upstream::{Credentials, UpstreamClient, UpstreamError};
