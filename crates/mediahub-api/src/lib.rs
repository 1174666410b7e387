//! # mediahub-api
//!
//! HTTP control server for the mediahub kiosk orchestrator.
//!
//! The menu running in the kiosk browser drives the orchestrator through
//! this server: it reads and writes the settings document, launches apps,
//! and triggers the exit action. This crate is a thin composition layer; all
//! behavior lives in `mediahub-core`.
//!
//! ## Endpoints
//!
//! ```text
//! GET      /health               - Liveness
//! GET      /ready                - Readiness (503 once closing)
//! GET      /metrics              - Prometheus metrics
//! GET      /openapi.json         - OpenAPI document
//! GET/POST /api/config           - Settings document (PUT also accepted)
//! GET      /launch/app/{key}     - Present an app (303 to /)
//! GET      /launch/exit          - Run the exit action
//! GET      /api/presented        - Presented process
//! GET      /api/reachability     - Debounced connectivity
//! GET      /api/cec/status       - TV power state
//! GET      /api/cec/devices      - CEC bus scan
//! POST     /api/cec/on           - Wake the TV
//! POST     /api/cec/standby      - TV standby
//! ```
//!
//! Anything else falls through to the static menu assets when a static
//! directory is configured.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mediahub_api::prelude::*;
//!
//! let server = Server::from_config(Config::from_env()?)?;
//! server.serve().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{ApiError, ApiResult};
    pub use crate::server::{Server, ServerBuilder};
}
