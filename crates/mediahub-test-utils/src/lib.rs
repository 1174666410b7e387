//! Shared test utilities for mediahub integration tests.
//!
//! This crate provides:
//! - [`FakeProcessHost`]: in-memory process host with event recording
//! - [`FakeCecAdapter`]: scripted CEC adapter with call recording
//! - [`ScriptedProber`] and [`RecordingPowerCommander`]
//! - [`TestContext`]: a fully wired set of components over the fakes
//!
//! # Example
//!
//! ```rust,ignore
//! use mediahub_test_utils::TestContext;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     ctx.supervisor.launch("youtube").await.unwrap();
//!     assert_eq!(ctx.host.alive().len(), 1);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod cec;
pub mod fixtures;
pub mod power;
pub mod probe;
pub mod process;

pub use cec::*;
pub use fixtures::*;
pub use power::*;
pub use probe::*;
pub use process::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("mediahub_core=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
