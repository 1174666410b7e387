//! # mediahub-core
//!
//! Core components of the mediahub kiosk orchestrator.
//!
//! The orchestrator shows a full-screen menu of media apps, launches each one
//! as an external process, and drives the TV's power state over HDMI-CEC.
//! This crate holds everything with process-lifetime or failure-handling
//! concerns:
//!
//! - **Settings**: the persisted settings document and its validating store
//! - **Remote Power**: typed wrapper over the command-line CEC adapter
//! - **Reachability**: debounced background connectivity monitor
//! - **Supervisor**: owner of the single presented application process
//! - **Exit**: exit-action resolution with the CEC fallback chain
//!
//! ## Crate Boundary
//!
//! This crate has no HTTP concerns. `mediahub-api` composes these components
//! behind the control server.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mediahub_core::prelude::*;
//!
//! let settings = Arc::new(SettingsStore::load("config.json")?);
//! let supervisor = ProcessSupervisor::new(
//!     Arc::clone(&settings),
//!     Arc::new(TokioProcessHost),
//!     SupervisorConfig::default(),
//! );
//! supervisor.launch("youtube").await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod cec;
pub mod error;
pub mod exit;
pub mod metrics;
pub mod observability;
pub mod process;
pub mod reachability;
pub mod settings;
pub mod store;
pub mod supervisor;

pub use error::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::cec::{
        AdapterError, AdapterErrorKind, CecAdapter, CecClientAdapter, CecCommand, CecError,
        DeviceDescriptor, PowerStatus, RemotePowerController,
    };
    pub use crate::error::{Error, Result};
    pub use crate::exit::{
        ExitCoordinator, ExitOutcome, PowerAction, PowerCommander, ShutdownSignal,
        SystemPowerCommander,
    };
    pub use crate::process::{LaunchCommand, ProcessHost, RunningProcess, TokioProcessHost};
    pub use crate::reachability::{
        ProbeConfig, Prober, Reachability, ReachabilityHandle, ReachabilityMonitor, TcpProber,
    };
    pub use crate::settings::{
        AppDescriptor, ExitAction, ExitFallback, LaunchMethod, PerformanceMode, ResolutionHint,
        Settings,
    };
    pub use crate::store::SettingsStore;
    pub use crate::supervisor::{
        LaunchError, LaunchErrorKind, PresentedInfo, PresentedTarget, ProcessSupervisor,
        ResolvedMethod, SupervisorConfig,
    };
}
