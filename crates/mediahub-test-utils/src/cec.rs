//! Scripted CEC adapter.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mediahub_core::cec::{AdapterError, AdapterErrorKind, CecAdapter, CecCommand};

#[derive(Debug)]
struct AdapterShared {
    available: AtomicBool,
    response: Mutex<Result<String, AdapterError>>,
    calls: Mutex<Vec<CecCommand>>,
    availability_checks: AtomicUsize,
}

/// [`CecAdapter`] that returns a scripted response and records calls.
#[derive(Debug, Clone)]
pub struct FakeCecAdapter {
    shared: Arc<AdapterShared>,
}

impl Default for FakeCecAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCecAdapter {
    /// An installed adapter whose commands succeed with empty output.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(AdapterShared {
                available: AtomicBool::new(true),
                response: Mutex::new(Ok(String::new())),
                calls: Mutex::new(Vec::new()),
                availability_checks: AtomicUsize::new(0),
            }),
        }
    }

    /// An adapter that is not installed.
    #[must_use]
    pub fn absent() -> Self {
        let adapter = Self::new();
        adapter.shared.available.store(false, Ordering::Release);
        adapter
    }

    /// An installed adapter whose commands fail with `kind`.
    #[must_use]
    pub fn failing(kind: AdapterErrorKind) -> Self {
        let adapter = Self::new();
        adapter.respond_with(Err(AdapterError::new(kind, "scripted failure")));
        adapter
    }

    /// Sets the response for subsequent commands.
    pub fn respond_with(&self, response: Result<String, AdapterError>) {
        *self.shared.response.lock().expect("lock") = response;
    }

    /// Commands executed so far.
    pub fn calls(&self) -> Vec<CecCommand> {
        self.shared.calls.lock().expect("lock").clone()
    }

    /// How often availability was probed.
    pub fn availability_checks(&self) -> usize {
        self.shared.availability_checks.load(Ordering::Acquire)
    }
}

#[async_trait]
impl CecAdapter for FakeCecAdapter {
    fn is_available(&self) -> bool {
        self.shared.availability_checks.fetch_add(1, Ordering::AcqRel);
        self.shared.available.load(Ordering::Acquire)
    }

    async fn execute(&self, command: CecCommand) -> Result<String, AdapterError> {
        self.shared.calls.lock().expect("lock").push(command);
        self.shared.response.lock().expect("lock").clone()
    }
}
