//! Power commander that records instead of powering off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mediahub_core::error::{Error, Result};
use mediahub_core::exit::{PowerAction, PowerCommander};

/// [`PowerCommander`] that records requested actions.
#[derive(Debug, Clone, Default)]
pub struct RecordingPowerCommander {
    actions: Arc<Mutex<Vec<PowerAction>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingPowerCommander {
    /// Creates a commander whose commands succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent commands fail.
    pub fn fail_commands(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }

    /// Actions requested so far.
    pub fn actions(&self) -> Vec<PowerAction> {
        self.actions.lock().expect("lock").clone()
    }
}

#[async_trait]
impl PowerCommander for RecordingPowerCommander {
    async fn execute(&self, action: PowerAction) -> Result<()> {
        self.actions.lock().expect("lock").push(action);
        if self.fail.load(Ordering::Acquire) {
            return Err(Error::PowerCommand {
                message: format!("scripted failure for {action:?}"),
            });
        }
        Ok(())
    }
}
