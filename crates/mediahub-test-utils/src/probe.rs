//! Scripted connectivity prober.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mediahub_core::reachability::Prober;

/// [`Prober`] that answers from a script, then repeats a fallback value.
#[derive(Debug, Clone)]
pub struct ScriptedProber {
    script: Arc<Mutex<VecDeque<bool>>>,
    fallback: bool,
    probes: Arc<AtomicUsize>,
}

impl ScriptedProber {
    /// Answers `script` in order, then `fallback` forever.
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            fallback,
            probes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answers `value`.
    #[must_use]
    pub fn constant(value: bool) -> Self {
        Self::new([], value)
    }

    /// Appends answers to the script.
    pub fn push(&self, answers: impl IntoIterator<Item = bool>) {
        self.script.lock().expect("lock").extend(answers);
    }

    /// Number of probes made.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _endpoint: &str, _timeout: Duration) -> bool {
        self.probes.fetch_add(1, Ordering::AcqRel);
        self.script
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
