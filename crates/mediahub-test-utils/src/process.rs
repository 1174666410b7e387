//! In-memory process host with event recording.
//!
//! Processes never touch the OS. Tests assert on the recorded
//! [`ProcessEvent`] sequence to check launch ordering.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mediahub_core::process::{LaunchCommand, ProcessHost, RunningProcess};
use tokio::sync::Notify;

/// Record of a process lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A process was spawned.
    Spawned {
        /// Fake pid.
        pid: u32,
        /// Command that was spawned.
        command: LaunchCommand,
    },
    /// SIGINT was delivered.
    Interrupted {
        /// Fake pid.
        pid: u32,
    },
    /// The process exited on its own or after SIGINT.
    Exited {
        /// Fake pid.
        pid: u32,
    },
    /// The process was force-killed.
    Killed {
        /// Fake pid.
        pid: u32,
    },
}

impl ProcessEvent {
    /// Pid the event refers to.
    pub fn pid(&self) -> u32 {
        match self {
            Self::Spawned { pid, .. }
            | Self::Interrupted { pid }
            | Self::Exited { pid }
            | Self::Killed { pid } => *pid,
        }
    }
}

#[derive(Debug, Default)]
struct ProcessState {
    exited: AtomicBool,
    notify: Notify,
}

impl ProcessState {
    fn finish(&self) -> bool {
        let first = !self.exited.swap(true, Ordering::AcqRel);
        self.notify.notify_waiters();
        first
    }
}

#[derive(Debug, Default)]
struct HostShared {
    events: Mutex<Vec<ProcessEvent>>,
    installed: Mutex<HashSet<String>>,
    processes: Mutex<HashMap<u32, Arc<ProcessState>>>,
    spawn_error: Mutex<Option<io::ErrorKind>>,
    ignore_interrupt: AtomicBool,
    fail_kill: AtomicBool,
    next_pid: AtomicU32,
}

impl HostShared {
    fn record(&self, event: ProcessEvent) {
        self.events.lock().expect("lock").push(event);
    }
}

/// [`ProcessHost`] that spawns fake processes.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessHost {
    shared: Arc<HostShared>,
}

impl FakeProcessHost {
    /// Creates a host with no installed binaries.
    #[must_use]
    pub fn new() -> Self {
        let host = Self::default();
        host.shared.next_pid.store(1000, Ordering::Relaxed);
        host
    }

    /// Creates a host where `binaries` resolve on `PATH`.
    #[must_use]
    pub fn with_binaries<I, S>(binaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let host = Self::new();
        for binary in binaries {
            host.install(binary);
        }
        host
    }

    /// Makes `binary` resolvable.
    pub fn install(&self, binary: impl Into<String>) {
        self.shared
            .installed
            .lock()
            .expect("lock")
            .insert(binary.into());
    }

    /// Makes `binary` unresolvable.
    pub fn uninstall(&self, binary: &str) {
        self.shared.installed.lock().expect("lock").remove(binary);
    }

    /// Makes every subsequent spawn fail with `kind`.
    pub fn fail_spawns(&self, kind: io::ErrorKind) {
        *self.shared.spawn_error.lock().expect("lock") = Some(kind);
    }

    /// Processes spawned from now on ignore SIGINT.
    pub fn ignore_interrupts(&self, ignore: bool) {
        self.shared.ignore_interrupt.store(ignore, Ordering::Release);
    }

    /// Makes force kills fail with `PermissionDenied` while `fail` is set.
    pub fn fail_kills(&self, fail: bool) {
        self.shared.fail_kill.store(fail, Ordering::Release);
    }

    /// Simulates `pid` exiting on its own.
    pub fn exit_process(&self, pid: u32) {
        let state = self.shared.processes.lock().expect("lock").get(&pid).cloned();
        if let Some(state) = state {
            if state.finish() {
                self.shared.record(ProcessEvent::Exited { pid });
            }
        }
    }

    /// Returns all recorded events.
    pub fn events(&self) -> Vec<ProcessEvent> {
        self.shared.events.lock().expect("lock").clone()
    }

    /// Clears recorded events.
    pub fn clear_events(&self) {
        self.shared.events.lock().expect("lock").clear();
    }

    /// Commands spawned so far, in order.
    pub fn spawned(&self) -> Vec<LaunchCommand> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProcessEvent::Spawned { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Pids of processes that have not exited.
    pub fn alive(&self) -> Vec<u32> {
        let mut alive: Vec<u32> = self
            .shared
            .processes
            .lock()
            .expect("lock")
            .iter()
            .filter(|(_, state)| !state.exited.load(Ordering::Acquire))
            .map(|(pid, _)| *pid)
            .collect();
        alive.sort_unstable();
        alive
    }
}

impl ProcessHost for FakeProcessHost {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.shared
            .installed
            .lock()
            .expect("lock")
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }

    fn spawn(&self, command: &LaunchCommand) -> io::Result<Box<dyn RunningProcess>> {
        if let Some(kind) = *self.shared.spawn_error.lock().expect("lock") {
            return Err(io::Error::new(kind, "injected spawn failure"));
        }

        let pid = self.shared.next_pid.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ProcessState::default());
        self.shared
            .processes
            .lock()
            .expect("lock")
            .insert(pid, Arc::clone(&state));
        self.shared.record(ProcessEvent::Spawned {
            pid,
            command: command.clone(),
        });

        Ok(Box::new(FakeProcess {
            pid,
            state,
            ignore_interrupt: self.shared.ignore_interrupt.load(Ordering::Acquire),
            host: Arc::clone(&self.shared),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    state: Arc<ProcessState>,
    ignore_interrupt: bool,
    host: Arc<HostShared>,
}

#[async_trait]
impl RunningProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_exited(&mut self) -> io::Result<bool> {
        Ok(self.state.exited.load(Ordering::Acquire))
    }

    fn interrupt(&mut self) -> io::Result<()> {
        self.host.record(ProcessEvent::Interrupted { pid: self.pid });
        if !self.ignore_interrupt && self.state.finish() {
            self.host.record(ProcessEvent::Exited { pid: self.pid });
        }
        Ok(())
    }

    async fn wait(&mut self) -> io::Result<()> {
        loop {
            let notified = self.state.notify.notified();
            if self.state.exited.load(Ordering::Acquire) {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn kill(&mut self) -> io::Result<()> {
        if self.host.fail_kill.load(Ordering::Acquire) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected kill failure",
            ));
        }
        if self.state.finish() {
            self.host.record(ProcessEvent::Killed { pid: self.pid });
        }
        Ok(())
    }
}
