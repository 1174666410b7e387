//! Host process abstraction.
//!
//! The supervisor never touches `tokio::process` directly; it goes through
//! [`ProcessHost`] so launch sequencing can be tested without spawning real
//! browsers.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Program path.
    pub program: PathBuf,
    /// Arguments.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl LaunchCommand {
    /// Creates a command with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The last argument (the target URL for browser launches).
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }

    /// Shell-like rendering for logs.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A spawned process tracked by handle.
#[async_trait]
pub trait RunningProcess: Send + Sync {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Returns true if the process has exited (reaping it if so).
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be queried.
    fn try_exited(&mut self) -> io::Result<bool>;

    /// Sends the graceful termination signal (SIGINT).
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    fn interrupt(&mut self) -> io::Result<()>;

    /// Waits for the process to exit.
    async fn wait(&mut self) -> io::Result<()>;

    /// Force-kills the process and waits for it.
    async fn kill(&mut self) -> io::Result<()>;
}

/// Spawns processes and locates binaries on the host.
pub trait ProcessHost: Send + Sync {
    /// Resolves `program` on `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Spawns `command` detached from the orchestrator's stdio.
    ///
    /// # Errors
    ///
    /// Returns the OS spawn error.
    fn spawn(&self, command: &LaunchCommand) -> io::Result<Box<dyn RunningProcess>>;
}

/// [`ProcessHost`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessHost;

impl ProcessHost for TokioProcessHost {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn spawn(&self, command: &LaunchCommand) -> io::Result<Box<dyn RunningProcess>> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .envs(
                command
                    .env
                    .iter()
                    .map(|(k, v)| (OsString::from(k), OsString::from(v))),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Own process group: a Ctrl-C aimed at the orchestrator must not
        // reach the presented app before the supervisor decides to stop it.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn()?;
        Ok(Box::new(TokioProcess { child }))
    }
}

struct TokioProcess {
    child: tokio::process::Child,
}

#[async_trait]
impl RunningProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_exited(&mut self) -> io::Result<bool> {
        self.child.try_wait().map(|status| status.is_some())
    }

    #[cfg(unix)]
    fn interrupt(&mut self) -> io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pid = i32::try_from(pid).map_err(|_| io::Error::other("pid out of range"))?;
        kill(Pid::from_raw(pid), Signal::SIGINT).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> io::Result<()> {
        self.child.wait().await.map(|_| ())
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

/// How a process ended under [`terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// It had already exited.
    AlreadyExited,
    /// It exited within the grace period after SIGINT.
    Graceful,
    /// It was force-killed after the grace period.
    Killed,
}

/// Interrupts `process`, waits up to `grace`, then force-kills it.
///
/// Returns only once the process is confirmed gone.
///
/// # Errors
///
/// Returns an error only if the force kill itself fails.
pub async fn terminate(process: &mut dyn RunningProcess, grace: Duration) -> io::Result<Termination> {
    if process.try_exited().unwrap_or(false) {
        return Ok(Termination::AlreadyExited);
    }

    if let Err(e) = process.interrupt() {
        tracing::debug!(error = %e, pid = ?process.id(), "Interrupt failed; killing");
    } else if let Ok(result) = tokio::time::timeout(grace, process.wait()).await {
        if let Err(e) = result {
            tracing::debug!(error = %e, "Wait after interrupt failed; killing");
        } else {
            return Ok(Termination::Graceful);
        }
    }

    process.kill().await?;
    Ok(Termination::Killed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_builder_renders_for_logs() {
        let cmd = LaunchCommand::new("/usr/bin/chromium")
            .arg("--kiosk")
            .arg("https://x")
            .env("DISPLAY", ":0");
        assert_eq!(cmd.display(), "/usr/bin/chromium --kiosk https://x");
        assert_eq!(cmd.target(), Some("https://x"));
        assert_eq!(cmd.env, vec![("DISPLAY".to_string(), ":0".to_string())]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sleep_process_terminates_gracefully() {
        let host = TokioProcessHost;
        let Some(sleep) = host.locate("sleep") else {
            return;
        };
        let mut process = host.spawn(&LaunchCommand::new(sleep).arg("30")).unwrap();
        assert!(process.id().is_some());
        assert!(!process.try_exited().unwrap());

        let outcome = terminate(process.as_mut(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome, Termination::Graceful);
        assert!(process.try_exited().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exited_process_is_reported_as_such() {
        let host = TokioProcessHost;
        let Some(truth) = host.locate("true") else {
            return;
        };
        let mut process = host.spawn(&LaunchCommand::new(truth)).unwrap();
        process.wait().await.unwrap();

        let outcome = terminate(process.as_mut(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, Termination::AlreadyExited);
    }
}
