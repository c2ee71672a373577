//! OS process seams: starting an invocation and observing its child.

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};

use serde::Serialize;

use crate::job::Invocation;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Exited { code: i32 },
    Signaled { signal: i32 },
    Unknown,
}

impl Termination {
    pub fn success(self) -> bool {
        matches!(self, Termination::Exited { code: 0 })
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Termination::Exited { code };
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Termination::Signaled { signal };
            }
        }

        Termination::Unknown
    }
}

/// A running external process owned by the supervisor.
pub trait ChildProcess {
    fn id(&self) -> u32;

    /// Blocks until the process exits and releases its OS resources.
    fn wait(&mut self) -> io::Result<Termination>;

    /// Reaps the process if it already exited.
    fn try_wait(&mut self) -> io::Result<Option<Termination>>;

    fn kill(&mut self) -> io::Result<()>;
}

impl ChildProcess for Child {
    fn id(&self) -> u32 {
        Child::id(self)
    }

    fn wait(&mut self) -> io::Result<Termination> {
        Child::wait(self).map(Termination::from)
    }

    fn try_wait(&mut self) -> io::Result<Option<Termination>> {
        Ok(Child::try_wait(self)?.map(Termination::from))
    }

    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }
}

/// Starts invocations without waiting for them.
pub trait Launcher {
    type Child: ChildProcess;

    fn launch(&mut self, invocation: Invocation<'_>) -> io::Result<Self::Child>;
}

/// Spawns real OS processes that share this process' stdout and stderr, so
/// compiler diagnostics reach the operator verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    type Child = Child;

    fn launch(&mut self, invocation: Invocation<'_>) -> io::Result<Child> {
        let mut command = Command::new(invocation.executable());
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        for (key, value) in invocation.envs() {
            command.env(key, value);
        }
        command.spawn()
    }
}
