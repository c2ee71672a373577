use std::io;

use tracing::{debug, error, warn};

use crate::job::{Invocation, JobId};
use crate::process::{ChildProcess, Launcher};
use crate::report::{Failure, FailureDetail};

/// What to do when the OS refuses to create a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchPolicy {
    /// Stop launching and abort the run on the first failure.
    #[default]
    FailFast,
    /// Record the failure and keep launching the remaining invocations.
    Collect,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to launch {job} (`{command}`): {source}")]
pub struct LaunchError {
    pub job: JobId,
    pub command: String,
    #[source]
    pub source: io::Error,
}

/// A running process together with the job that started it.
pub struct ProcessHandle<C> {
    pub job: JobId,
    pub child: C,
}

/// Result of a launch phase that did not abort.
pub struct LaunchBatch<C> {
    pub handles: Vec<ProcessHandle<C>>,
    pub failures: Vec<Failure>,
}

pub fn launch<L: Launcher>(
    launcher: &mut L,
    invocation: Invocation<'_>,
) -> Result<ProcessHandle<L::Child>, LaunchError> {
    let job = invocation.job();
    match launcher.launch(invocation) {
        Ok(child) => {
            debug!(
                job = %job,
                pid = child.id(),
                command = %invocation.command_line(),
                "launched"
            );
            Ok(ProcessHandle { job, child })
        }
        Err(source) => Err(LaunchError {
            job,
            command: invocation.command_line(),
            source,
        }),
    }
}

/// Starts every invocation in order without waiting on any of them.
///
/// Under [`LaunchPolicy::FailFast`] the first failure aborts the batch: later
/// invocations are never attempted, and children already started are killed
/// and reaped before the error is returned.
pub fn launch_all<'a, L, I>(
    launcher: &mut L,
    invocations: I,
    policy: LaunchPolicy,
) -> Result<LaunchBatch<L::Child>, LaunchError>
where
    L: Launcher,
    I: IntoIterator<Item = Invocation<'a>>,
{
    let mut batch = LaunchBatch {
        handles: Vec::new(),
        failures: Vec::new(),
    };

    for invocation in invocations {
        match launch(launcher, invocation) {
            Ok(handle) => batch.handles.push(handle),
            Err(err) => match policy {
                LaunchPolicy::FailFast => {
                    abandon(batch.handles);
                    return Err(err);
                }
                LaunchPolicy::Collect => {
                    warn!(job = %err.job, command = %err.command, error = %err.source, "launch failed; continuing");
                    batch.failures.push(Failure {
                        job: err.job,
                        detail: FailureDetail::Launch {
                            message: err.source.to_string(),
                        },
                    });
                }
            },
        }
    }

    Ok(batch)
}

fn abandon<C: ChildProcess>(handles: Vec<ProcessHandle<C>>) {
    for mut handle in handles {
        if let Err(err) = handle.child.kill() {
            debug!(job = %handle.job, error = %err, "kill failed; process likely already exited");
        }
        if let Err(err) = handle.child.wait() {
            error!(job = %handle.job, pid = handle.child.id(), error = %err, "failed to reap aborted process");
        }
    }
}
