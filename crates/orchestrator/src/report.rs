use std::fmt;
use std::process::ExitCode;

use serde::Serialize;
use tracing::{info, warn};

use crate::job::JobId;
use crate::process::Termination;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureDetail {
    /// The process ran and ended unsuccessfully.
    Terminated { termination: Termination },
    /// Killed after the run's wait deadline passed.
    TimedOut,
    /// The process could not be started (collected launch policy only).
    Launch { message: String },
    /// Waiting on the process failed; its exit status is unknown.
    Wait { message: String },
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDetail::Terminated { termination } => match termination {
                Termination::Exited { code } => write!(f, "exited with status {code}"),
                Termination::Signaled { signal } => write!(f, "terminated by signal {signal}"),
                Termination::Unknown => f.write_str("terminated abnormally"),
            },
            FailureDetail::TimedOut => f.write_str("timed out and was killed"),
            FailureDetail::Launch { message } => write!(f, "failed to launch: {message}"),
            FailureDetail::Wait { message } => write!(f, "failed to wait: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub job: JobId,
    pub detail: FailureDetail,
}

/// Aggregate result of one run, filled in as handles are drained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub launched: usize,
    pub waited: usize,
    pub failures: Vec<Failure>,
    /// Jobs deliberately not launched, e.g. a gated program build.
    pub skipped: Vec<JobId>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn record_failure(&mut self, job: JobId, detail: FailureDetail) {
        warn!(job = %job, detail = %detail, "build job failed");
        self.failures.push(Failure { job, detail });
    }

    pub fn merge(&mut self, other: RunOutcome) {
        self.launched += other.launched;
        self.waited += other.waited;
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
    }

    pub fn first_failure(&self) -> Option<&Failure> {
        self.failures.first()
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success() {
            return write!(f, "build succeeded: {} job(s) completed", self.launched);
        }

        write!(
            f,
            "build failed: {} of {} launched job(s) failed",
            self.failed(),
            self.launched
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.job, failure.detail)?;
        }
        for job in &self.skipped {
            write!(f, "\n  {job}: skipped")?;
        }
        Ok(())
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn exit_code(self) -> ExitCode {
        match self {
            RunStatus::Success => ExitCode::SUCCESS,
            RunStatus::Failed => ExitCode::FAILURE,
        }
    }
}

/// Logs the final summary and turns the outcome into a process exit signal.
pub fn report(outcome: &RunOutcome) -> RunStatus {
    if outcome.success() {
        info!(
            launched = outcome.launched,
            waited = outcome.waited,
            "all build jobs succeeded"
        );
        return RunStatus::Success;
    }

    warn!(
        launched = outcome.launched,
        waited = outcome.waited,
        failed = outcome.failed(),
        skipped = outcome.skipped.len(),
        first = ?outcome.first_failure().map(|failure| failure.job.to_string()),
        "build failed"
    );
    RunStatus::Failed
}
