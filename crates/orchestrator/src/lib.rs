//! Parallel shader build orchestration.
//!
//! A run expands the unit registry into compiler invocations, launches every
//! one of them (plus the program build) as an independent OS process, and
//! then drains the handles into a [`RunOutcome`].

mod job;
mod launch;
mod process;
mod report;
mod supervise;
mod synth;

#[cfg(test)]
mod testing;

use std::time::Duration;

use buildconfig::BuildConfig;
use tracing::info;

pub use job::{Invocation, JobId};
pub use launch::{launch, launch_all, LaunchBatch, LaunchError, LaunchPolicy, ProcessHandle};
pub use process::{ChildProcess, Launcher, SystemLauncher, Termination};
pub use report::{report, Failure, FailureDetail, RunOutcome, RunStatus};
pub use supervise::supervise;
pub use synth::{
    destination_path, source_path, synthesize, synthesize_program, BuildProfile,
    CompileInvocation, ProgramInvocation,
};

/// Every invocation of one run, synthesized up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub shaders: Vec<CompileInvocation>,
    pub program: ProgramInvocation,
}

impl BuildPlan {
    pub fn from_config(
        config: &BuildConfig,
        profile: BuildProfile,
        log_level: Option<&str>,
    ) -> Self {
        let shaders = config
            .units
            .entries()
            .map(|(stage, unit)| synthesize(config, unit, stage))
            .collect();
        Self {
            shaders,
            program: synthesize_program(&config.program, profile, log_level),
        }
    }

    /// Shader compiles in registry order, followed by the program build.
    pub fn invocations(&self) -> impl Iterator<Item = Invocation<'_>> {
        self.shader_invocations()
            .chain(std::iter::once(Invocation::Program(&self.program)))
    }

    pub fn shader_invocations(&self) -> impl Iterator<Item = Invocation<'_>> {
        self.shaders.iter().map(Invocation::Shader)
    }

    pub fn job_count(&self) -> usize {
        self.shaders.len() + 1
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub policy: LaunchPolicy,
    pub timeout: Option<Duration>,
    /// Hold the program build back until every shader compiled cleanly.
    pub program_after_shaders: bool,
}

/// Launches the whole plan and waits for every process it started.
///
/// Only a launch failure under [`LaunchPolicy::FailFast`] returns an error;
/// every other problem is recorded in the returned outcome.
pub fn run_build<L: Launcher>(
    plan: &BuildPlan,
    launcher: &mut L,
    options: &RunOptions,
) -> Result<RunOutcome, LaunchError> {
    info!(
        shaders = plan.shaders.len(),
        profile = %plan.program.profile,
        gated = options.program_after_shaders,
        "starting build"
    );

    if !options.program_after_shaders {
        return launch_and_drain(launcher, plan.invocations(), options);
    }

    let mut outcome = launch_and_drain(launcher, plan.shader_invocations(), options)?;
    if outcome.success() {
        let program = launch_and_drain(
            launcher,
            std::iter::once(Invocation::Program(&plan.program)),
            options,
        )?;
        outcome.merge(program);
    } else {
        info!(
            failed = outcome.failed(),
            "shader compilation failed; skipping program build"
        );
        outcome.skipped.push(JobId::Program);
    }
    Ok(outcome)
}

fn launch_and_drain<'a, L, I>(
    launcher: &mut L,
    invocations: I,
    options: &RunOptions,
) -> Result<RunOutcome, LaunchError>
where
    L: Launcher,
    I: IntoIterator<Item = Invocation<'a>>,
{
    let LaunchBatch { handles, failures } = launch_all(launcher, invocations, options.policy)?;
    let mut outcome = supervise(handles, options.timeout);
    // launch failures go first: they happened before any wait began
    let waited = std::mem::take(&mut outcome.failures);
    outcome.failures = failures.into_iter().chain(waited).collect();
    Ok(outcome)
}
