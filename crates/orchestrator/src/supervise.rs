use std::io;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::launch::ProcessHandle;
use crate::process::{ChildProcess, Termination};
use crate::report::{FailureDetail, RunOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

enum Waited {
    Finished(Termination),
    TimedOut,
}

/// Waits on every handle exactly once, in launch order.
///
/// A failing process is recorded and the drain continues. With a timeout,
/// all handles share one deadline measured from the start of the drain;
/// processes still running at the deadline are killed and reaped.
pub fn supervise<C: ChildProcess>(
    handles: Vec<ProcessHandle<C>>,
    timeout: Option<Duration>,
) -> RunOutcome {
    let deadline = timeout.map(|limit| Instant::now() + limit);
    let mut outcome = RunOutcome {
        launched: handles.len(),
        ..RunOutcome::default()
    };

    for ProcessHandle { job, mut child } in handles {
        let pid = child.id();
        let waited = match deadline {
            Some(deadline) => wait_until(&mut child, deadline),
            None => child.wait().map(Waited::Finished),
        };
        outcome.waited += 1;

        match waited {
            Ok(Waited::Finished(termination)) if termination.success() => {
                debug!(job = %job, pid, "finished");
            }
            Ok(Waited::Finished(termination)) => {
                outcome.record_failure(job, FailureDetail::Terminated { termination });
            }
            Ok(Waited::TimedOut) => {
                outcome.record_failure(job, FailureDetail::TimedOut);
            }
            Err(err) => {
                outcome.record_failure(
                    job,
                    FailureDetail::Wait {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    outcome
}

fn wait_until<C: ChildProcess>(child: &mut C, deadline: Instant) -> io::Result<Waited> {
    loop {
        if let Some(termination) = child.try_wait()? {
            return Ok(Waited::Finished(termination));
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(pid = child.id(), "deadline reached; killing process");
            if let Err(err) = child.kill() {
                debug!(pid = child.id(), error = %err, "kill failed; process likely already exited");
            }
            child.wait()?;
            return Ok(Waited::TimedOut);
        }

        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Invocation, JobId};
    use crate::launch::{launch_all, LaunchPolicy};
    use crate::synth::{synthesize, CompileInvocation};
    use crate::testing::{FakeChild, FakeLauncher, Script};
    use buildconfig::{BuildConfig, Stage, UnitRegistry};

    fn handles(
        units: &[&str],
        launcher: &mut FakeLauncher,
    ) -> Vec<ProcessHandle<FakeChild>> {
        let config = BuildConfig::with_units(UnitRegistry::default());
        let shaders: Vec<CompileInvocation> = units
            .iter()
            .map(|unit| synthesize(&config, unit, Stage::Fragment))
            .collect();
        launch_all(
            launcher,
            shaders.iter().map(Invocation::Shader),
            LaunchPolicy::FailFast,
        )
        .unwrap()
        .handles
    }

    fn job(unit: &str) -> JobId {
        JobId::shader(unit, Stage::Fragment)
    }

    #[test]
    fn waits_on_every_handle_once_in_launch_order() {
        let mut launcher = FakeLauncher::new();
        let journal = launcher.journal();
        let handles = handles(&["a", "b", "c", "d"], &mut launcher);

        let outcome = supervise(handles, None);

        assert_eq!(outcome.launched, 4);
        assert_eq!(outcome.waited, 4);
        assert!(outcome.success());
        assert_eq!(
            journal.borrow().reaped,
            vec![job("a"), job("b"), job("c"), job("d")]
        );
    }

    #[test]
    fn failures_do_not_stop_the_drain() {
        let mut launcher = FakeLauncher::new()
            .with(job("a"), Script::Exit(1))
            .with(job("c"), Script::WaitError);
        let journal = launcher.journal();
        let handles = handles(&["a", "b", "c", "d"], &mut launcher);

        let outcome = supervise(handles, None);

        assert_eq!(outcome.waited, 4);
        assert_eq!(journal.borrow().reaped.len(), 4);
        assert_eq!(outcome.failed(), 2);
        assert_eq!(outcome.failures[0].job, job("a"));
        assert_eq!(
            outcome.failures[0].detail,
            FailureDetail::Terminated {
                termination: Termination::Exited { code: 1 }
            }
        );
        assert!(matches!(
            outcome.failures[1].detail,
            FailureDetail::Wait { .. }
        ));
    }

    #[test]
    fn deadline_kills_stragglers_and_keeps_draining() {
        let mut launcher = FakeLauncher::new().with(job("stuck"), Script::Hang);
        let journal = launcher.journal();
        let handles = handles(&["stuck", "quick"], &mut launcher);

        let outcome = supervise(handles, Some(Duration::from_millis(30)));

        assert_eq!(outcome.waited, 2);
        assert_eq!(outcome.failed(), 1);
        assert_eq!(outcome.failures[0].job, job("stuck"));
        assert_eq!(outcome.failures[0].detail, FailureDetail::TimedOut);
        let journal = journal.borrow();
        assert_eq!(journal.killed, vec![job("stuck")]);
        assert_eq!(journal.reaped, vec![job("stuck"), job("quick")]);
    }

    #[test]
    fn empty_collection_is_a_successful_drain() {
        let outcome = supervise(Vec::<ProcessHandle<FakeChild>>::new(), None);
        assert_eq!(outcome.launched, 0);
        assert_eq!(outcome.waited, 0);
        assert!(outcome.success());
    }
}
