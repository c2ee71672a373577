use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use crate::job::{Invocation, JobId};
use crate::process::{ChildProcess, Launcher, Termination};

#[derive(Debug, Clone, Copy)]
pub enum Script {
    Exit(i32),
    SpawnError,
    /// Never exits on its own; only a kill ends it.
    Hang,
    WaitError,
}

#[derive(Debug, Default)]
pub struct Journal {
    pub attempted: Vec<JobId>,
    pub launched: Vec<JobId>,
    pub reaped: Vec<JobId>,
    pub killed: Vec<JobId>,
}

pub struct FakeChild {
    job: JobId,
    pid: u32,
    script: Script,
    killed: bool,
    reaped: bool,
    journal: Rc<RefCell<Journal>>,
}

impl FakeChild {
    fn reap(&mut self) -> Termination {
        assert!(!self.reaped, "{} was waited on twice", self.job);
        self.reaped = true;
        self.journal.borrow_mut().reaped.push(self.job.clone());
        match self.script {
            _ if self.killed => Termination::Signaled { signal: 9 },
            Script::Exit(code) => Termination::Exited { code },
            _ => Termination::Unknown,
        }
    }
}

impl ChildProcess for FakeChild {
    fn id(&self) -> u32 {
        self.pid
    }

    fn wait(&mut self) -> io::Result<Termination> {
        match self.script {
            Script::Hang if !self.killed => panic!("{} would block forever", self.job),
            Script::WaitError => {
                self.reap();
                Err(io::Error::new(io::ErrorKind::Interrupted, "wait interrupted"))
            }
            _ => Ok(self.reap()),
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<Termination>> {
        match self.script {
            Script::Hang if !self.killed => Ok(None),
            Script::WaitError => self.wait().map(Some),
            _ => Ok(Some(self.reap())),
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.killed = true;
        self.journal.borrow_mut().killed.push(self.job.clone());
        Ok(())
    }
}

/// Launcher that hands out scripted children and journals every call.
#[derive(Default)]
pub struct FakeLauncher {
    scripts: HashMap<JobId, Script>,
    journal: Rc<RefCell<Journal>>,
    next_pid: u32,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, job: JobId, script: Script) -> Self {
        self.scripts.insert(job, script);
        self
    }

    pub fn journal(&self) -> Rc<RefCell<Journal>> {
        Rc::clone(&self.journal)
    }
}

impl Launcher for FakeLauncher {
    type Child = FakeChild;

    fn launch(&mut self, invocation: Invocation<'_>) -> io::Result<FakeChild> {
        let job = invocation.job();
        self.journal.borrow_mut().attempted.push(job.clone());
        let script = self.scripts.get(&job).copied().unwrap_or(Script::Exit(0));
        if let Script::SpawnError = script {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "No such file or directory",
            ));
        }

        self.next_pid += 1;
        self.journal.borrow_mut().launched.push(job.clone());
        Ok(FakeChild {
            job,
            pid: self.next_pid,
            script,
            killed: false,
            reaped: false,
            journal: Rc::clone(&self.journal),
        })
    }
}
