use std::ffi::OsStr;
use std::fmt;

use buildconfig::Stage;
use serde::Serialize;

use crate::synth::{CompileInvocation, ProgramInvocation};

/// Identity of a launched process, used in logs and the final report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobId {
    Shader { unit: String, stage: Stage },
    Program,
}

impl JobId {
    pub fn shader(unit: impl Into<String>, stage: Stage) -> Self {
        JobId::Shader {
            unit: unit.into(),
            stage,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Shader { unit, stage } => write!(f, "shader '{unit}' ({stage})"),
            JobId::Program => f.write_str("program build"),
        }
    }
}

/// Borrowed view over anything the launcher can start.
#[derive(Debug, Clone, Copy)]
pub enum Invocation<'a> {
    Shader(&'a CompileInvocation),
    Program(&'a ProgramInvocation),
}

impl<'a> Invocation<'a> {
    pub fn job(&self) -> JobId {
        match self {
            Invocation::Shader(shader) => JobId::shader(shader.unit.clone(), shader.stage),
            Invocation::Program(_) => JobId::Program,
        }
    }

    pub fn executable(&self) -> &'a str {
        match *self {
            Invocation::Shader(shader) => &shader.executable,
            Invocation::Program(program) => &program.executable,
        }
    }

    pub fn args(&self) -> impl Iterator<Item = &'a OsStr> {
        let args = match *self {
            Invocation::Shader(shader) => &shader.args,
            Invocation::Program(program) => &program.args,
        };
        args.iter().map(|arg| arg.as_os_str())
    }

    pub fn envs(&self) -> &'a [(String, String)] {
        match *self {
            Invocation::Shader(_) => &[],
            Invocation::Program(program) => &program.envs,
        }
    }

    /// Printable command line; arguments containing whitespace are quoted.
    pub fn command_line(&self) -> String {
        let mut line = quote(self.executable());
        for arg in self.args() {
            line.push(' ');
            line.push_str(&quote(&arg.to_string_lossy()));
        }
        line
    }
}

fn quote(value: &str) -> String {
    if value.is_empty() || value.chars().any(|ch| ch.is_whitespace() || ch == '\'') {
        format!("'{}'", value.replace('\'', r"'\''"))
    } else {
        value.to_string()
    }
}
