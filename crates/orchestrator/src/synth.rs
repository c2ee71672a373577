//! Turns registry entries into fully specified external compiler command lines.
//!
//! Nothing in here touches the filesystem: paths are derived from the
//! configured roots and the naming convention alone.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use buildconfig::{BuildConfig, ProgramSettings, Stage};
use serde::Serialize;

/// One shader compile: a single (unit, stage) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileInvocation {
    pub unit: String,
    pub stage: Stage,
    pub executable: String,
    pub args: Vec<OsString>,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Compilation mode handed to the program compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    Debug,
    #[default]
    Release,
}

impl fmt::Display for BuildProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildProfile::Debug => f.write_str("debug"),
            BuildProfile::Release => f.write_str("release"),
        }
    }
}

/// The single "main build" of the program that consumes the shaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInvocation {
    pub profile: BuildProfile,
    pub executable: String,
    pub args: Vec<OsString>,
    pub envs: Vec<(String, String)>,
}

/// `<shader-root>/<unit>.<source-ext>`, shared by every stage of the unit.
pub fn source_path(config: &BuildConfig, unit: &str) -> PathBuf {
    config
        .shader_root
        .join(format!("{unit}.{}", config.compiler.source_extension))
}

/// `<asset-root>/shaders/<unit>.<stage-suffix>.<binary-ext>`.
pub fn destination_path(config: &BuildConfig, unit: &str, stage: Stage) -> PathBuf {
    config.shader_output_dir().join(format!(
        "{unit}.{}.{}",
        stage.suffix(),
        config.compiler.binary_extension
    ))
}

pub fn synthesize(config: &BuildConfig, unit: &str, stage: Stage) -> CompileInvocation {
    let source = source_path(config, unit);
    let destination = destination_path(config, unit, stage);
    CompileInvocation {
        unit: unit.to_string(),
        stage,
        executable: config.compiler.executable.clone(),
        args: compiler_args(stage, &source, &destination),
        source,
        destination,
    }
}

// Argument shape expected by the shader compiler:
// `-stage <stage> -entry <entry> -o <dest> <src>`.
fn compiler_args(stage: Stage, source: &Path, destination: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-stage"),
        OsString::from(stage.name()),
        OsString::from("-entry"),
        OsString::from(stage.entry_point()),
        OsString::from("-o"),
        destination.as_os_str().to_os_string(),
        source.as_os_str().to_os_string(),
    ]
}

pub fn synthesize_program(
    settings: &ProgramSettings,
    profile: BuildProfile,
    log_level: Option<&str>,
) -> ProgramInvocation {
    let profile_args = match profile {
        BuildProfile::Debug => &settings.debug_args,
        BuildProfile::Release => &settings.release_args,
    };
    let args = settings
        .args
        .iter()
        .chain(profile_args)
        .map(OsString::from)
        .collect();

    let envs = match (&settings.log_env, log_level) {
        (Some(name), Some(level)) => vec![(name.clone(), level.to_string())],
        _ => Vec::new(),
    };

    ProgramInvocation {
        profile,
        executable: settings.executable.clone(),
        args,
        envs,
    }
}
