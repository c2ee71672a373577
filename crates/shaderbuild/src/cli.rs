use std::path::PathBuf;
use std::time::Duration;

use buildconfig::{parse_timeout, DEFAULT_CONFIG_FILE};
use clap::Parser;
use orchestrator::{BuildProfile, LaunchPolicy};

#[derive(Parser, Debug)]
#[command(
    name = "shaderbuild",
    author,
    version,
    about = "Compile shader units in parallel with the program build"
)]
pub struct Cli {
    /// Build registry describing shader units, roots, and toolchain.
    #[arg(
        long,
        value_name = "FILE",
        env = "SHADERBUILD_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Build the program in debug mode instead of release.
    #[arg(long)]
    pub debug: bool,

    /// Log verbosity (`trace`, `debug`, `info`, `warn`, `error`, `off`); also
    /// forwarded to the program build when `program.log_env` is configured.
    #[arg(long, value_name = "LEVEL", value_parser = parse_log_level)]
    pub log_level: Option<String>,

    /// Kill processes still running after this long (e.g. `90s`, `5m`).
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Keep launching after a process fails to start instead of aborting.
    #[arg(long)]
    pub keep_going: bool,

    /// Start the program build only after every shader compiled cleanly.
    #[arg(long)]
    pub after_shaders: bool,

    /// Print the commands that would run without launching anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Final report format: `human` or `json`.
    #[arg(
        long,
        value_name = "FORMAT",
        value_parser = parse_report_format,
        default_value = "human"
    )]
    pub report: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Human,
    Json,
}

impl Cli {
    pub fn profile(&self) -> BuildProfile {
        if self.debug {
            BuildProfile::Debug
        } else {
            BuildProfile::Release
        }
    }

    pub fn launch_policy(&self) -> LaunchPolicy {
        if self.keep_going {
            LaunchPolicy::Collect
        } else {
            LaunchPolicy::FailFast
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_log_level(value: &str) -> Result<String, String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => Ok(normalized),
        "warning" => Ok("warn".to_string()),
        "" => Err("log level must not be empty".to_string()),
        other => Err(format!(
            "unknown log level '{other}'; expected trace, debug, info, warn, error, or off"
        )),
    }
}

pub fn parse_report_format(value: &str) -> Result<ReportFormat, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "human" | "text" => Ok(ReportFormat::Human),
        "json" => Ok(ReportFormat::Json),
        other => Err(format!(
            "unknown report format '{other}'; expected human or json"
        )),
    }
}
