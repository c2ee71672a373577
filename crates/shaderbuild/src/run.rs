use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use buildconfig::BuildConfig;
use orchestrator::{report, run_build, BuildPlan, JobId, RunOptions, RunOutcome, SystemLauncher};
use serde::Serialize;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, ReportFormat};

pub fn run(cli: Cli) -> Result<ExitCode> {
    let config = BuildConfig::load(&cli.config)
        .with_context(|| format!("failed to load build registry {}", cli.config.display()))?;
    debug!(
        config = %cli.config.display(),
        shader_root = %config.shader_root.display(),
        asset_root = %config.asset_root.display(),
        compiler = %config.compiler.executable,
        program = %config.program.executable,
        units = config.units.len(),
        "resolved build registry"
    );

    let plan = BuildPlan::from_config(&config, cli.profile(), cli.log_level.as_deref());
    if cli.dry_run {
        print_plan(&plan, cli.report)?;
        return Ok(ExitCode::SUCCESS);
    }

    prepare_output_dir(&config)?;

    let options = RunOptions {
        policy: cli.launch_policy(),
        timeout: cli.timeout.or(config.timeout),
        program_after_shaders: cli.after_shaders || config.program.after_shaders,
    };
    if let Some(timeout) = options.timeout {
        info!(timeout = ?timeout, "bounding wait for build processes");
    }

    let outcome = match run_build(&plan, &mut SystemLauncher, &options) {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                job = %err.job,
                command = %err.command,
                error = %err.source,
                "could not start build process; aborting"
            );
            return Err(err.into());
        }
    };

    print_outcome(&outcome, cli.report)?;
    Ok(report(&outcome).exit_code())
}

pub fn initialise_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// Compilers write into the output directory but do not create it.
fn prepare_output_dir(config: &BuildConfig) -> Result<()> {
    let dir = config.shader_output_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to prepare shader output directory {}", dir.display()))
}

#[derive(Serialize)]
struct PlannedCommand {
    job: JobId,
    command: String,
}

fn print_plan(plan: &BuildPlan, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Human => {
            for invocation in plan.invocations() {
                println!("{}", invocation.command_line());
            }
        }
        ReportFormat::Json => {
            let commands: Vec<_> = plan
                .invocations()
                .map(|invocation| PlannedCommand {
                    job: invocation.job(),
                    command: invocation.command_line(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&commands)
                    .context("failed to serialize build plan")?
            );
        }
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Human => println!("{outcome}"),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(outcome).context("failed to serialize run outcome")?
        ),
    }
    Ok(())
}
