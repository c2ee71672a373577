mod cli;
mod run;

use std::process::ExitCode;

use anyhow::Result;

fn main() -> Result<ExitCode> {
    let cli = cli::parse();
    run::initialise_tracing(cli.log_level.as_deref());
    run::run(cli)
}
