//! testops-migrate entry point

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use testops_core::client::HttpTestOps;
use testops_core::logging::init_logger;
use testops_core::pipeline::RunContext;
use testops_core::{Cli, MigrationError};

fn main() -> ExitCode {
    init_logger();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            for cause in e.chain().skip(1) {
                log::error!("  caused by: {}", cause);
            }
            e.downcast_ref::<MigrationError>()
                .map(MigrationError::exit_code)
                .unwrap_or(ExitCode::FAILURE)
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.connection.to_config()?;
    let api = HttpTestOps::new(&config)
        .with_context(|| format!("cannot create client for {}", config.base_url()))?;
    let run = RunContext::new(&config)?;
    let ctx = run.log();
    let command = cli.command.name();

    log::info!(
        "{} COMMAND_START command={} endpoint={} threads={}",
        ctx,
        command,
        config.base_url(),
        config.thread_count
    );
    let clock = Instant::now();
    let reports = cli
        .command
        .execute(&api, &run)
        .with_context(|| format!("{} failed", command))?;

    let errors: usize = reports.iter().map(|r| r.errors).sum();
    let total: usize = reports.iter().map(|r| r.total).sum();
    log::info!(
        "{} COMMAND_COMPLETE command={} phases={} tasks={} errors={} elapsed={:?}",
        ctx,
        command,
        reports.len(),
        total,
        errors,
        clock.elapsed()
    );
    Ok(())
}
