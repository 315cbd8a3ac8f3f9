mod cli;
mod commands;
mod observability;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use cli::{Cli, Commands};
use venvkit_core::config::ProvisionSettings;
use venvkit_env::ProvisionError;

fn main() -> ExitCode {
    observability::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            // Tool failures keep the tool's own exit code.
            let code = e
                .downcast_ref::<ProvisionError>()
                .map(ProvisionError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = ProvisionSettings::resolve(cli.command.overrides(), cli.config.as_deref())?;
    tracing::debug!(?settings, "resolved settings");

    match cli.command {
        Commands::Provision { dry_run, .. } => {
            commands::provision::cmd_provision(settings, dry_run)?;
        }
        Commands::Show { .. } => {
            commands::env::cmd_show(&settings)?;
        }
        Commands::Activate { shell, .. } => {
            commands::env::cmd_activate(&settings, shell.into())?;
        }
        Commands::Clean { dry_run, force, .. } => {
            commands::env::cmd_clean(&settings, dry_run, force)?;
        }
    }
    Ok(())
}
