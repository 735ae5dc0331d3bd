//! Command implementations for seqspeak.
//!
//! This module resolves configuration from the global flags and routes CLI
//! commands to their implementations.

mod lock;
mod run;

use crate::cli::{Cli, Command, LockAction, LockCommand};
use seqspeak::config::Config;
use seqspeak::error::Result;
use tracing::debug;

/// Dispatch a command to its implementation.
pub async fn dispatch(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    debug!(?config, "resolved configuration");

    match cli.command {
        Command::Run(args) => run::cmd_run(&config, args).await,
        Command::Lock(lock_cmd) => dispatch_lock(&config, lock_cmd),
    }
}

/// Dispatch lock subcommands.
fn dispatch_lock(config: &Config, lock_cmd: LockCommand) -> Result<()> {
    match lock_cmd.action {
        LockAction::Status => lock::cmd_lock_status(config),
        LockAction::Clear(args) => lock::cmd_lock_clear(config, args),
    }
}

/// File, then environment, then flags.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::resolve(cli.config.as_deref())?;

    if cli.no_sequential {
        config.sequential = false;
    }
    if let Some(dir) = &cli.lock_dir {
        config.lock_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}
