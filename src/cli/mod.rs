//! CLI argument parsing for seqspeak.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Seqspeak: host-wide sequential execution for audio-producing commands.
///
/// Every `seqspeak run` on a host takes the same global lock, so commands
/// that play sound never talk over each other, even across unrelated
/// processes. A stale lock left by a crashed holder is reclaimed on its own.
#[derive(Parser, Debug)]
#[command(name = "seqspeak")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true, value_name = "FILE", env = "SEQSPEAK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip the sequential lock entirely.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub no_sequential: bool,

    /// Override the lock directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub lock_dir: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for seqspeak.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command while holding the host-wide sequential lock.
    ///
    /// Ctrl-C or the timeout cancels the run: the child is killed at once and
    /// seqspeak exits with code 130.
    Run(RunArgs),

    /// Lock management commands.
    ///
    /// Show or clear the global lock.
    Lock(LockCommand),
}

/// Arguments for the `run` command.
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Correlation id for this run (generated when omitted).
    #[arg(long)]
    pub id: Option<String>,

    /// Cancel the run after this many seconds, lock wait included.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Program to run, followed by its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub program: Vec<String>,
}

/// Lock subcommands.
#[derive(clap::Args, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// Show who holds the global lock.
    ///
    /// Prints the holder's pid, host, age, and staleness verdict.
    Status,

    /// Clear the global lock.
    ///
    /// Only stale locks are cleared unless --force is given.
    Clear(LockClearArgs),
}

/// Arguments for the `lock clear` command.
#[derive(clap::Args, Debug)]
pub struct LockClearArgs {
    /// Clear the lock even if its holder is alive.
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
