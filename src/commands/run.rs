//! Implementation of the `seqspeak run` command.
//!
//! Runs one external command under the coordinator. Interrupts and the
//! optional timeout are turned into registry cancellations, exactly as a
//! cancellation notification from a client would be.

use crate::cli::RunArgs;
use seqspeak::cancel::{
    CancellationRegistry, Outcome, generate_correlation_id, race, sanitize_correlation_id,
};
use seqspeak::config::Config;
use seqspeak::coordinator::Coordinator;
use seqspeak::error::{Result, SeqError};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Execute the `seqspeak run` command.
pub async fn cmd_run(config: &Config, args: RunArgs) -> Result<()> {
    let (program, program_args) = args
        .program
        .split_first()
        .ok_or_else(|| SeqError::UserError("no program given to run".to_string()))?;

    let id = match &args.id {
        Some(id) => sanitize_correlation_id(id),
        None => generate_correlation_id("run"),
    };
    let coordinator = Coordinator::from_config(config);
    let watcher = spawn_cancel_sources(
        Arc::clone(coordinator.registry()),
        id.clone(),
        args.timeout.map(Duration::from_secs),
    );

    let outcome = coordinator
        .run(&id, |token| run_child(program, program_args, token))
        .await;

    watcher.abort();
    coordinator.shutdown();

    match outcome? {
        Outcome::Completed(status) if status.success() => Ok(()),
        Outcome::Completed(status) => Err(SeqError::Operation(format!(
            "'{}' exited with {}",
            program, status
        ))),
        Outcome::Cancelled => Err(SeqError::Cancelled),
    }
}

/// Spawn the child and wait for it, killing it as soon as `token` fires.
async fn run_child(
    program: &str,
    args: &[String],
    token: CancellationToken,
) -> Result<ExitStatus> {
    let mut child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SeqError::UserError(format!("failed to start '{}': {}", program, e)))?;
    debug!(program, pid = ?child.id(), "child started");

    match race(&token, child.wait(), || {}).await {
        Outcome::Completed(status) => status
            .map_err(|e| SeqError::Operation(format!("failed to wait for '{}': {}", program, e))),
        Outcome::Cancelled => {
            // Stop output now rather than letting the child finish its sentence.
            match child.kill().await {
                Ok(()) => debug!(program, "child stopped after cancellation"),
                Err(e) => warn!(program, error = %e, "failed to kill child"),
            }
            Err(SeqError::Cancelled)
        }
    }
}

/// Cancel `id` through the registry on Ctrl-C or when `timeout` elapses.
fn spawn_cancel_sources(
    registry: Arc<CancellationRegistry>,
    id: String,
    timeout: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reason = match timeout {
            Some(limit) => tokio::select! {
                () = interrupted() => "interrupted",
                () = tokio::time::sleep(limit) => "timed out",
            },
            None => {
                interrupted().await;
                "interrupted"
            }
        };
        info!(correlation_id = %id, reason, "cancelling run");

        // The run may not have registered yet. This task is aborted once it ends.
        while !registry.cancel(&id, reason) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for interrupts");
        std::future::pending::<()>().await;
    }
}
