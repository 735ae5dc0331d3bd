//! Implementation of the `seqspeak lock` commands.

use crate::cli::LockClearArgs;
use seqspeak::config::Config;
use seqspeak::error::Result;
use seqspeak::locks::{GlobalLock, LockInfo};

/// Execute the `seqspeak lock status` command.
pub fn cmd_lock_status(config: &Config) -> Result<()> {
    let lock = GlobalLock::from_config(config);

    let Some(info) = lock.inspect() else {
        println!("Unlocked ({})", lock.dir().display());
        if !config.sequential {
            println!("Note: sequential execution is disabled in the current configuration.");
        }
        return Ok(());
    };

    println!("Global lock:");
    print_details(&info);

    if info.staleness.is_stale() {
        println!();
        println!("Note: the lock is stale. Use `seqspeak lock clear` to clear it.");
    }

    Ok(())
}

/// Execute the `seqspeak lock clear` command.
pub fn cmd_lock_clear(config: &Config, args: LockClearArgs) -> Result<()> {
    let lock = GlobalLock::from_config(config);
    let cleared = lock.clear(args.force)?;

    println!("Cleared lock: {}", cleared.path.display());
    println!();
    println!("Lock details:");
    print_details(&cleared);

    Ok(())
}

fn print_details(info: &LockInfo) {
    match &info.record {
        Some(record) => {
            println!("  PID:        {}", record.pid);
            println!("  Host:       {}", record.hostname);
            println!(
                "  Started:    {}",
                record.start_time.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Age:        {}", record.age_string());
        }
        None => println!("  Record:     missing or unreadable"),
    }
    println!("  Verdict:    {}", info.staleness);
    if info.staleness.is_stale() {
        println!("  Status:     STALE");
    }
    println!("  Path:       {}", info.path.display());
}
