//! Diagnostic output for the `seqspeak` binary.

use tracing_subscriber::EnvFilter;

fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("warn,seqspeak=debug")
    } else {
        EnvFilter::new("warn")
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `verbose`.
///
/// Logs go to stderr; stdout belongs to command output.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose));

    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
