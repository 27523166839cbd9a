//! Log output setup

use tracing::Level;

/// Install a `fmt` subscriber at `DEBUG` (verbose) or `INFO` level
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
