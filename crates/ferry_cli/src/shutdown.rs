use std::sync::atomic::{AtomicBool, Ordering};

use console::Term;

/// Global shutdown flag for graceful termination.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if shutdown has been requested.
#[inline]
pub(crate) fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Acquire)
}

#[inline]
fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Release);
}

/// Set up the Ctrl+C handler for graceful shutdown.
///
/// The first Ctrl+C cancels the running import at its next checkpoint; the
/// second exits immediately.
pub(crate) fn setup_shutdown_handler() {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Failed to install Ctrl+C handler");
            return;
        }

        let is_tty = Term::stdout().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, stopping after the current batch...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, stopping after the current batch");
        }

        request_shutdown();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if is_tty {
            eprintln!("Force quit!");
        }
        std::process::exit(130);
    });
}
