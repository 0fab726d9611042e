//! Process-wide shutdown state.
//!
//! The Ctrl+C handler can only be installed once per process, so the flag and
//! the notification channel live here. Sessions subscribe with
//! [`shutdown_signal`] and run their own teardown.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown notification for running sessions
static SHUTDOWN_TX: LazyLock<watch::Sender<bool>> = LazyLock::new(|| watch::channel(false).0);

/// Setup the global Ctrl+C handler. Call once at program start
///
/// A second Ctrl+C while teardown is still running exits immediately.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        crate::log!("dev"; "shutting down...");
        SHUTDOWN_TX.send_replace(true);
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Subscribe to the shutdown notification.
///
/// The receiver observes `true` once Ctrl+C has been pressed.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    SHUTDOWN_TX.subscribe()
}
