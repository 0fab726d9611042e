//! `dev` command: run one development session.

use anyhow::{Context, Result};

use crate::actor::{Session, SessionSummary};
use crate::config::DevConfig;
use crate::core::is_shutdown;
use crate::log;
use crate::utils::plural::plural_count;

/// Run a session on a fresh runtime until it ends.
///
/// Fatal session errors are returned so the process exits non-zero.
pub fn run_dev(config: &DevConfig) -> Result<()> {
    let session = config.session_config();
    log!(
        "dev";
        "{} in {}",
        session.browser.target,
        session.extension_dir.display()
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let summary = rt.block_on(Session::new(session).run())?;
    if is_shutdown() {
        crate::debug!("dev"; "session stopped by Ctrl+C");
    }
    log!("dev"; "{}", describe(&summary));
    Ok(())
}

fn describe(summary: &SessionSummary) -> String {
    let mut out = format!(
        "session ended after {} ({} hot, {} full)",
        plural_count(summary.batches, "build"),
        summary.hot_updates,
        summary.full_reloads
    );
    if summary.browser_restarts > 0 {
        out.push_str(&format!(
            ", {}",
            plural_count(summary.browser_restarts as usize, "browser restart")
        ));
    }
    out
}
