//! Browser launch errors.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::BrowserTarget;

/// The browser could not be brought to `running`, or stopped running.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("invalid browser flag {flag:?}: {reason}")]
    InvalidFlag { flag: String, reason: &'static str },

    #[error("no {target} executable found (tried {})", .candidates.join(", "))]
    ExecutableNotFound {
        target: BrowserTarget,
        candidates: Vec<String>,
    },

    #[error("cannot prepare browser profile `{}`", .path.display())]
    Profile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has no gecko id (`browser_specific_settings.gecko.id`), required for Firefox", .0.display())]
    MissingGeckoId(PathBuf),

    #[error("failed to spawn `{}`", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("browser exited during startup ({status})")]
    EarlyExit { status: String },

    #[error("browser not ready within {}ms", .0.as_millis())]
    StartupTimeout(Duration),

    #[error("browser crashed ({status})")]
    Crashed { status: String },

    #[error("browser crashed {0} times, giving up")]
    RestartLimit(u32),
}
