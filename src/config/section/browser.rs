//! `[browser]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [browser]
//! target = "chrome"                         # chrome | chromium | edge | firefox
//! executable = "/usr/bin/google-chrome"     # Default: discovered
//! flags = ["--auto-open-devtools-for-tabs"]
//! user_data_dir = "~/.cache/webext-dev"     # Default: temporary profile
//! starting_url = "https://example.com"
//! auto_restart = false
//! max_restarts = 3
//! restart_after_full_reloads = 0            # 0 = never
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::browser::{BrowserTarget, MAX_RESTARTS, STARTUP_TIMEOUT, STOP_GRACE};
use crate::config::FieldPath;

/// Browser launch and supervision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSectionConfig {
    pub target: BrowserTarget,

    /// Explicit executable, bypasses discovery.
    pub executable: Option<PathBuf>,

    /// Passed through after the launcher's own flags.
    pub flags: Vec<String>,

    /// Persistent profile directory.
    pub user_data_dir: Option<PathBuf>,

    pub starting_url: Option<String>,

    pub startup_timeout_ms: u64,
    pub stop_grace_ms: u64,

    /// Relaunch after a crash.
    pub auto_restart: bool,
    pub max_restarts: u32,

    /// Restart the browser after this many full reloads, 0 = never.
    pub restart_after_full_reloads: u32,
}

impl Default for BrowserSectionConfig {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            target: BrowserTarget::default(),
            executable: None,
            flags: Vec::new(),
            user_data_dir: None,
            starting_url: None,
            startup_timeout_ms: STARTUP_TIMEOUT.as_millis() as u64,
            stop_grace_ms: STOP_GRACE.as_millis() as u64,
            auto_restart: false,
            max_restarts: MAX_RESTARTS,
            restart_after_full_reloads: 0,
        }
    }
}

impl BrowserSectionConfig {
    pub const FLAGS: FieldPath = FieldPath::new("browser.flags");
    pub const STARTUP_TIMEOUT: FieldPath = FieldPath::new("browser.startup_timeout_ms");

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_browser_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.browser.target, BrowserTarget::Chrome);
        assert!(config.browser.flags.is_empty());
        assert!(!config.browser.auto_restart);
        assert_eq!(config.browser.max_restarts, MAX_RESTARTS);
        assert_eq!(config.browser.startup_timeout(), STARTUP_TIMEOUT);
        assert_eq!(config.browser.restart_after_full_reloads, 0);
    }

    #[test]
    fn test_browser_section() {
        let config = test_parse_config(
            "[browser]\ntarget = \"firefox\"\nflags = [\"--devtools\"]\nauto_restart = true\nstop_grace_ms = 500",
        );
        assert_eq!(config.browser.target, BrowserTarget::Firefox);
        assert_eq!(config.browser.flags, vec!["--devtools"]);
        assert!(config.browser.auto_restart);
        assert_eq!(config.browser.stop_grace(), Duration::from_millis(500));
    }
}
