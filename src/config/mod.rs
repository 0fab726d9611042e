//! Session configuration management for `webext.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── browser    # [browser]
//! │   ├── extension  # [extension]
//! │   └── reload     # [reload]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # DevConfig (this file)
//! ```
//!
//! # Layering
//!
//! defaults < `webext.toml` < CLI flags, then one validation pass that
//! reports every problem. Paths from the file resolve against the file's
//! directory, paths from the CLI against the working directory.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{BrowserSectionConfig, ExtensionConfig, ReloadConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::actor::browser::{BrowserConfig, validate_flags};
use crate::actor::{SessionConfig, SourceKind};
use crate::cli::{Cli, Commands, DevArgs, ExtensionArgs, SourceArg};
use crate::log;
use crate::utils::path::resolve_against;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name.
pub const CONFIG_FILE: &str = "webext.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing webext.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevConfig {
    /// Absolute path to the config file, if one was found (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Extension location
    #[serde(default)]
    pub extension: ExtensionConfig,

    /// Reload channel settings
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Browser settings
    #[serde(default)]
    pub browser: BrowserSectionConfig,
}

impl DevConfig {
    /// Load configuration for the current command.
    ///
    /// Searches upward from cwd for the config file. A missing default
    /// `webext.toml` is fine (CLI flags alone may suffice); a missing file
    /// named with `--config` is an error.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let mut config = match find_config_file(&cwd, &cli.config) {
            Some(path) => {
                crate::debug!("dev"; "using {}", path.display());
                let mut config = Self::from_path(&path)?;
                let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
                config.resolve_paths(&root);
                config.config_path = Some(path);
                config
            }
            None if cli.config != Path::new(CONFIG_FILE) => {
                return Err(ConfigError::NotFound(cli.config.clone()).into());
            }
            None => Self::default(),
        };

        config.apply_command_options(cli, &cwd);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("in {}", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    ///
    /// No prompt: stdin may carry build events.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli, cwd: &Path) {
        match &cli.command {
            Commands::Dev { ext, args } => {
                self.apply_extension_args(ext, cwd);
                self.apply_dev_args(args, cwd);
            }
            Commands::Adapt { ext, port, .. } => {
                self.apply_extension_args(ext, cwd);
                Self::update_option(&mut self.reload.port, port.as_ref());
            }
        }
    }

    fn apply_extension_args(&mut self, args: &ExtensionArgs, cwd: &Path) {
        if let Some(path) = &args.extension {
            self.extension.path = Some(resolve_against(path, cwd));
        }
        if let Some(path) = &args.manifest {
            self.extension.manifest = Some(resolve_against(path, cwd));
        }
    }

    fn apply_dev_args(&mut self, args: &DevArgs, cwd: &Path) {
        Self::update_option(&mut self.reload.port, args.port.as_ref());
        Self::update_option(&mut self.reload.enable, args.auto_reload.as_ref());
        Self::update_option(&mut self.reload.stats, args.stats.as_ref());
        Self::update_option(&mut self.reload.source, args.source.as_ref());
        Self::update_option(&mut self.browser.target, args.browser.as_ref());

        if let Some(path) = &args.executable {
            self.browser.executable = Some(resolve_against(path, cwd));
        }
        if let Some(path) = &args.user_data_dir {
            self.browser.user_data_dir = Some(resolve_against(path, cwd));
        }
        if args.starting_url.is_some() {
            self.browser.starting_url = args.starting_url.clone();
        }
        // CLI flags replace the configured list
        if !args.flags.is_empty() {
            self.browser.flags = args.flags.clone();
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    /// Resolve paths from the config file against its directory.
    fn resolve_paths(&mut self, root: &Path) {
        for path in [
            &mut self.extension.path,
            &mut self.extension.manifest,
            &mut self.extension.manager,
            &mut self.browser.executable,
            &mut self.browser.user_data_dir,
        ]
        .into_iter()
        .flatten()
        {
            *path = resolve_against(path, root);
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        match &self.extension.path {
            None => diag.error_with_hint(
                ExtensionConfig::PATH,
                "extension directory is required",
                "set `path` in [extension] or pass --extension",
            ),
            Some(dir) if !dir.is_dir() => diag.error(
                ExtensionConfig::PATH,
                format!("`{}` is not a directory", dir.display()),
            ),
            Some(_) => {}
        }

        if let Some(manifest) = self.extension.manifest_path()
            && self.extension.path.as_ref().is_some_and(|p| p.is_dir())
            && !manifest.is_file()
        {
            diag.error(
                ExtensionConfig::MANIFEST,
                format!("manifest `{}` not found", manifest.display()),
            );
        }

        if let Some(manager) = &self.extension.manager
            && !manager.is_dir()
        {
            diag.error(
                ExtensionConfig::MANAGER,
                format!("`{}` is not a directory", manager.display()),
            );
        }

        if self.reload.enable && self.reload.port == 0 {
            diag.error_with_hint(
                ReloadConfig::PORT,
                "port 0 is not allowed",
                "the agent needs a fixed port to reconnect to",
            );
        }
        if self.reload.ack_timeout_ms == 0 {
            diag.error(ReloadConfig::ACK_TIMEOUT, "must be greater than 0");
        }
        if self.reload.handshake_timeout_ms == 0 {
            diag.error(ReloadConfig::HANDSHAKE_TIMEOUT, "must be greater than 0");
        }

        if let Err(e) = validate_flags(&self.browser.flags) {
            diag.error(BrowserSectionConfig::FLAGS, e.to_string());
        }
        if self.browser.startup_timeout_ms == 0 {
            diag.error(BrowserSectionConfig::STARTUP_TIMEOUT, "must be greater than 0");
        }

        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    // ========================================================================
    // derived settings
    // ========================================================================

    /// Extension directory; `validate` guarantees it is set.
    pub fn extension_dir(&self) -> PathBuf {
        self.extension.path.clone().unwrap_or_default()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.extension.manifest_path().unwrap_or_default()
    }

    /// Settings for one development session.
    pub fn session_config(&self) -> SessionConfig {
        let extension_dir = self.extension_dir();

        let mut browser = BrowserConfig::new(self.browser.target, extension_dir.clone());
        browser.executable = self.browser.executable.clone();
        browser.manager_dir = self.extension.manager.clone();
        browser.flags = self.browser.flags.clone();
        browser.user_data_dir = self.browser.user_data_dir.clone();
        browser.starting_url = self.browser.starting_url.clone();
        browser.startup_timeout = self.browser.startup_timeout();
        browser.stop_grace = self.browser.stop_grace();

        SessionConfig {
            manifest_path: self.manifest_path(),
            extension_dir,
            auto_reload: self.reload.enable,
            stats: self.reload.stats,
            source: match self.reload.source {
                SourceArg::Watch => SourceKind::Watch,
                SourceArg::Stdin => SourceKind::Stdin,
            },
            channel: self.reload.channel_config(),
            browser,
            auto_restart: self.browser.auto_restart,
            max_restarts: self.browser.max_restarts,
            restart_after_full_reloads: self.browser.restart_after_full_reloads,
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> DevConfig {
    let (parsed, ignored) = DevConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
