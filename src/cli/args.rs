//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::actor::browser::BrowserTarget;

/// Reload coordinator for browser extension development
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: webext.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = "webext.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a development session: adapt, serve the reload channel, launch the browser
    #[command(visible_alias = "d")]
    Dev {
        #[command(flatten)]
        ext: ExtensionArgs,

        #[command(flatten)]
        args: DevArgs,
    },

    /// Inject the reload agent into the extension once
    #[command(visible_alias = "a")]
    Adapt {
        #[command(flatten)]
        ext: ExtensionArgs,

        /// Reload channel port the agent connects to
        #[arg(short, long)]
        port: Option<u16>,

        /// Print the adapted files instead of writing them
        #[arg(long)]
        dry: bool,
    },
}

/// Where the extension lives.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ExtensionArgs {
    /// Source manifest (default: <extension>/manifest.json)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub manifest: Option<PathBuf>,

    /// Unpacked extension directory (build output)
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub extension: Option<PathBuf>,
}

/// Build event source for `dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceArg {
    /// Watch the extension directory
    #[default]
    Watch,
    /// Read NDJSON build events from stdin
    Stdin,
}

/// `dev` command arguments; each overrides `webext.toml`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DevArgs {
    /// Reload channel port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Browser to launch
    #[arg(short, long, value_enum)]
    pub browser: Option<BrowserTarget>,

    /// Browser executable (default: discovered on PATH)
    #[arg(long, value_hint = clap::ValueHint::ExecutablePath)]
    pub executable: Option<PathBuf>,

    /// Extra browser flag, repeatable
    #[arg(short = 'f', long = "flag", value_name = "FLAG", allow_hyphen_values = true)]
    pub flags: Vec<String>,

    /// Persistent browser profile (default: temporary)
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub user_data_dir: Option<PathBuf>,

    /// Page opened at startup
    #[arg(short = 'u', long, value_hint = clap::ValueHint::Url)]
    pub starting_url: Option<String>,

    /// Inject the reload agent and serve the reload channel
    #[arg(short = 'r', long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub auto_reload: Option<bool>,

    /// Print a summary per change batch
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub stats: Option<bool>,

    /// Where build events come from
    #[arg(long, value_enum)]
    pub source: Option<SourceArg>,
}

#[allow(unused)]
impl Cli {
    pub const fn is_dev(&self) -> bool {
        matches!(self.command, Commands::Dev { .. })
    }
    pub const fn is_adapt(&self) -> bool {
        matches!(self.command, Commands::Adapt { .. })
    }

    /// Extension location arguments of the current command.
    pub fn extension_args(&self) -> &ExtensionArgs {
        match &self.command {
            Commands::Dev { ext, .. } | Commands::Adapt { ext, .. } => ext,
        }
    }
}
