//! webext-dev - reload coordination for browser extension development.

mod actor;
mod cli;
mod config;
mod core;
mod embed;
mod logger;
mod manifest;
mod reload;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::DevConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = DevConfig::load(&cli)?;

    match &cli.command {
        Commands::Dev { .. } => cli::dev::run_dev(&config),
        Commands::Adapt { dry, .. } => cli::adapt::run_adapt(&config, *dry),
    }
}
