//! Command-line interface module.

pub mod adapt;
mod args;
pub mod dev;

pub use args::{Cli, Commands, DevArgs, ExtensionArgs, SourceArg};
