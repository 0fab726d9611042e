//! Core types - pure abstractions shared across the codebase.

mod action;
mod change;
mod state;

pub use action::ReloadAction;
pub use change::{BuildEvent, ChangeEvent, ChangeKind};
#[cfg(test)]
pub use change::BuildMode;
pub use state::{is_shutdown, setup_shutdown_handler, shutdown_signal};
