//! Reload decisions.

use serde::{Deserialize, Serialize};

use super::ChangeEvent;

/// What the running extension should do about a change batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReloadAction {
    /// Patch changed assets into running contexts
    HotUpdate { targets: Vec<ChangeEvent> },
    /// Tear down and restart the whole extension
    FullReload { reason: String },
    /// Nothing to do
    Ignore,
}

impl ReloadAction {
    pub fn full_reload(reason: impl Into<String>) -> Self {
        Self::FullReload {
            reason: reason.into(),
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HotUpdate { .. } => "hot-update",
            Self::FullReload { .. } => "full-reload",
            Self::Ignore => "ignore",
        }
    }

    #[inline]
    pub fn is_ignore(&self) -> bool {
        matches!(self, Self::Ignore)
    }

    #[inline]
    pub fn is_full_reload(&self) -> bool {
        matches!(self, Self::FullReload { .. })
    }
}
