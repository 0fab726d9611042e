use std::path::PathBuf;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

/// Keeps the output directory watched across `rm -rf dist` style rebuilds.
///
/// Responsibility:
/// - Attach the root at startup if it exists
/// - Re-attach it after it was removed and recreated
pub(super) struct WatchRoot {
    path: PathBuf,
    attached: bool,
}

impl WatchRoot {
    pub(super) fn new(path: PathBuf) -> Self {
        Self {
            path,
            attached: false,
        }
    }

    pub(super) fn attach(&mut self, watcher: &mut RecommendedWatcher) -> notify::Result<()> {
        if self.path.exists() {
            watcher.watch(&self.path, RecursiveMode::Recursive)?;
            self.attached = true;
        }
        Ok(())
    }

    pub(super) fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        if self.attached && !self.path.exists() {
            // Stale handle, the directory was removed
            let _ = watcher.unwatch(&self.path);
            self.attached = false;
            crate::debug!("watch"; "output directory removed: {}", self.path.display());
        }
        if !self.attached && self.path.exists() && watcher.watch(&self.path, RecursiveMode::Recursive).is_ok() {
            self.attached = true;
            crate::debug!("watch"; "re-attached watch: {}", self.path.display());
        }
    }
}
