use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use super::debouncer::FileChange;
use crate::core::{BuildEvent, ChangeEvent};
use crate::manifest::ManifestLayout;
use crate::manifest::package::SelfWrites;
use crate::reload::classify::categorize_path;

/// Turns debounced output-file changes into a development build event.
///
/// Pipeline: drop removals → drop directories → drop our own writes →
/// categorize relative to the extension root
pub(super) struct OutputClassifier<'a> {
    /// Normalized extension root
    pub(super) root: &'a Path,
    pub(super) self_writes: &'a SelfWrites,
}

impl OutputClassifier<'_> {
    pub(super) fn classify(&self, raw: FxHashMap<PathBuf, FileChange>) -> Option<BuildEvent> {
        let layout = self.layout();

        let mut changed: Vec<ChangeEvent> = raw
            .into_iter()
            .filter_map(|(path, change)| self.actionable(&path, change))
            .map(|relative| {
                let kind = categorize_path(&relative, &layout);
                ChangeEvent::new(relative, kind)
            })
            .collect();

        if changed.is_empty() {
            return None;
        }
        changed.sort_by(|a, b| a.path.cmp(&b.path));
        Some(BuildEvent::development(changed))
    }

    /// Relative `/`-separated path if the change should be reported.
    fn actionable(&self, path: &Path, change: FileChange) -> Option<String> {
        if change == FileChange::Removed {
            crate::debug!("watch"; "skip removed: {}", path.display());
            return None;
        }
        if !path.is_file() {
            return None;
        }
        if self.self_writes.is_self_write(path) {
            crate::debug!("watch"; "skip own write: {}", path.display());
            return None;
        }
        let relative = path.strip_prefix(self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        Some(parts.join("/"))
    }

    /// Layout of the manifest currently in the output directory.
    fn layout(&self) -> ManifestLayout {
        std::fs::read_to_string(self.root.join("manifest.json"))
            .ok()
            .and_then(|text| ManifestLayout::from_json(&text))
            .unwrap_or_default()
    }
}
