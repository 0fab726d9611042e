use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::utils::path::normalize_path;

pub(super) const DEBOUNCE_MS: u64 = 300;

/// What happened to an output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FileChange {
    Written,
    Removed,
}

/// Pure debouncer: only handles timing and event deduplication.
/// No classification, no global state access.
pub(super) struct Debouncer {
    /// Path → FileChange (dedup is free via HashMap key uniqueness)
    pub(super) changes: FxHashMap<PathBuf, FileChange>,
    pub(super) last_event: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
        }
    }

    /// Add a notify event; the latest state of a path wins.
    ///
    /// Bundlers commonly delete and rewrite outputs within one build, so a
    /// removal followed by a write is a write and vice versa.
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let change = match event.kind {
            EventKind::Create(_) => FileChange::Written,
            EventKind::Remove(_) => FileChange::Removed,
            EventKind::Modify(modify) => {
                // Metadata-only changes (mtime/chmod) carry no new content
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                FileChange::Written
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.changes.insert(normalize_path(path), change);
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the batch once the debounce window has passed quietly.
    pub(super) fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, FileChange>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        let changes = std::mem::take(&mut self.changes);
        (!changes.is_empty()).then_some(changes)
    }

    pub(super) fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };
        last_event.elapsed() >= Duration::from_millis(DEBOUNCE_MS) && !self.changes.is_empty()
    }

    /// Precise sleep duration until next possible ready time.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };
        Duration::from_millis(DEBOUNCE_MS)
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Check if path is a temp/backup file (editor or bundler artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
