//! Change Classification
//!
//! Pure functions for turning changed build outputs into reload decisions.
//! No Actor machinery, no side effects.

use std::path::Path;

use crate::core::{ChangeEvent, ChangeKind, ReloadAction};
use crate::manifest::ManifestLayout;

// =============================================================================
// Classification
// =============================================================================

/// Classify a change batch into a single reload action.
///
/// First matching rule wins:
/// 1. any kind the platform only reads at install time (or an unknown kind)
///    forces a full reload, with the first such kind as reason
/// 2. otherwise every hot-updatable event becomes a target, in input order
/// 3. otherwise nothing to do
///
/// Callers always pass a non-empty batch; an empty one yields `Ignore`.
pub fn classify(changes: &[ChangeEvent]) -> ReloadAction {
    if let Some(first) = changes.iter().find(|c| c.kind.requires_full_reload()) {
        return ReloadAction::full_reload(first.kind.label());
    }

    let targets: Vec<ChangeEvent> = changes
        .iter()
        .filter(|c| c.kind.is_hot_updatable())
        .cloned()
        .collect();

    if targets.is_empty() {
        ReloadAction::Ignore
    } else {
        ReloadAction::HotUpdate { targets }
    }
}

// =============================================================================
// Path categorization (output watcher)
// =============================================================================

/// Categorize an output file by its path relative to the extension root.
///
/// `relative` uses `/` separators. Manifest-declared roles (service worker,
/// rule resources) take precedence over the file extension.
pub fn categorize_path(relative: &str, layout: &ManifestLayout) -> ChangeKind {
    let relative = relative.trim_start_matches("./");

    if relative == "manifest.json" {
        return ChangeKind::Manifest;
    }
    if relative.starts_with("_locales/") {
        return ChangeKind::Locale;
    }
    if layout.rule_resources.iter().any(|r| r == relative) {
        return ChangeKind::DeclarativeRule;
    }
    if layout.service_worker.as_deref() == Some(relative) {
        return ChangeKind::ServiceWorker;
    }

    let ext = Path::new(relative)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => ChangeKind::Script,
        "css" | "scss" | "sass" | "less" => ChangeKind::Stylesheet,
        "html" | "htm" => ChangeKind::Markup,
        _ => ChangeKind::Asset,
    }
}

/// Check whether a batch invalidates the adapted manifest or background entry.
pub fn touches_adaptation(changes: &[ChangeEvent], layout: &ManifestLayout) -> bool {
    changes.iter().any(|c| {
        matches!(c.kind, ChangeKind::Manifest | ChangeKind::ServiceWorker)
            || layout.is_background_entry(&c.path)
    })
}

// =============================================================================
// Tests
// =============================================================================
