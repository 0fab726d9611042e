//! Change descriptors delivered by the build pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a changed build output.
///
/// Serialized as camelCase labels (`serviceWorker`, `declarativeRule`).
/// Labels this version does not know are kept as `Other` instead of being
/// rejected, so newer pipelines still classify (as a full reload).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeKind {
    Script,
    Stylesheet,
    Markup,
    Asset,
    Manifest,
    Locale,
    DeclarativeRule,
    ServiceWorker,
    Other(String),
}

impl ChangeKind {
    /// Wire label for this kind.
    pub fn label(&self) -> &str {
        match self {
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
            Self::Markup => "markup",
            Self::Asset => "asset",
            Self::Manifest => "manifest",
            Self::Locale => "locale",
            Self::DeclarativeRule => "declarativeRule",
            Self::ServiceWorker => "serviceWorker",
            Self::Other(name) => name,
        }
    }

    /// Kinds the extension platform only reads at install/reload time.
    pub fn requires_full_reload(&self) -> bool {
        !self.is_hot_updatable()
    }

    /// Kinds that can be patched into a running extension context.
    pub fn is_hot_updatable(&self) -> bool {
        matches!(
            self,
            Self::Script | Self::Stylesheet | Self::Markup | Self::Asset
        )
    }
}

impl From<String> for ChangeKind {
    fn from(label: String) -> Self {
        match label.as_str() {
            "script" => Self::Script,
            "stylesheet" => Self::Stylesheet,
            "markup" => Self::Markup,
            "asset" => Self::Asset,
            "manifest" => Self::Manifest,
            "locale" => Self::Locale,
            "declarativeRule" => Self::DeclarativeRule,
            "serviceWorker" => Self::ServiceWorker,
            _ => Self::Other(label),
        }
    }
}

impl From<ChangeKind> for String {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Other(name) => name,
            known => known.label().to_string(),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One changed build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Bundler mode of a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// Check if this is development mode.
    #[inline]
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Payload of the per-compilation callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEvent {
    pub mode: BuildMode,
    pub changed_files: Vec<ChangeEvent>,
}

impl BuildEvent {
    pub fn development(changed_files: Vec<ChangeEvent>) -> Self {
        Self {
            mode: BuildMode::Development,
            changed_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_roundtrip_through_serde() {
        let json = r#"{"path":"sw.js","kind":"serviceWorker"}"#;
        let event: ChangeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, ChangeKind::ServiceWorker);
        assert_eq!(serde_json::to_string(&event).unwrap(), json);
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let event: ChangeEvent =
            serde_json::from_str(r#"{"path":"menus.json","kind":"contextMenu"}"#).unwrap();
        assert_eq!(event.kind, ChangeKind::Other("contextMenu".into()));
        assert_eq!(event.kind.label(), "contextMenu");
        assert!(event.kind.requires_full_reload());
    }

    #[test]
    fn test_build_event_wire_shape() {
        let json = r#"{"mode":"development","changedFiles":[{"path":"a.css","kind":"stylesheet"}]}"#;
        let event: BuildEvent = serde_json::from_str(json).unwrap();
        assert!(event.mode.is_dev());
        assert_eq!(event.changed_files.len(), 1);
        assert_eq!(event.changed_files[0].kind, ChangeKind::Stylesheet);
    }
}
