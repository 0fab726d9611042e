//! `[extension]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [extension]
//! path = "dist"                     # Unpacked extension (build output)
//! manifest = "dist/manifest.json"   # Source manifest, default <path>/manifest.json
//! manager = "vendor/manager"        # Optional manager extension
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::FieldPath;

/// Extension location settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionConfig {
    /// Unpacked extension directory.
    pub path: Option<PathBuf>,

    /// Manifest adapted on every session start.
    pub manifest: Option<PathBuf>,

    /// Manager extension loaded next to the one under development.
    pub manager: Option<PathBuf>,
}

impl ExtensionConfig {
    pub const PATH: FieldPath = FieldPath::new("extension.path");
    pub const MANIFEST: FieldPath = FieldPath::new("extension.manifest");
    pub const MANAGER: FieldPath = FieldPath::new("extension.manager");

    /// Manifest path, falling back to `<path>/manifest.json`.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.manifest
            .clone()
            .or_else(|| self.path.as_ref().map(|p| p.join("manifest.json")))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::path::PathBuf;

    #[test]
    fn test_manifest_defaults_into_extension_dir() {
        let config = test_parse_config("[extension]\npath = \"dist\"");
        assert_eq!(
            config.extension.manifest_path(),
            Some(PathBuf::from("dist/manifest.json"))
        );
        assert!(config.extension.manager.is_none());
    }

    #[test]
    fn test_explicit_manifest() {
        let config =
            test_parse_config("[extension]\npath = \"dist\"\nmanifest = \"src/manifest.json\"");
        assert_eq!(
            config.extension.manifest_path(),
            Some(PathBuf::from("src/manifest.json"))
        );
    }
}
