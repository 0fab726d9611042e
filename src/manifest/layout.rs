//! Manifest-declared file roles.
//!
//! Read leniently: layout extraction never fails, it only reports what the
//! manifest declares. Validation belongs to the adapter.

use serde_json::Value;

/// Files the manifest gives a special role.
///
/// Paths are relative to the extension root with `/` separators and no
/// leading `./`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestLayout {
    pub manifest_version: u8,
    /// MV3 `background.service_worker`
    pub service_worker: Option<String>,
    /// `background.scripts` (MV2, Firefox MV3)
    pub background_scripts: Vec<String>,
    /// `declarative_net_request.rule_resources[].path`
    pub rule_resources: Vec<String>,
    /// `browser_specific_settings.gecko.id` (or MV2 `applications.gecko.id`)
    pub gecko_id: Option<String>,
}

impl ManifestLayout {
    /// Extract the layout from a parsed manifest.
    pub fn from_manifest(manifest: &Value) -> Self {
        let manifest_version = manifest
            .get("manifest_version")
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok())
            .unwrap_or(0);

        let background = manifest.get("background");
        let service_worker = background
            .and_then(|b| b.get("service_worker"))
            .and_then(Value::as_str)
            .map(clean);
        let background_scripts = background
            .and_then(|b| b.get("scripts"))
            .and_then(Value::as_array)
            .map(|scripts| scripts.iter().filter_map(Value::as_str).map(clean).collect())
            .unwrap_or_default();

        let rule_resources = manifest
            .get("declarative_net_request")
            .and_then(|d| d.get("rule_resources"))
            .and_then(Value::as_array)
            .map(|rules| {
                rules
                    .iter()
                    .filter_map(|r| r.get("path").and_then(Value::as_str))
                    .map(clean)
                    .collect()
            })
            .unwrap_or_default();

        let gecko_id = ["browser_specific_settings", "applications"]
            .iter()
            .find_map(|key| {
                manifest
                    .get(*key)
                    .and_then(|s| s.get("gecko"))
                    .and_then(|g| g.get("id"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string);

        Self {
            manifest_version,
            service_worker,
            background_scripts,
            rule_resources,
            gecko_id,
        }
    }

    /// Parse manifest text and extract the layout, `None` if unparsable.
    pub fn from_json(text: &str) -> Option<Self> {
        serde_json::from_str::<Value>(text)
            .ok()
            .map(|v| Self::from_manifest(&v))
    }

    /// The file the reload agent lives in.
    pub fn background_entry(&self) -> Option<&str> {
        self.service_worker
            .as_deref()
            .or_else(|| self.background_scripts.first().map(String::as_str))
    }

    /// Whether `path` is a background entry file.
    pub fn is_background_entry(&self, path: &str) -> bool {
        let path = clean(path);
        self.service_worker.as_deref() == Some(path.as_str())
            || self.background_scripts.iter().any(|s| *s == path)
    }
}

/// Normalize a manifest-relative path.
pub(super) fn clean(path: &str) -> String {
    path.trim_start_matches("./")
        .trim_start_matches('/')
        .replace('\\', "/")
}
