//! Manifest adaptation.
//!
//! Rewrites the extension manifest and its background entry so the built
//! extension can talk to the reload channel:
//!
//! - `tabs` is granted, so hot updates can reach content scripts
//! - a background entry exists (one is created when the manifest has none)
//! - the background entry starts with the reload agent, delimited by markers
//!
//! Adaptation is a pure text transform and idempotent: adapting an already
//! adapted pair yields byte-identical output. Writing the result to disk is
//! [`package::write_patch`]'s job.

mod error;
mod layout;
pub mod package;

pub use error::AdaptationError;
pub use layout::ManifestLayout;

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::embed::agent::{AgentVars, RELOAD_AGENT_JS};

/// Background file created when the manifest declares none.
pub const AGENT_FILE: &str = "webext-dev-agent.js";

/// Permission required to forward hot updates to tabs.
const TABS_PERMISSION: &str = "tabs";

const BEGIN_MARKER: &str = "// <webext-dev:reload-agent>\n";
const END_MARKER: &str = "// </webext-dev:reload-agent>\n";

/// Result of adapting a manifest and its background entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestPatch {
    /// Adapted manifest, pretty JSON with a trailing newline
    pub manifest: String,
    /// Background entry path, relative to the extension root
    pub background_path: String,
    /// Background entry source with the agent block in front
    pub background_source: String,
    /// Layout of the adapted manifest
    pub layout: ManifestLayout,
}

/// Injects the reload agent for one channel endpoint.
#[derive(Debug, Clone)]
pub struct ManifestAdapter {
    agent: String,
}

impl ManifestAdapter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let agent = RELOAD_AGENT_JS.render(&AgentVars {
            endpoint: endpoint.into(),
        });
        Self { agent }
    }

    /// Adapt manifest text and the current source of its background entry.
    ///
    /// `background` is ignored when the manifest declares no background
    /// entry; the agent then lives alone in [`AGENT_FILE`].
    pub fn adapt(&self, manifest: &str, background: &str) -> Result<ManifestPatch, AdaptationError> {
        let mut doc: Value = serde_json::from_str(manifest).map_err(AdaptationError::Parse)?;
        let root = doc.as_object_mut().ok_or(AdaptationError::NotAnObject)?;

        let version = manifest_version(root)?;
        ensure_permission(root, TABS_PERMISSION)?;
        let (background_path, created) = ensure_background(root, version)?;

        let original = if created { "" } else { background };
        let background_source = self.inject(&background_path, original)?;

        let mut manifest = serde_json::to_string_pretty(&doc).map_err(AdaptationError::Parse)?;
        manifest.push('\n');

        Ok(ManifestPatch {
            manifest,
            background_path,
            background_source,
            layout: ManifestLayout::from_manifest(&doc),
        })
    }

    /// Read `manifest_path` and the background entry under `extension_dir`,
    /// then adapt them.
    ///
    /// A background entry named by the manifest but absent from disk is
    /// treated as empty.
    pub fn adapt_files(
        &self,
        manifest_path: &Path,
        extension_dir: &Path,
    ) -> Result<ManifestPatch, AdaptationError> {
        let manifest = fs::read_to_string(manifest_path)
            .map_err(|e| AdaptationError::Io(manifest_path.to_path_buf(), e))?;

        let background = match ManifestLayout::from_json(&manifest)
            .as_ref()
            .and_then(ManifestLayout::background_entry)
        {
            Some(entry) => {
                let path = extension_dir.join(entry);
                match fs::read_to_string(&path) {
                    Ok(source) => source,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                    Err(e) => return Err(AdaptationError::Io(path, e)),
                }
            }
            None => String::new(),
        };

        self.adapt(&manifest, &background)
    }

    /// Replace any existing agent block in `source` and put a fresh one first.
    fn inject(&self, path: &str, source: &str) -> Result<String, AdaptationError> {
        let rest = strip_agent_block(source)
            .ok_or_else(|| AdaptationError::UnterminatedAgentBlock(path.to_string()))?;

        let mut out = String::with_capacity(
            BEGIN_MARKER.len() + self.agent.len() + END_MARKER.len() + rest.len() + 1,
        );
        out.push_str(BEGIN_MARKER);
        out.push_str(&self.agent);
        if !self.agent.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(END_MARKER);
        out.push_str(&rest);
        Ok(out)
    }
}

// =============================================================================
// Manifest fields
// =============================================================================

fn manifest_version(root: &Map<String, Value>) -> Result<u8, AdaptationError> {
    match root.get("manifest_version") {
        None | Some(Value::Null) => Err(AdaptationError::MissingManifestVersion),
        Some(Value::Number(n)) if n.as_u64() == Some(2) => Ok(2),
        Some(Value::Number(n)) if n.as_u64() == Some(3) => Ok(3),
        Some(other) => Err(AdaptationError::UnsupportedManifestVersion(other.to_string())),
    }
}

fn ensure_permission(root: &mut Map<String, Value>, permission: &str) -> Result<(), AdaptationError> {
    let permissions = root
        .entry("permissions")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| AdaptationError::malformed("permissions", "expected an array"))?;

    if !permissions.iter().any(|p| p.as_str() == Some(permission)) {
        permissions.push(Value::String(permission.to_string()));
    }
    Ok(())
}

/// Resolve the background entry, creating one if absent.
///
/// Returns the entry path and whether it was created.
fn ensure_background(root: &mut Map<String, Value>, version: u8) -> Result<(String, bool), AdaptationError> {
    let background = root
        .entry("background")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| AdaptationError::malformed("background", "expected an object"))?;

    if let Some(worker) = background.get("service_worker") {
        let worker = worker
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AdaptationError::malformed("background.service_worker", "expected a path"))?;
        return Ok((layout::clean(worker), false));
    }

    if let Some(scripts) = background.get_mut("scripts") {
        let scripts = scripts
            .as_array_mut()
            .ok_or_else(|| AdaptationError::malformed("background.scripts", "expected an array"))?;
        return match scripts.first() {
            Some(Value::String(first)) if !first.is_empty() => Ok((layout::clean(first), false)),
            Some(_) => Err(AdaptationError::malformed(
                "background.scripts",
                "expected an array of paths",
            )),
            None => {
                scripts.push(Value::String(AGENT_FILE.to_string()));
                Ok((AGENT_FILE.to_string(), true))
            }
        };
    }

    if background.contains_key("page") {
        return Err(AdaptationError::malformed(
            "background.page",
            "background pages are not supported, use scripts or service_worker",
        ));
    }

    if version == 3 {
        background.insert("service_worker".into(), Value::String(AGENT_FILE.to_string()));
    } else {
        background.insert(
            "scripts".into(),
            Value::Array(vec![Value::String(AGENT_FILE.to_string())]),
        );
    }
    Ok((AGENT_FILE.to_string(), true))
}

// =============================================================================
// Agent block
// =============================================================================

/// Remove a leading or embedded agent block.
///
/// `None` if a begin marker has no matching end marker.
fn strip_agent_block(source: &str) -> Option<String> {
    let Some(begin) = source.find(BEGIN_MARKER) else {
        return Some(source.to_string());
    };
    let after_begin = begin + BEGIN_MARKER.len();
    let end = source[after_begin..].find(END_MARKER)? + after_begin + END_MARKER.len();

    let mut rest = String::with_capacity(source.len() - (end - begin));
    rest.push_str(&source[..begin]);
    rest.push_str(&source[end..]);
    Some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ENDPOINT: &str = "ws://127.0.0.1:8002";

    fn adapter() -> ManifestAdapter {
        ManifestAdapter::new(ENDPOINT)
    }

    fn parse(patch: &ManifestPatch) -> Value {
        serde_json::from_str(&patch.manifest).unwrap()
    }

    #[test]
    fn test_mv3_with_service_worker() {
        let manifest = json!({
            "manifest_version": 3,
            "name": "demo",
            "permissions": ["storage"],
            "background": { "service_worker": "sw.js" }
        })
        .to_string();
        let patch = adapter().adapt(&manifest, "console.log('sw');\n").unwrap();

        let doc = parse(&patch);
        assert_eq!(doc["permissions"], json!(["storage", "tabs"]));
        assert_eq!(patch.background_path, "sw.js");
        assert!(patch.background_source.starts_with(BEGIN_MARKER));
        assert!(patch.background_source.ends_with("console.log('sw');\n"));
        assert!(patch.background_source.contains(ENDPOINT));
        assert!(patch.manifest.ends_with('\n'));
        assert_eq!(patch.layout.service_worker.as_deref(), Some("sw.js"));
    }

    #[test]
    fn test_key_order_is_preserved() {
        let manifest = r#"{"name":"demo","version":"1.0","manifest_version":3}"#;
        let patch = adapter().adapt(manifest, "").unwrap();
        let name = patch.manifest.find("\"name\"").unwrap();
        let version = patch.manifest.find("\"version\"").unwrap();
        let mv = patch.manifest.find("\"manifest_version\"").unwrap();
        assert!(name < version && version < mv);
    }

    #[test]
    fn test_adaptation_is_idempotent() {
        let manifest = json!({
            "manifest_version": 2,
            "name": "demo",
            "background": { "scripts": ["bg.js", "lib.js"] }
        })
        .to_string();
        let first = adapter().adapt(&manifest, "chrome.runtime.id;\n").unwrap();
        let second = adapter()
            .adapt(&first.manifest, &first.background_source)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.background_source.matches(BEGIN_MARKER).count(), 1);
        assert_eq!(parse(&second)["permissions"], json!(["tabs"]));
    }

    #[test]
    fn test_endpoint_change_replaces_agent() {
        let manifest = r#"{"manifest_version":3,"background":{"service_worker":"sw.js"}}"#;
        let first = adapter().adapt(manifest, "main();\n").unwrap();
        let moved = ManifestAdapter::new("ws://127.0.0.1:9000")
            .adapt(&first.manifest, &first.background_source)
            .unwrap();

        assert!(moved.background_source.contains("ws://127.0.0.1:9000"));
        assert!(!moved.background_source.contains(ENDPOINT));
        assert!(moved.background_source.ends_with("main();\n"));
    }

    #[test]
    fn test_missing_background_is_created() {
        let mv3 = adapter().adapt(r#"{"manifest_version":3}"#, "ignored").unwrap();
        assert_eq!(mv3.background_path, AGENT_FILE);
        assert_eq!(parse(&mv3)["background"], json!({ "service_worker": AGENT_FILE }));
        assert!(!mv3.background_source.contains("ignored"));

        let mv2 = adapter().adapt(r#"{"manifest_version":2}"#, "").unwrap();
        assert_eq!(parse(&mv2)["background"], json!({ "scripts": [AGENT_FILE] }));
    }

    #[test]
    fn test_missing_manifest_version_fails() {
        let err = adapter().adapt(r#"{"name":"demo"}"#, "").unwrap_err();
        assert!(matches!(err, AdaptationError::MissingManifestVersion));
    }

    #[test]
    fn test_invalid_manifests_fail() {
        let cases = [
            ("{", "not valid JSON"),
            ("[]", "JSON object"),
            (r#"{"manifest_version":4}"#, "unsupported"),
            (r#"{"manifest_version":"3"}"#, "unsupported"),
            (r#"{"manifest_version":3,"permissions":"tabs"}"#, "permissions"),
            (r#"{"manifest_version":3,"background":"sw.js"}"#, "background"),
            (r#"{"manifest_version":2,"background":{"page":"bg.html"}}"#, "background.page"),
            (r#"{"manifest_version":2,"background":{"scripts":[1]}}"#, "background.scripts"),
        ];
        for (manifest, needle) in cases {
            let err = adapter().adapt(manifest, "").unwrap_err();
            assert!(err.to_string().contains(needle), "{manifest}: {err}");
        }
    }

    #[test]
    fn test_unterminated_block_fails() {
        let manifest = r#"{"manifest_version":3,"background":{"service_worker":"sw.js"}}"#;
        let source = format!("{BEGIN_MARKER}half an agent\n");
        let err = adapter().adapt(manifest, &source).unwrap_err();
        assert!(matches!(err, AdaptationError::UnterminatedAgentBlock(p) if p == "sw.js"));
    }

    #[test]
    fn test_strip_keeps_surrounding_code() {
        let source = format!("a();\n{BEGIN_MARKER}old\n{END_MARKER}b();\n");
        assert_eq!(strip_agent_block(&source).unwrap(), "a();\nb();\n");
    }

    #[test]
    fn test_adapt_files_reads_background_from_extension_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("manifest.json");
        fs::write(
            &manifest_path,
            r#"{"manifest_version":3,"background":{"service_worker":"sw.js"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("sw.js"), "boot();\n").unwrap();

        let patch = adapter().adapt_files(&manifest_path, dir.path()).unwrap();
        assert!(patch.background_source.ends_with("boot();\n"));

        let err = adapter()
            .adapt_files(&dir.path().join("missing.json"), dir.path())
            .unwrap_err();
        assert!(matches!(err, AdaptationError::Io(..)));
    }
}
