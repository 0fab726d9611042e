//! `adapt` command: inject the reload agent once.
//!
//! Useful to package a development build that connects to a session started
//! later, or to inspect what `dev` writes (`--dry`).

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::DevConfig;
use crate::log;
use crate::manifest::package::{SelfWrites, write_patch};
use crate::manifest::{ManifestAdapter, ManifestPatch};
use crate::reload::server::endpoint_url;

/// Adapt the configured extension; print instead of writing when `dry`.
pub fn run_adapt(config: &DevConfig, dry: bool) -> Result<()> {
    let endpoint = endpoint_url(config.reload.addr());
    let extension_dir = config.extension_dir();

    let patch = ManifestAdapter::new(&endpoint)
        .adapt_files(&config.manifest_path(), &extension_dir)
        .context("Failed to adapt manifest")?;

    if dry {
        print!("{}", render(&patch));
        return Ok(());
    }

    let written = write_patch(&extension_dir, &patch, &SelfWrites::new())
        .with_context(|| format!("Failed to write into {}", extension_dir.display()))?;
    report(&written, &endpoint);
    Ok(())
}

fn report(written: &[PathBuf], endpoint: &str) {
    if written.is_empty() {
        log!("adapt"; "already up to date");
        return;
    }
    for path in written {
        log!("adapt"; "wrote {}", path.display());
    }
    log!("adapt"; "agent connects to {}", endpoint);
}

/// Both adapted files, each under a comment header.
fn render(patch: &ManifestPatch) -> String {
    format!(
        "// manifest.json\n{}\n// {}\n{}",
        patch.manifest, patch.background_path, patch.background_source
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, DevConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("manifest.json"),
            r#"{"manifest_version":2,"background":{"scripts":["bg.js"]}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("bg.js"), "init();\n").unwrap();

        let mut config = DevConfig::default();
        config.extension.path = Some(dir.path().to_path_buf());
        config.reload.port = 9100;
        (dir, config)
    }

    #[test]
    fn test_adapt_writes_patch() {
        let (dir, config) = fixture();
        run_adapt(&config, false).unwrap();

        let bg = fs::read_to_string(dir.path().join("bg.js")).unwrap();
        assert!(bg.contains("ws://127.0.0.1:9100"));
        assert!(bg.ends_with("init();\n"));
        let manifest = fs::read_to_string(dir.path().join("manifest.json")).unwrap();
        assert!(manifest.contains("\"tabs\""));
    }

    #[test]
    fn test_dry_run_leaves_files() {
        let (dir, config) = fixture();
        run_adapt(&config, true).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("bg.js")).unwrap(), "init();\n");
    }

    #[test]
    fn test_render_headers() {
        let patch = ManifestAdapter::new("ws://127.0.0.1:8002")
            .adapt(r#"{"manifest_version":3}"#, "")
            .unwrap();
        let text = render(&patch);
        assert!(text.starts_with("// manifest.json\n{"));
        assert!(text.contains("// webext-dev-agent.js\n// <webext-dev:reload-agent>"));
    }
}
