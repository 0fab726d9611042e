//! Browser profile directories.
//!
//! Without a configured `user_data_dir` every launch gets a fresh temporary
//! profile, removed when the process is gone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::utils::path::normalize_path;

/// Development prefs written to a Firefox profile's `user.js`.
const FIREFOX_PREFS: &[(&str, &str)] = &[
    ("xpinstall.signatures.required", "false"),
    ("extensions.autoDisableScopes", "0"),
    ("extensions.enabledScopes", "15"),
    ("extensions.startupScanScopes", "15"),
    ("devtools.chrome.enabled", "true"),
    ("browser.shell.checkDefaultBrowser", "false"),
    ("datareporting.policy.dataSubmissionEnabled", "false"),
];

/// Profile directory owned by one browser process.
#[derive(Debug)]
pub enum Profile {
    /// Removed on drop
    Ephemeral(TempDir),
    /// User-supplied, kept
    Persistent(PathBuf),
}

impl Profile {
    /// Use `user_data_dir` (created if missing) or a new temporary directory.
    pub fn prepare(user_data_dir: Option<&Path>) -> io::Result<Self> {
        match user_data_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Self::Persistent(normalize_path(dir)))
            }
            None => tempfile::Builder::new()
                .prefix("webext-dev-profile-")
                .tempdir()
                .map(Self::Ephemeral),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Ephemeral(dir) => dir.path(),
            Self::Persistent(path) => path,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral(_))
    }
}

/// Install an unpacked extension into a Firefox profile.
///
/// Writes a proxy file `extensions/<gecko id>` holding the extension's
/// absolute path, and merges development prefs into `user.js`.
pub fn install_firefox_extension(profile: &Path, gecko_id: &str, extension_dir: &Path) -> io::Result<()> {
    let extensions = profile.join("extensions");
    fs::create_dir_all(&extensions)?;
    let target = normalize_path(extension_dir);
    fs::write(extensions.join(gecko_id), target.to_string_lossy().as_bytes())?;

    let user_js = profile.join("user.js");
    let existing = fs::read_to_string(&user_js).unwrap_or_default();
    let mut content = existing.clone();
    for (key, value) in FIREFOX_PREFS {
        if existing.contains(&format!("\"{key}\"")) {
            continue;
        }
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&format!("user_pref(\"{key}\", {value});\n"));
    }
    if content != existing {
        fs::write(&user_js, content)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ephemeral_profile_removed_on_drop() {
        let profile = Profile::prepare(None).unwrap();
        let path = profile.path().to_path_buf();
        assert!(profile.is_ephemeral());
        assert!(path.is_dir());

        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn test_persistent_profile_kept() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("profile");
        let profile = Profile::prepare(Some(&dir)).unwrap();
        assert!(!profile.is_ephemeral());

        drop(profile);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_firefox_install_is_repeatable() {
        let profile = tempfile::tempdir().unwrap();
        let extension = tempfile::tempdir().unwrap();

        install_firefox_extension(profile.path(), "demo@example.com", extension.path()).unwrap();
        install_firefox_extension(profile.path(), "demo@example.com", extension.path()).unwrap();

        let proxy = fs::read_to_string(profile.path().join("extensions/demo@example.com")).unwrap();
        assert_eq!(proxy, normalize_path(extension.path()).to_string_lossy());

        let prefs = fs::read_to_string(profile.path().join("user.js")).unwrap();
        assert_eq!(prefs.matches("xpinstall.signatures.required").count(), 1);
        assert!(prefs.contains("user_pref(\"extensions.autoDisableScopes\", 0);"));
    }
}
