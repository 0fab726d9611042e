//! Launch plans: executable discovery and command-line construction.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::LaunchError;

/// Browser family to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BrowserTarget {
    #[default]
    Chrome,
    Chromium,
    Edge,
    Firefox,
}

impl BrowserTarget {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Chromium => "chromium",
            Self::Edge => "edge",
            Self::Firefox => "firefox",
        }
    }

    pub fn is_gecko(self) -> bool {
        matches!(self, Self::Firefox)
    }

    /// Executable names looked up on `PATH`.
    fn path_candidates(self) -> &'static [&'static str] {
        match self {
            Self::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            Self::Chromium => &["chromium", "chromium-browser"],
            Self::Edge => &["microsoft-edge", "microsoft-edge-stable", "msedge"],
            Self::Firefox => &["firefox", "firefox-developer-edition"],
        }
    }

    /// Well-known install locations outside `PATH`.
    fn install_candidates(self) -> &'static [&'static str] {
        match self {
            Self::Chrome => &[
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            ],
            Self::Chromium => &["/Applications/Chromium.app/Contents/MacOS/Chromium"],
            Self::Edge => &[
                "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
                r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
            ],
            Self::Firefox => &[
                "/Applications/Firefox.app/Contents/MacOS/firefox",
                "/Applications/Firefox Developer Edition.app/Contents/MacOS/firefox",
                r"C:\Program Files\Mozilla Firefox\firefox.exe",
            ],
        }
    }
}

impl fmt::Display for BrowserTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pick the executable for `target`.
///
/// An explicit path is used as-is so that a bad path surfaces as the OS
/// spawn error.
pub fn resolve_executable(target: BrowserTarget, explicit: Option<&Path>) -> Result<PathBuf, LaunchError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    target
        .path_candidates()
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| {
            target
                .install_candidates()
                .iter()
                .map(PathBuf::from)
                .find(|p| p.is_file())
        })
        .ok_or_else(|| LaunchError::ExecutableNotFound {
            target,
            candidates: target
                .path_candidates()
                .iter()
                .chain(target.install_candidates())
                .map(|s| (*s).to_string())
                .collect(),
        })
}

/// Reject flags that cannot be passed through verbatim.
pub fn validate_flags(flags: &[String]) -> Result<(), LaunchError> {
    for flag in flags {
        let reason = if flag.trim().is_empty() {
            "empty"
        } else if flag.contains('\0') {
            "contains NUL"
        } else if flag.contains('\n') || flag.contains('\r') {
            "contains a line break"
        } else {
            continue;
        };
        return Err(LaunchError::InvalidFlag {
            flag: flag.clone(),
            reason,
        });
    }
    Ok(())
}

/// Inputs of a browser command line.
#[derive(Debug, Clone, Copy)]
pub struct LaunchArgs<'a> {
    pub target: BrowserTarget,
    pub profile: &'a Path,
    pub extension_dir: &'a Path,
    pub manager_dir: Option<&'a Path>,
    pub flags: &'a [String],
    pub starting_url: Option<&'a str>,
}

impl LaunchArgs<'_> {
    /// Build the argument list, user flags after ours, URL last.
    pub fn build(&self) -> Vec<OsString> {
        let mut args = if self.target.is_gecko() {
            self.gecko_args()
        } else {
            self.chromium_args()
        };
        args.extend(self.flags.iter().map(OsString::from));
        if let Some(url) = self.starting_url {
            args.push(url.into());
        }
        args
    }

    fn chromium_args(&self) -> Vec<OsString> {
        let mut user_data = OsString::from("--user-data-dir=");
        user_data.push(self.profile);

        let mut load = OsString::from("--load-extension=");
        load.push(self.extension_dir);
        if let Some(manager) = self.manager_dir {
            load.push(",");
            load.push(manager);
        }

        vec![
            user_data,
            load,
            "--no-first-run".into(),
            "--no-default-browser-check".into(),
            "--disable-features=DisableLoadExtensionCommandLineSwitch".into(),
        ]
    }

    fn gecko_args(&self) -> Vec<OsString> {
        vec![
            "-profile".into(),
            self.profile.into(),
            "-no-remote".into(),
            "-new-instance".into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_chrome_args_with_manager() {
        let flags = vec!["--auto-open-devtools-for-tabs".to_string()];
        let args = LaunchArgs {
            target: BrowserTarget::Chrome,
            profile: Path::new("/tmp/profile"),
            extension_dir: Path::new("/work/dist"),
            manager_dir: Some(Path::new("/work/manager")),
            flags: &flags,
            starting_url: Some("https://example.com"),
        };

        assert_eq!(
            strings(args.build()),
            vec![
                "--user-data-dir=/tmp/profile",
                "--load-extension=/work/dist,/work/manager",
                "--no-first-run",
                "--no-default-browser-check",
                "--disable-features=DisableLoadExtensionCommandLineSwitch",
                "--auto-open-devtools-for-tabs",
                "https://example.com",
            ]
        );
    }

    #[test]
    fn test_firefox_args() {
        let args = LaunchArgs {
            target: BrowserTarget::Firefox,
            profile: Path::new("/tmp/ff"),
            extension_dir: Path::new("/work/dist"),
            manager_dir: None,
            flags: &[],
            starting_url: None,
        };
        assert_eq!(
            strings(args.build()),
            vec!["-profile", "/tmp/ff", "-no-remote", "-new-instance"]
        );
    }

    #[test]
    fn test_flag_validation() {
        assert!(validate_flags(&["--incognito".into()]).is_ok());
        for bad in ["", "  ", "--a\0b", "--a\nb"] {
            let err = validate_flags(&[bad.to_string()]).unwrap_err();
            assert!(matches!(err, LaunchError::InvalidFlag { .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_explicit_executable_is_not_checked() {
        let path = Path::new("/definitely/not/here/chrome");
        assert_eq!(
            resolve_executable(BrowserTarget::Chrome, Some(path)).unwrap(),
            path
        );
    }

    #[test]
    fn test_target_parsing() {
        let target: BrowserTarget = serde_json::from_str("\"edge\"").unwrap();
        assert_eq!(target, BrowserTarget::Edge);
        assert_eq!(BrowserTarget::default(), BrowserTarget::Chrome);
    }
}
