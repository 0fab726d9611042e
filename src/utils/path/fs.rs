//! Path normalization utilities.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `resolve_against` - user-supplied paths relative to a base directory

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Resolve a user-supplied path against `base`.
///
/// `~` is expanded first; relative results are joined onto `base`. Always
/// returns an absolute path.
///
/// # Example
/// ```ignore
/// // `path = "dist"` in /work/ext/webext.toml
/// resolve_against(Path::new("dist"), Path::new("/work/ext")); // /work/ext/dist
/// ```
pub fn resolve_against(path: &Path, base: &Path) -> PathBuf {
    let expanded = match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    };
    if expanded.is_absolute() {
        normalize_path(&expanded)
    } else {
        normalize_path(&base.join(expanded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_absolute() {
        let path = Path::new("/absolute/path/file.txt");
        let normalized = normalize_path(path);
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_normalize_path_relative() {
        let path = Path::new("relative/path/file.txt");
        let normalized = normalize_path(path);
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_resolve_against_base() {
        let resolved = resolve_against(Path::new("missing/dist"), Path::new("/fallback"));
        assert_eq!(resolved, PathBuf::from("/fallback/missing/dist"));

        let resolved = resolve_against(Path::new("/abs/missing"), Path::new("/fallback"));
        assert_eq!(resolved, PathBuf::from("/abs/missing"));
    }

    #[test]
    fn test_resolve_against_expands_tilde() {
        let resolved = resolve_against(Path::new("~/webext-dev-missing"), Path::new("/fallback"));
        assert!(!resolved.starts_with("/fallback"));
        assert!(resolved.ends_with("webext-dev-missing"));
    }
}
