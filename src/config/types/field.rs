//! Config field path.

use std::fmt;

/// Dotted path of a config field, e.g. `reload.port`.
///
/// Sections expose their paths as associated constants:
///
/// ```ignore
/// diag.error(ReloadConfig::PORT, "must not be 0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath(&'static str);

impl FieldPath {
    pub const fn new(path: &'static str) -> Self {
        Self(path)
    }

    #[cfg(test)]
    pub const fn as_str(self) -> &'static str {
        self.0
    }

    /// `[section]` table the field lives in.
    pub fn section(self) -> &'static str {
        self.0.split_once('.').map_or(self.0, |(section, _)| section)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section() {
        assert_eq!(FieldPath::new("reload.port").section(), "reload");
        assert_eq!(FieldPath::new("extension").section(), "extension");
    }
}
