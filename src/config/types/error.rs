//! Configuration error types.

use std::fmt;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use thiserror::Error;

use super::FieldPath;

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid TOML in config file")]
    Toml(#[from] toml::de::Error),

    #[error("config file `{}` not found", .0.display())]
    NotFound(PathBuf),

    // No #[from]: a source() would print every issue twice
    #[error("{0}")]
    Diagnostics(ConfigDiagnostics),
}

/// One invalid field.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub field: FieldPath,
    pub message: String,
    pub hint: Option<String>,
}

/// Every problem found by one validation pass, in the order checked.
#[derive(Debug, Default)]
pub struct ConfigDiagnostics {
    issues: Vec<ConfigIssue>,
}

impl ConfigDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: FieldPath, message: impl Into<String>) {
        self.push(field, message.into(), None);
    }

    pub fn error_with_hint(
        &mut self,
        field: FieldPath,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.push(field, message.into(), Some(hint.into()));
    }

    fn push(&mut self, field: FieldPath, message: String, hint: Option<String>) {
        self.issues.push(ConfigIssue { field, message, hint });
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    #[cfg(test)]
    pub fn errors(&self) -> &[ConfigIssue] {
        &self.issues
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ConfigDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.len() == 1 { "error" } else { "errors" };
        write!(
            f,
            "{} ({} {noun})",
            "invalid configuration".red().bold(),
            self.len()
        )?;

        let mut section = "";
        for issue in &self.issues {
            if issue.field.section() != section {
                section = issue.field.section();
                write!(f, "\n  {}", format_args!("[{section}]").dimmed())?;
            }
            write!(f, "\n    {}: {}", issue.field.cyan(), issue.message)?;
            if let Some(hint) = &issue.hint {
                write!(f, "\n      {} {hint}", "hint:".yellow())?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigDiagnostics {}
