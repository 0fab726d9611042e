//! Pluralization utilities.

/// Return "s" suffix for plural counts
///
/// - `plural_s(0)` -> `"s"` (0 agents)
/// - `plural_s(1)` -> `""` (1 agent)
#[inline]
pub fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Format count with noun, handling pluralization
///
/// - `plural_count(1, "file")` -> `"1 file"`
/// - `plural_count(3, "file")` -> `"3 files"`
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    format!("{} {}{}", count, noun, plural_s(count))
}
