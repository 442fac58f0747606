// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Classification of compiler diagnostics

/// Stderr lines OpenSCAD emits in sandboxed builds that never indicate failure
pub const BENIGN_STDERR: &[&str] = &[
    "Could not initialize localization.",
    "Fontconfig error:",
    "Can't get font",
];

/// Case-insensitive keywords that mark remaining stderr as fatal
pub const FATAL_KEYWORDS: &[&str] = &["error", "failed", "exception", "fatal"];

/// Filters captured stderr and decides whether it reports a failure
#[derive(Debug, Clone)]
pub struct StderrFilter {
    benign: Vec<String>,
}

impl Default for StderrFilter {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl StderrFilter {
    /// Built-in benign substrings plus `extra`
    pub fn new(extra: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut benign: Vec<String> = BENIGN_STDERR.iter().map(|s| s.to_string()).collect();
        benign.extend(extra.into_iter().map(Into::into));
        Self { benign }
    }

    pub fn is_benign(&self, line: &str) -> bool {
        self.benign.iter().any(|s| line.contains(s.as_str()))
    }

    /// Non-empty stderr lines with benign notices removed, trimmed
    pub fn significant<'a>(&'a self, stderr: &'a [String]) -> impl Iterator<Item = &'a str> + 'a {
        stderr
            .iter()
            .flat_map(|chunk| chunk.lines())
            .filter(move |line| !self.is_benign(line))
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }

    /// Whether anything left after filtering matches a fatal keyword
    pub fn is_fatal(&self, stderr: &[String]) -> bool {
        self.significant(stderr).any(|line| {
            let lower = line.to_lowercase();
            FATAL_KEYWORDS.iter().any(|k| lower.contains(k))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_localization_notice_is_not_fatal() {
        let filter = StderrFilter::default();
        let stderr = lines(&["Could not initialize localization."]);
        assert!(!filter.is_fatal(&stderr));
        assert_eq!(filter.significant(&stderr).count(), 0);
    }

    #[test]
    fn test_fontconfig_error_is_benign() {
        let filter = StderrFilter::default();
        let stderr = lines(&["Fontconfig error: Cannot load default config file"]);
        assert!(!filter.is_fatal(&stderr));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let filter = StderrFilter::default();
        for line in ["ERROR: Parser error in line 3", "Rendering FAILED", "Uncaught Exception", "fatal: out of memory"] {
            assert!(filter.is_fatal(&lines(&[line])), "{line}");
        }
    }

    #[test]
    fn test_benign_line_does_not_mask_other_lines() {
        let filter = StderrFilter::default();
        let stderr = lines(&["Could not initialize localization.", "ERROR: Assertion failed"]);
        assert!(filter.is_fatal(&stderr));
        assert_eq!(
            filter.significant(&stderr).collect::<Vec<_>>(),
            vec!["ERROR: Assertion failed"]
        );
    }

    #[test]
    fn test_multiline_chunks_are_split() {
        let filter = StderrFilter::default();
        let stderr = lines(&["WARNING: Ignoring unknown variable 'x'\n\n  Can't get font Arial  "]);
        assert_eq!(
            filter.significant(&stderr).collect::<Vec<_>>(),
            vec!["WARNING: Ignoring unknown variable 'x'"]
        );
    }

    #[test]
    fn test_extra_benign_substrings() {
        let filter = StderrFilter::new(["WARNING: failed to set locale"]);
        assert!(!filter.is_fatal(&lines(&["WARNING: failed to set locale"])));
    }
}
