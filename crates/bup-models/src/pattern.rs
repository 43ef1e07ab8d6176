//! Match patterns deciding which assets a route publishes.
//!
//! Patterns are written either as a bare regular expression (`\.js$`) or in
//! delimited form with trailing flags (`/\.js$/i`). The delimited form is the
//! normalized representation: it is what duplicate detection compares and
//! what the journal records.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::{ModelError, ModelResult};

/// Pattern used by a single route that does not configure `test`.
pub const DEFAULT_PATTERN: &str = r"\.(js|css)$";

/// Flags accepted after the closing delimiter.
const KNOWN_FLAGS: &str = "gimsuy";

/// A compiled route match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    flags: String,
    regex: Regex,
}

impl MatchPattern {
    /// Parse a pattern in bare or delimited form.
    pub fn parse(raw: &str) -> ModelResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ModelError::invalid_pattern(raw, "pattern is empty"));
        }

        let (source, flags) = split_delimited(raw).unwrap_or((raw, ""));
        if source.is_empty() {
            return Err(ModelError::invalid_pattern(raw, "pattern is empty"));
        }

        let regex = RegexBuilder::new(source)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()
            .map_err(|e| ModelError::invalid_pattern(raw, e.to_string()))?;

        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })
    }

    /// Pattern matching common script and style bundles.
    pub fn default_assets() -> ModelResult<Self> {
        Self::parse(DEFAULT_PATTERN)
    }

    /// The pattern body without delimiters or flags.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Normalized `/source/flags` form.
    pub fn normalized(&self) -> String {
        format!("/{}/{}", self.source, self.flags)
    }

    /// Test a path or file name against the pattern.
    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }
}

impl fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for MatchPattern {}

/// Split `/source/flags` into its parts. Returns `None` for bare patterns.
fn split_delimited(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let (source, flags) = (&rest[..close], &rest[close + 1..]);
    if flags.chars().all(|c| KNOWN_FLAGS.contains(c)) {
        Some((source, flags))
    } else {
        None
    }
}
