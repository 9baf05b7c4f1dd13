use regex::RegexSet;

use crate::error::{Error, Result};

/// Comment patterns that belong to other tools and must never be moved.
/// Matched case-insensitively anywhere in the comment text, `#` included.
pub const DEFAULT_DIRECTIVE_PATTERNS: &[&str] = &[
    r"#\s*noqa",            // flake8, ruff
    r"#\s*type:\s*ignore",  // mypy, pyright
    r"#\s*pragma:",         // coverage
    r"#\s*pylint:",
    r"#\s*pyright:",
    r"#\s*mypy:",
    r"#\s*flake8:",
    r"#\s*ruff:",
    r"#\s*bandit:",
    r"#\s*nosec",           // bandit
    r"#\s*isort:",
    r"#\s*fmt:",            // black
];

/// Tests comment text against the directive blacklist.
///
/// This is a static list, not a parser. An unknown directive on a bracket-only
/// line will be moved, and an ordinary comment that happens to contain one of
/// the patterns will stay where it is.
#[derive(Debug, Clone)]
pub struct DirectiveClassifier {
    patterns: RegexSet,
}

impl DirectiveClassifier {
    /// The default blacklist plus any extra patterns from configuration.
    pub fn new<S: AsRef<str>>(extra_patterns: &[S]) -> Result<Self> {
        let patterns: Vec<String> = DEFAULT_DIRECTIVE_PATTERNS
            .iter()
            .copied()
            .chain(extra_patterns.iter().map(AsRef::as_ref))
            .map(|pattern| format!("(?i){pattern}"))
            .collect();

        let patterns = RegexSet::new(&patterns)
            .map_err(|e| Error::Config(format!("invalid directive pattern: {e}")))?;

        Ok(Self { patterns })
    }

    pub fn is_directive(&self, comment_text: &str) -> bool {
        self.patterns.is_match(comment_text)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.patterns.len()
    }
}

impl Default for DirectiveClassifier {
    fn default() -> Self {
        Self::new::<&str>(&[]).expect("default directive patterns are valid")
    }
}
