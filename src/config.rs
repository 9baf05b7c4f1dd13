use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::directive::DirectiveClassifier;
use crate::error::{Error, Result};

/// Inline placement budget, the usual formatter line length.
pub const DEFAULT_LINE_LENGTH: usize = 88;

/// Optional TOML configuration file.
///
/// ```toml
/// line-length = 100
/// extra-directives = ['#\s*keep']
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub line_length: Option<usize>,
    #[serde(default)]
    pub extra_directives: Vec<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Immutable run settings shared by every file task.
#[derive(Debug, Clone)]
pub struct Settings {
    pub line_length: usize,
    pub directives: DirectiveClassifier,
}

impl Settings {
    pub fn new<S: AsRef<str>>(line_length: usize, extra_directives: &[S]) -> Result<Self> {
        if line_length == 0 {
            return Err(Error::Config(
                "line-length must be a positive number".to_string(),
            ));
        }
        Ok(Self {
            line_length,
            directives: DirectiveClassifier::new(extra_directives)?,
        })
    }

    /// Merge the config file with command-line values. Flags win over the file
    /// for the line length; extra directives from both are combined.
    pub fn resolve(
        file: Option<ConfigFile>,
        line_length: Option<usize>,
        extra_directives: &[String],
    ) -> Result<Self> {
        let file = file.unwrap_or_default();
        let line_length = line_length
            .or(file.line_length)
            .unwrap_or(DEFAULT_LINE_LENGTH);
        let directives: Vec<&str> = file
            .extra_directives
            .iter()
            .chain(extra_directives)
            .map(String::as_str)
            .collect();
        Self::new(line_length, &directives)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            line_length: DEFAULT_LINE_LENGTH,
            directives: DirectiveClassifier::default(),
        }
    }
}
