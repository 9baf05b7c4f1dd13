use std::path::PathBuf;

/// Errors raised while modeling, planning or writing a single file, plus
/// startup configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The text could not be tokenized as Python source.
    #[error("syntax error at {line}:{column}: {message}")]
    SourceSyntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// The bytes could not be decoded with the detected or declared encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Reading the file failed.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the fixed file back failed. The original file is left as it was.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid line length, malformed directive pattern, unreadable config file.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Error::SourceSyntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Per-file errors that mean "leave this file alone" rather than "this run failed".
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Error::SourceSyntax { .. } | Error::Encoding(_) | Error::Read { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// No misplaced comments anywhere
    Success = 0,
    /// Misplaced comments were found or fixed, or a write failed
    ViolationsFound = 1,
    /// Bad flags or config file
    ConfigError = 2,
    /// Anything else
    InternalError = 3,
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) => ExitCode::ConfigError,
            Error::Write { .. } => ExitCode::ViolationsFound,
            Error::SourceSyntax { .. } | Error::Encoding(_) | Error::Read { .. } => {
                ExitCode::InternalError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_config_error() {
        let err = Error::Config("line-length must be positive".to_string());
        assert_eq!(ExitCode::from(&err), ExitCode::ConfigError);
        assert_eq!(ExitCode::ConfigError as i32, 2);
    }

    #[test]
    fn test_skippable_errors() {
        assert!(Error::syntax(3, 4, "unterminated string").is_skippable());
        assert!(Error::Encoding("unknown encoding: cp999".to_string()).is_skippable());
        assert!(!Error::Config("bad".to_string()).is_skippable());
        let write = Error::Write {
            path: PathBuf::from("a.py"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!write.is_skippable());
    }

    #[test]
    fn test_syntax_error_display() {
        let err = Error::syntax(12, 0, "unclosed '(' at end of file");
        assert_eq!(
            err.to_string(),
            "syntax error at 12:0: unclosed '(' at end of file"
        );
    }
}
