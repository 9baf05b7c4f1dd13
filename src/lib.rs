pub mod config;
pub mod directive;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod file_handler;
pub mod lexer;
pub mod line_shape;
pub mod planner;
pub mod rewriter;

use std::path::Path;

pub use config::Settings;
pub use engine::{check_source, fix_source, process_file, FileOutcome, Mode, Violation};
pub use error::{Error, ExitCode, Result};

/// Move comments off closing-bracket-only lines with the default settings.
///
/// This is the main entry point for programmatic use. Comments that have no
/// line to move to are left where they are.
pub fn fix_misplaced_comments(source: &str) -> Result<String> {
    let result = fix_source(source, Path::new("<string>"), &Settings::default())?;
    Ok(result.text)
}
