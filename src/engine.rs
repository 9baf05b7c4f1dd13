//! Per-file driver: scan closing brackets, classify their comments, plan and
//! apply relocations, or report them.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Settings;
use crate::encoding::{self, LineEnding};
use crate::error::{Error, Result};
use crate::file_handler::{self, FileHandler};
use crate::lexer::{self, Token};
use crate::line_shape::LineTable;
use crate::planner::{Planner, RelocationPlan};
use crate::rewriter;

pub const RULE_ID: &str = "STYLE-001";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Check,
    Fix,
}

/// Lifecycle of one file. `Skipped` is terminal for files that cannot be
/// modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Scanning,
    Classifying,
    Planning,
    Fixing,
    Reporting,
    Done,
    Skipped,
}

/// A comment sitting on a line that holds nothing but closing brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub message: String,
}

impl Violation {
    fn new(path: &Path, line: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            line,
            message: format!("Comment on line {line} should not be on closing bracket line"),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.path.display(),
            self.line,
            RULE_ID,
            self.message
        )
    }
}

/// Result of scanning one source text.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub violations: Vec<Violation>,
    pub plans: Vec<RelocationPlan>,
}

/// Result of fixing one source text.
#[derive(Debug, Clone)]
pub struct FixResult {
    pub text: String,
    /// Every misplaced comment found, moved or not
    pub violations: Vec<Violation>,
    /// Misplaced comments that had no line to move to
    pub unfixed: Vec<Violation>,
}

impl FixResult {
    pub fn changed(&self) -> bool {
        self.violations.len() > self.unfixed.len()
    }
}

/// What happened to one file on disk.
#[derive(Debug)]
pub enum FileOutcome {
    Clean,
    /// Check mode, or fix mode where nothing could be moved
    Violations(Vec<Violation>),
    /// Fix mode; the file was rewritten. `unfixed` lists comments left in place.
    Fixed {
        relocated: usize,
        unfixed: Vec<Violation>,
    },
    Skipped(Error),
    Failed(Error),
}

impl FileOutcome {
    /// Whether this file makes the run exit nonzero.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileOutcome::Violations(_) | FileOutcome::Fixed { .. } | FileOutcome::Failed(_)
        )
    }
}

struct FileProcessor<'s> {
    path: &'s Path,
    settings: &'s Settings,
    state: FileState,
}

impl<'s> FileProcessor<'s> {
    fn new(path: &'s Path, settings: &'s Settings) -> Self {
        Self {
            path,
            settings,
            state: FileState::Scanning,
        }
    }

    fn transition(&mut self, next: FileState) {
        if self.state != next {
            debug!(path = %self.path.display(), from = ?self.state, to = ?next, "state");
            self.state = next;
        }
    }

    /// Walk every closing bracket and decide about the comment on its line.
    fn analyze(&mut self, tokens: &[Token<'_>], table: &LineTable<'_, '_>) -> Analysis {
        let mut seen_lines = HashSet::new();
        let mut misplaced: Vec<(usize, usize)> = Vec::new();
        let mut analysis = Analysis::default();

        for token in tokens.iter().filter(|token| token.is_closing_bracket()) {
            let line = token.start.line;
            if !seen_lines.insert(line) {
                continue;
            }

            self.transition(FileState::Classifying);
            let Some(comment) = table.comment(line) else {
                self.transition(FileState::Scanning);
                continue;
            };
            let comment_text = tokens[comment].text;
            if self.settings.directives.is_directive(comment_text) {
                debug!(line, comment = comment_text, "directive left in place");
            } else if table.is_bracket_only(line) {
                analysis.violations.push(Violation::new(self.path, line));
                misplaced.push((comment, line));
            }
            self.transition(FileState::Scanning);
        }

        if misplaced.is_empty() {
            return analysis;
        }

        self.transition(FileState::Planning);
        let mut planner = Planner::new(table, tokens, self.settings.line_length);
        for &(comment, line) in misplaced.iter().rev() {
            match planner.plan(comment, line) {
                Some(plan) => analysis.plans.push(plan),
                None => warn!(
                    path = %self.path.display(),
                    line,
                    "no code line above to move the comment to"
                ),
            }
        }
        analysis
    }
}

/// Report misplaced comments in `source` without changing anything.
pub fn check_source(source: &str, path: &Path, settings: &Settings) -> Result<Vec<Violation>> {
    let tokens = lexer::tokenize(source)?;
    let table = LineTable::new(source, &tokens);
    let mut processor = FileProcessor::new(path, settings);
    let analysis = processor.analyze(&tokens, &table);
    processor.transition(FileState::Reporting);
    processor.transition(FileState::Done);
    Ok(analysis.violations)
}

/// Move every misplaced comment in `source` that has somewhere to go.
pub fn fix_source(source: &str, path: &Path, settings: &Settings) -> Result<FixResult> {
    let tokens = lexer::tokenize(source)?;
    let table = LineTable::new(source, &tokens);
    let mut processor = FileProcessor::new(path, settings);
    let Analysis { violations, plans } = processor.analyze(&tokens, &table);

    let moved: HashSet<usize> = plans.iter().map(|plan| plan.origin_line).collect();
    let unfixed: Vec<Violation> = violations
        .iter()
        .filter(|violation| !moved.contains(&violation.line))
        .cloned()
        .collect();

    let text = if plans.is_empty() {
        processor.transition(FileState::Reporting);
        source.to_string()
    } else {
        processor.transition(FileState::Fixing);
        rewriter::rewrite(&tokens, &table, plans, LineEnding::detect(source))
    };
    processor.transition(FileState::Done);

    Ok(FixResult {
        text,
        violations,
        unfixed,
    })
}

/// Read, analyze and (in fix mode) rewrite one file. Never panics on bad input;
/// every per-file problem ends up in the outcome.
pub fn process_file(path: &Path, mode: Mode, settings: &Settings) -> FileOutcome {
    let handler = FileHandler::new();
    let skip = |error: Error| {
        warn!(path = %path.display(), %error, "skipping file");
        debug!(path = %path.display(), state = ?FileState::Skipped, "state");
        FileOutcome::Skipped(error)
    };

    let bytes = match handler.read_file(path) {
        Ok(bytes) => bytes,
        Err(error) => return skip(error),
    };
    if !file_handler::may_contain_comments(&bytes) {
        return FileOutcome::Clean;
    }
    let decoded = match encoding::decode(&bytes) {
        Ok(decoded) => decoded,
        Err(error) => return skip(error),
    };

    match mode {
        Mode::Check => match check_source(&decoded.text, path, settings) {
            Ok(violations) if violations.is_empty() => FileOutcome::Clean,
            Ok(violations) => FileOutcome::Violations(violations),
            Err(error) => skip(error),
        },
        Mode::Fix => {
            let fix = match fix_source(&decoded.text, path, settings) {
                Ok(fix) => fix,
                Err(error) => return skip(error),
            };
            if fix.violations.is_empty() {
                return FileOutcome::Clean;
            }
            if !fix.changed() {
                return FileOutcome::Violations(fix.unfixed);
            }

            let written = decoded
                .encode(&fix.text)
                .and_then(|bytes| handler.write_file(path, &bytes));
            match written {
                Ok(()) => FileOutcome::Fixed {
                    relocated: fix.violations.len() - fix.unfixed.len(),
                    unfixed: fix.unfixed,
                },
                Err(error) => FileOutcome::Failed(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn fix(source: &str) -> String {
        fix_source(source, Path::new("test.py"), &Settings::default())
            .unwrap()
            .text
    }

    fn check(source: &str) -> Vec<usize> {
        check_source(source, Path::new("test.py"), &Settings::default())
            .unwrap()
            .into_iter()
            .map(|v| v.line)
            .collect()
    }

    #[test]
    fn test_violation_display() {
        let violation = Violation::new(Path::new("pkg/mod.py"), 3);
        assert_eq!(
            violation.to_string(),
            "pkg/mod.py:3: STYLE-001: Comment on line 3 should not be on closing bracket line"
        );
    }

    #[test]
    fn test_check_reports_bracket_only_lines() {
        let source = "foo = (\n    'bar',\n)  # wrong line\nitems = [\n    1,\n]  # also\n";
        assert_eq!(check(source), vec![3, 6]);
    }

    #[test]
    fn test_stacked_brackets_are_one_violation() {
        let source = "result = (\n    [\n        1,\n    ])  # c\n";
        assert_eq!(check(source), vec![4]);
    }

    #[test]
    fn test_directive_is_not_reported() {
        let source = "result = (\n    1,\n)  # type: ignore\n";
        assert_eq!(check(source), Vec::<usize>::new());
        assert_eq!(fix(source), source);
    }

    #[test]
    fn test_code_line_is_not_reported() {
        let source = "x = (y,) if cond else y  # note\n";
        assert_eq!(check(source), Vec::<usize>::new());
        assert_eq!(fix(source), source);
    }

    #[test]
    fn test_fix_inline() {
        assert_eq!(
            fix("result = func(\n    arg\n)  # explains the call\n"),
            "result = func(\n    arg  # explains the call\n)\n"
        );
    }

    #[test]
    fn test_fix_is_idempotent() {
        let source = concat!(
            "a = f(\n    g(\n        x\n    )  # c1\n)  # c2\n",
            "words = (\n    'test',\n)  # All synonyms are stored here to prevent duplicates\n",
        );
        let once = fix(source);
        assert_eq!(
            once,
            concat!(
                "a = f(\n    g(\n        # c1\n        x  # c2\n    )\n)\n",
                "words = (\n    'test',  # All synonyms are stored here to prevent duplicates\n)\n",
            )
        );
        assert_eq!(fix(&once), once);
        assert_eq!(check(&once), Vec::<usize>::new());
    }

    #[test]
    fn test_syntax_error_is_reported_as_error() {
        let err = check_source(
            "def broken(\n    arg\n  # Missing closing paren\n",
            Path::new("broken.py"),
            &Settings::default(),
        )
        .unwrap_err();
        assert!(err.is_skippable());
    }

    #[test]
    fn test_unfixable_violation_is_kept() {
        let result = fix_source(
            "y = 1\nx = f(\\\n)  # c\n",
            Path::new("test.py"),
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.unfixed.len(), 1);
        assert!(!result.changed());
        assert_eq!(result.text, "y = 1\nx = f(\\\n)  # c\n");
    }

    #[test]
    fn test_process_file_check_mode_leaves_file_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mod.py");
        let source = "x = (\n    1\n)  # c\n";
        fs::write(&path, source).unwrap();

        let outcome = process_file(&path, Mode::Check, &Settings::default());
        assert!(matches!(&outcome, FileOutcome::Violations(v) if v.len() == 1));
        assert!(outcome.is_failure());
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn test_process_file_fix_mode_rewrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mod.py");
        fs::write(&path, "x = (\n    1\n)  # c\n").unwrap();

        let outcome = process_file(&path, Mode::Fix, &Settings::default());
        assert!(matches!(outcome, FileOutcome::Fixed { relocated: 1, .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "x = (\n    1  # c\n)\n");

        let again = process_file(&path, Mode::Fix, &Settings::default());
        assert!(matches!(again, FileOutcome::Clean));
    }

    // The file is reached through /proc/self/fd, a directory no temp file
    // can be created in, so reading works and the atomic write cannot.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_file_write_failure_keeps_original() {
        use std::os::fd::AsRawFd;

        let temp_dir = TempDir::new().unwrap();
        let real_path = temp_dir.path().join("mod.py");
        let source = "x = (\n    1\n)  # c\n";
        fs::write(&real_path, source).unwrap();

        let handle = fs::File::open(&real_path).unwrap();
        let fd_path = PathBuf::from(format!("/proc/self/fd/{}", handle.as_raw_fd()));

        let outcome = process_file(&fd_path, Mode::Fix, &Settings::default());
        assert!(matches!(
            &outcome,
            FileOutcome::Failed(Error::Write { path, .. }) if *path == fd_path
        ));
        assert!(outcome.is_failure());
        assert_eq!(fs::read_to_string(&real_path).unwrap(), source);
        drop(handle);
    }

    #[test]
    fn test_process_file_without_comments_is_clean() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mod.py");
        // Not even valid Python, but without a '#' it is never tokenized
        fs::write(&path, "x = (\n").unwrap();

        assert!(matches!(
            process_file(&path, Mode::Check, &Settings::default()),
            FileOutcome::Clean
        ));
    }

    #[test]
    fn test_process_file_skips_syntax_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.py");
        fs::write(&path, "def broken(\n    arg\n  # Missing closing paren\n").unwrap();

        let outcome = process_file(&path, Mode::Fix, &Settings::default());
        assert!(matches!(outcome, FileOutcome::Skipped(Error::SourceSyntax { .. })));
        assert!(!outcome.is_failure());
    }
}
