use anyhow::{Context, Result};
use glob::glob;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Error;

const SKIPPED_DIRS: &[&str] = &["__pycache__", "node_modules", "venv", "site-packages"];

#[derive(Debug, Default)]
pub struct FileHandler;

impl FileHandler {
    pub fn new() -> Self {
        Self
    }

    /// Expand command-line paths into the list of files to process.
    ///
    /// Explicit files are taken as given, directories are walked for Python
    /// sources, and anything containing glob metacharacters is expanded.
    /// Duplicates are dropped, first occurrence wins.
    pub fn find_python_files(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_dir() {
                self.find_py_files_in_dir(path, &mut files)?;
            } else if is_glob_pattern(path) {
                let pattern = path.to_str().context("Invalid path")?;
                for entry in glob(pattern).context("Failed to read glob pattern")? {
                    let file = entry.context("Failed to process glob entry")?;
                    if file.is_file() && self.is_python_file(&file) {
                        files.push(file);
                    }
                }
            } else {
                files.push(path.clone());
            }
        }

        let mut seen = HashSet::new();
        files.retain(|file| seen.insert(file.clone()));
        Ok(files)
    }

    fn find_py_files_in_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<_>>()
            .context("Failed to read directory entry")?;
        entries.sort();

        for path in entries {
            if path.is_dir() {
                // Skip hidden directories (.git, .venv, .tox) and tool output
                if let Some(name) = path.file_name() {
                    let name_str = name.to_string_lossy();
                    if !name_str.starts_with('.') && !SKIPPED_DIRS.contains(&name_str.as_ref()) {
                        self.find_py_files_in_dir(&path, files)?;
                    }
                }
            } else if self.is_python_file(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    fn is_python_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext, "py" | "pyi"))
            .unwrap_or(false)
    }

    pub fn read_file(&self, path: &Path) -> crate::error::Result<Vec<u8>> {
        fs::read(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace the file contents atomically.
    ///
    /// The new bytes go to a temporary file next to the target, which then
    /// takes over the original permissions and is renamed over it. A failure
    /// at any step leaves the original untouched.
    pub fn write_file(&self, path: &Path, content: &[u8]) -> crate::error::Result<()> {
        let write_error = |source: std::io::Error| Error::Write {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = fs::metadata(path).map_err(write_error)?.permissions();

        let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
        temp.write_all(content).map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;
        fs::set_permissions(temp.path(), permissions).map_err(write_error)?;
        temp.persist(path).map_err(|e| write_error(e.error))?;

        debug!(path = %path.display(), bytes = content.len(), "wrote file");
        Ok(())
    }
}

fn is_glob_pattern(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|s| s.contains(['*', '?', '[']))
}

/// Files without a single `#` byte cannot hold a comment and are not worth
/// decoding.
pub fn may_contain_comments(content: &[u8]) -> bool {
    memchr::memchr(b'#', content).is_some()
}
