use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const MISPLACED: &str = "result = func(\n    arg\n)  # explains the call\n";
const FIXED: &str = "result = func(\n    arg  # explains the call\n)\n";

fn fix_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fix-misplaced-comments"));
    cmd.arg("--no-color").env_remove("MISPLACED_COMMENTS_LOG");
    cmd
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_check_mode_reports_and_fails() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "mod.py", MISPLACED);

    fix_cmd()
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains(format!(
            "{}:3: STYLE-001: Comment on line 3 should not be on closing bracket line",
            file.display()
        )))
        .stdout(predicate::str::contains("Found 1 misplaced comment(s)"));

    assert_eq!(fs::read_to_string(&file).unwrap(), MISPLACED);
}

#[test]
fn test_fix_mode_rewrites_and_fails() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "mod.py", MISPLACED);

    fix_cmd()
        .arg("--fix")
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains(format!("Fixed: {}", file.display())));

    assert_eq!(fs::read_to_string(&file).unwrap(), FIXED);

    // A second run has nothing left to do
    fix_cmd().arg("--fix").arg(&file).assert().success();
}

#[test]
fn test_clean_files_succeed_silently() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "mod.py", FIXED);

    fix_cmd()
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_no_paths_is_success() {
    fix_cmd().assert().success();
}

#[test]
fn test_directory_walk_skips_hidden_and_virtualenvs() {
    let temp_dir = TempDir::new().unwrap();
    let app = write(temp_dir.path(), "pkg/app.py", MISPLACED);
    let venv = write(temp_dir.path(), ".venv/lib/dep.py", MISPLACED);
    let notes = write(temp_dir.path(), "pkg/notes.txt", MISPLACED);

    fix_cmd()
        .arg("--fix")
        .arg(temp_dir.path())
        .assert()
        .code(1);

    assert_eq!(fs::read_to_string(app).unwrap(), FIXED);
    assert_eq!(fs::read_to_string(venv).unwrap(), MISPLACED);
    assert_eq!(fs::read_to_string(notes).unwrap(), MISPLACED);
}

#[test]
fn test_syntax_error_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let broken = write(
        temp_dir.path(),
        "broken.py",
        "def broken(\n    arg\n  # Missing closing paren\n",
    );
    let clean = write(temp_dir.path(), "clean.py", FIXED);

    fix_cmd()
        .arg("--fix")
        .arg(&broken)
        .arg(&clean)
        .assert()
        .success()
        .stderr(predicate::str::contains("skipping file"));

    assert_eq!(
        fs::read_to_string(broken).unwrap(),
        "def broken(\n    arg\n  # Missing closing paren\n"
    );
}

#[test]
fn test_line_length_flag() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "mod.py", MISPLACED);

    fix_cmd()
        .args(["--fix", "--line-length", "20"])
        .arg(&file)
        .assert()
        .code(1);

    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "result = func(\n    # explains the call\n    arg\n)\n"
    );
}

#[test]
fn test_extra_directive_flag() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "mod.py", "x = f(\n    1,\n)  # keep: pinned\n");

    fix_cmd()
        .args(["--extra-directive", r"#\s*keep:"])
        .arg(&file)
        .assert()
        .success();
}

#[test]
fn test_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = write(
        temp_dir.path(),
        "comments.toml",
        "line-length = 20\nextra-directives = ['#\\s*keep:']\n",
    );
    let file = write(
        temp_dir.path(),
        "mod.py",
        "x = f(\n    1,\n)  # keep: pinned\ny = g(\n    2,\n)  # a long enough note\n",
    );

    fix_cmd()
        .arg("--fix")
        .arg("--config")
        .arg(&config)
        .arg(&file)
        .assert()
        .code(1);

    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "x = f(\n    1,\n)  # keep: pinned\ny = g(\n    # a long enough note\n    2,\n)\n"
    );
}

#[test]
fn test_config_errors_exit_with_two() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(temp_dir.path(), "mod.py", MISPLACED);
    let config = write(temp_dir.path(), "comments.toml", "max-width = 100\n");

    fix_cmd()
        .arg("--config")
        .arg(&config)
        .arg(&file)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config error"));

    fix_cmd()
        .args(["--extra-directive", "#(unclosed"])
        .arg(&file)
        .assert()
        .code(2);

    fix_cmd()
        .args(["--line-length", "0"])
        .arg(&file)
        .assert()
        .code(2);

    fix_cmd()
        .args(["--line-length", "wide"])
        .arg(&file)
        .assert()
        .code(2);
}
