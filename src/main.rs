use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use misplaced_comments::{
    config::{ConfigFile, Settings},
    error::ExitCode,
    file_handler::FileHandler,
    process_file, FileOutcome, Mode,
};

#[derive(Parser)]
#[command(name = "fix-misplaced-comments")]
#[command(author = "krokorok")]
#[command(version)]
#[command(
    about = "Move trailing comments off lines that only close brackets",
    long_about = None
)]
struct Cli {
    #[arg(help = "Files, directories or glob patterns to check")]
    paths: Vec<PathBuf>,

    #[arg(long, help = "Rewrite files in place instead of only reporting")]
    fix: bool,

    #[arg(
        long,
        value_name = "N",
        help = "Longest line an inline comment may produce [default: 88]"
    )]
    line_length: Option<usize>,

    #[arg(
        long = "extra-directive",
        value_name = "REGEX",
        help = "Additional comment pattern that must never move (repeatable)"
    )]
    extra_directives: Vec<String>,

    #[arg(long, value_name = "FILE", help = "TOML file with line-length and extra-directives")]
    config: Option<PathBuf>,

    #[arg(long, help = "Disable colored output")]
    no_color: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("MISPLACED_COMMENTS_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();

    let exit_code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fix-misplaced-comments: {e:#}");
            match e.downcast_ref::<misplaced_comments::Error>() {
                Some(err) => ExitCode::from(err),
                None => ExitCode::InternalError,
            }
        }
    };

    std::process::exit(exit_code as i32);
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config_file = cli.config.as_deref().map(ConfigFile::load).transpose()?;
    let settings = Settings::resolve(config_file, cli.line_length, &cli.extra_directives)?;
    let mode = if cli.fix { Mode::Fix } else { Mode::Check };

    let files = FileHandler::new().find_python_files(&cli.paths)?;
    if files.is_empty() {
        debug!("no python files to process");
        return Ok(ExitCode::Success);
    }

    let results: Vec<_> = files
        .par_iter()
        .map(|file| process_file(file, mode, &settings))
        .collect();

    let mut found = 0;
    let mut fixed_files = 0;
    let mut failed_files = 0;

    for (file, outcome) in files.iter().zip(results.iter()) {
        match outcome {
            FileOutcome::Clean | FileOutcome::Skipped(_) => {}
            FileOutcome::Violations(violations) => {
                found += violations.len();
                for violation in violations {
                    eprintln!("{violation}");
                }
            }
            FileOutcome::Fixed { relocated, unfixed } => {
                found += relocated + unfixed.len();
                fixed_files += 1;
                eprintln!("Fixed: {}", file.display());
                for violation in unfixed {
                    eprintln!("{violation}");
                }
            }
            FileOutcome::Failed(e) => {
                failed_files += 1;
                eprintln!("{} {}", "✗".red(), e);
            }
        }
    }

    if found > 0 {
        let summary = match mode {
            Mode::Check => format!("Found {found} misplaced comment(s)"),
            Mode::Fix => format!("Found {found} misplaced comment(s), fixed {fixed_files} file(s)"),
        };
        println!("\n{}", summary.yellow());
    }
    if failed_files > 0 {
        println!("{}", format!("{failed_files} file(s) could not be written").red());
    }

    if results.iter().any(FileOutcome::is_failure) {
        Ok(ExitCode::ViolationsFound)
    } else {
        Ok(ExitCode::Success)
    }
}
