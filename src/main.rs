//! Binary entry point for book-archive.
//!
//! Parses flags, loads configuration, opens the catalog and runs the
//! interactive shell. Teardown order is fixed: the catalog (statements, then
//! connection) goes first, the log sink last.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use book_archive::cli::{Shell, spawn_line_reader, write_version};
use book_archive::config::ArchiveConfig;
use book_archive::observability::{self, LoggingConfig, ObservabilityHandle};
use book_archive::{Catalog, LogLevel};
use clap::Parser;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Book Archive - a personal book catalog.
#[derive(Parser)]
#[command(name = "book-archive")]
#[command(author, about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Database file (default: book_archive.db).
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Log level: DEBUG, INFO or ERROR (default: ERROR in release, DEBUG in debug).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Path to configuration file.
    #[arg(short, long, env = "BOOK_ARCHIVE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Display version information.
    #[arg(short = 'v', long)]
    version: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        return match write_version(&mut io::stdout()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        };
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => apply_flags(config.with_env_overrides(), &cli),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let mut logging = match observability::init(&LoggingConfig::from_config(&config)) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Warning: Could not open log file. Logging disabled. ({e})");
            ObservabilityHandle::disabled()
        },
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::error!("Failed to install termination handler: {e}");
    }

    let catalog = match Catalog::open(&config) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Fatal error: {e}");
            return ExitCode::FAILURE;
        },
    };

    let input = spawn_line_reader(BufReader::new(io::stdin()));
    let mut shell = Shell::new(&catalog, io::stdout()).with_log_level(logging.level_handle());
    let result = shell.run(&input, &shutdown);
    drop(shell);

    let closed = catalog.close();
    logging.shutdown();

    match (result, closed) {
        (Ok(()), Ok(())) => ExitCode::SUCCESS,
        (Err(e), _) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
        (_, Err(e)) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads the config file named on the command line, or the default one.
fn load_config(path: Option<&Path>) -> book_archive::Result<ArchiveConfig> {
    match path {
        Some(path) => ArchiveConfig::load_from_file(path),
        None => Ok(ArchiveConfig::load_default()),
    }
}

/// Applies command-line flags, the highest-precedence source.
fn apply_flags(mut config: ArchiveConfig, cli: &Cli) -> ArchiveConfig {
    if let Some(db) = &cli.db {
        config.db_path.clone_from(db);
    }
    if let Some(level) = cli.log_level.as_deref() {
        config.log_level = LogLevel::parse(level).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log level '{level}'. Using default.");
            LogLevel::build_default()
        });
    }
    config
}
