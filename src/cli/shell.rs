//! Interactive shell.
//!
//! Lines arrive over a channel fed by a reader thread, so the loop can
//! notice a termination request while no input is pending. Leaving the loop
//! always returns to the caller, which owns the catalog and tears it down.

use super::command::{Command, CommandError};
use super::table::write_table;
use crate::catalog::Catalog;
use crate::observability::{LogLevel, LogLevelHandle};
use crate::storage::{SqliteEngine, StoreEngine};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// How often the loop checks for a termination request while idle.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const HELP: &str = "\
  add <id> <title>, <author>              - Add a new book
  delete <id>                             - Delete a book by ID
  update <id> <new_title>, <new_author>   - Update a book's information based on ID
  search <keyword>                        - Search books by title or author
  display                                 - Show all books in the database
  help                                    - Show this help menu
  version                                 - Display the tool version
  debug                                   - Toggle debug logging (debug builds only)
  exit                                    - Quit the program
";

/// Name of the build profile.
#[must_use]
pub const fn build_type() -> &'static str {
    if cfg!(debug_assertions) { "Debug" } else { "Release" }
}

/// Writes the package, `SQLite` and build versions.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_version<W: Write>(writer: &mut W) -> io::Result<()> {
    writeln!(writer, "Book Archive Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(writer, "SQLite version: {}", SqliteEngine::library_version())?;
    writeln!(writer, "Build type: {}", build_type())
}

/// Starts a thread that forwards each line of `reader` to the returned
/// channel. The channel disconnects at end of input or on a read error.
pub fn spawn_line_reader<R>(reader: R) -> Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// The interactive command loop over a catalog.
pub struct Shell<'a, W: Write, E: StoreEngine = SqliteEngine> {
    catalog: &'a Catalog<E>,
    out: W,
    log_level: Option<LogLevelHandle>,
    running: bool,
}

impl<'a, W: Write, E: StoreEngine> Shell<'a, W, E> {
    /// Creates a shell writing to `out`.
    pub const fn new(catalog: &'a Catalog<E>, out: W) -> Self {
        Self {
            catalog,
            out,
            log_level: None,
            running: true,
        }
    }

    /// Lets the `debug` command change the log level through `handle`.
    #[must_use]
    pub fn with_log_level(mut self, handle: Option<LogLevelHandle>) -> Self {
        self.log_level = handle;
        self
    }

    /// Returns false once `exit` has been processed.
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Consumes the shell, returning its output.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Reads commands from `input` until `exit`, end of input, or
    /// `shutdown` is raised.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the output fails.
    pub fn run(&mut self, input: &Receiver<String>, shutdown: &AtomicBool) -> io::Result<()> {
        writeln!(
            self.out,
            "Book Archive {} - Library Management Tool",
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(self.out, "Type 'help' for available commands, 'exit' to quit.")?;

        while self.running {
            write!(self.out, "\n> ")?;
            self.out.flush()?;

            let line = loop {
                if shutdown.load(Ordering::SeqCst) {
                    writeln!(
                        self.out,
                        "\nReceived termination signal. Shutting down gracefully..."
                    )?;
                    tracing::info!("Termination requested, leaving shell");
                    return Ok(());
                }
                match input.recv_timeout(POLL_INTERVAL) {
                    Ok(line) => break line,
                    Err(RecvTimeoutError::Timeout) => {},
                    Err(RecvTimeoutError::Disconnected) => {
                        tracing::debug!("End of input, leaving shell");
                        return Ok(());
                    },
                }
            };

            self.execute_line(&line)?;
        }
        Ok(())
    }

    /// Parses and runs one line. Blank lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the output fails.
    pub fn execute_line(&mut self, line: &str) -> io::Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        match line.parse::<Command>() {
            Ok(command) => self.execute(command),
            Err(e) => self.report(&e, line),
        }
    }

    fn report(&mut self, error: &CommandError, line: &str) -> io::Result<()> {
        tracing::error!("Command error: {error} (Command: {line})");
        writeln!(self.out, "Error: {error}")
    }

    fn execute(&mut self, command: Command) -> io::Result<()> {
        match command {
            Command::Add { id, title, author } => {
                let ok = self.catalog.insert(id, &title, &author);
                self.outcome(ok, "Book added successfully!", "add")
            },
            Command::Delete { id } => {
                let ok = self.catalog.remove(id);
                self.outcome(ok, "Book deleted successfully!", "delete")
            },
            Command::Update { id, title, author } => {
                let ok = self.catalog.modify(id, &title, &author);
                self.outcome(ok, "Book updated successfully!", "update")
            },
            Command::Search { keyword } => {
                let books = self.catalog.find(&keyword);
                if books.is_empty() {
                    writeln!(self.out, "No books found matching '{keyword}'.")
                } else {
                    writeln!(self.out, "Search Results for '{keyword}':")?;
                    write_table(&mut self.out, &books)
                }
            },
            Command::Display => {
                let books = self.catalog.list_all();
                if books.is_empty() {
                    return writeln!(self.out, "No books found in the database.");
                }
                writeln!(self.out, "Book Archive - All Books:")?;
                write_table(&mut self.out, &books)?;
                writeln!(self.out, "\nTotal: {} book(s)", books.len())
            },
            Command::Help => {
                writeln!(
                    self.out,
                    "\nBook Archive {} - Command List\n",
                    env!("CARGO_PKG_VERSION")
                )?;
                writeln!(self.out, "{HELP}")
            },
            Command::Version => write_version(&mut self.out),
            Command::Debug => self.toggle_debug(),
            Command::Exit => {
                self.running = false;
                writeln!(self.out, "Exiting Book Archive. Goodbye!")
            },
            Command::Unknown(action) => {
                tracing::debug!("Unknown command: {action}");
                writeln!(self.out, "Invalid command. Type 'help' for a list of commands.")
            },
        }
    }

    fn outcome(&mut self, ok: bool, success: &str, action: &str) -> io::Result<()> {
        if ok {
            writeln!(self.out, "{success}")
        } else {
            writeln!(
                self.out,
                "Error: Failed to {action} the book. Check logs for details."
            )
        }
    }

    fn toggle_debug(&mut self) -> io::Result<()> {
        if !cfg!(debug_assertions) {
            return writeln!(
                self.out,
                "Logging level switching is not available in release build."
            );
        }
        let Some(handle) = self.log_level.as_ref() else {
            return writeln!(self.out, "Logging is disabled.");
        };

        let next = match handle.current() {
            Some(LogLevel::Debug) => LogLevel::Info,
            _ => LogLevel::Debug,
        };
        match handle.set(next) {
            Ok(()) => writeln!(self.out, "Logging level switched to {next}."),
            Err(e) => writeln!(self.out, "Error: {e}"),
        }
    }
}
