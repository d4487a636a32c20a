//! Interactive shell for the book archive.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `add <id> <title>, <author>` | Add a new book |
//! | `delete <id>` | Delete a book by id |
//! | `update <id> <new_title>, <new_author>` | Replace title and author |
//! | `search <keyword>` | Search titles and authors |
//! | `display` | Show every book with a total |
//! | `help`, `version` | Command list, version information |
//! | `debug` | Toggle DEBUG/INFO logging (debug builds) |
//! | `exit` | Quit |

mod command;
mod shell;
mod table;

pub use command::{ADD_USAGE, Command, CommandError, UPDATE_USAGE};
pub use shell::{POLL_INTERVAL, Shell, build_type, spawn_line_reader, write_version};
pub use table::{AUTHOR_WIDTH, ID_WIDTH, RULE_WIDTH, TITLE_WIDTH, truncate, write_table};
