//! Command-line surface of the terminal driver.
//!
//! [`args`] handles process flags, [`commands`] parses the lines typed
//! into a running session and [`render`] prints what changed.

pub mod args;
pub mod commands;
pub mod render;
pub mod version;

pub use args::{parse_args, CliCommand, RunOptions};
pub use commands::{parse_command, Command, HELP};
pub use render::Transcript;
pub use version::{handle_version_command, VERSION};
