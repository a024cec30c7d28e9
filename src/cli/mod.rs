//! Command-line interface for minim.
//!
//! Provides commands for syncing a library directory into the store and
//! inspecting what has been indexed.

mod commands;

pub use commands::{Cli, Commands, run_command};
