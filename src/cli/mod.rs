//! CLI module for the WhatsApp media exporter
//!
//! This module contains all command-line interface related code including
//! argument parsing, command definitions, and command handlers.
//!
//! # Submodules
//!
//! - `args` - Command-line argument definitions using clap
//! - `commands` - Command handler implementations
//! - `progress` - Progress bars and CLI output utilities

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Args, Commands, ExportArgs, TestCommands};
pub use commands::{apply_overrides, run_command};
pub use progress::{DualWriter, RunProgress};
