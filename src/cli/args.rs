//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::model::{SourceKind, TransferMode};

/// Export WhatsApp media from an Android phone or a copied WhatsApp folder,
/// filtered by date
#[derive(Parser, Debug)]
#[command(name = "wa-export")]
#[command(version)]
#[command(about = "Export WhatsApp media by date range from an Android phone (adb) or a local folder", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Export options used when no subcommand is given
    #[command(flatten)]
    pub export: ExportArgs,
}

/// Source kind as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceArg {
    Usb,
    Local,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Usb => SourceKind::Usb,
            SourceArg::Local => SourceKind::Local,
        }
    }
}

/// Transfer mode as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Copy,
    Move,
}

impl From<ModeArg> for TransferMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Copy => TransferMode::Copy,
            ModeArg::Move => TransferMode::Move,
        }
    }
}

/// Options that override the config file for a run
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct ExportArgs {
    /// Where to read media from
    #[arg(short, long, value_enum)]
    pub source: Option<SourceArg>,

    /// Root of a copied WhatsApp folder (local source)
    #[arg(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// adb serial of the phone (USB source)
    #[arg(short, long, value_name = "SERIAL")]
    pub device: Option<String>,

    /// Destination folder (overrides config)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// First day to include, YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    pub start: Option<String>,

    /// Last day to include, YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    pub end: Option<String>,

    /// Subfolders to export (comma-separated names or aliases: images, video,
    /// documents, audio, voice-notes, gifs)
    #[arg(long, value_delimiter = ',', value_name = "NAMES")]
    pub subfolders: Vec<String>,

    /// copy or move (move is only allowed for local sources)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Path to the adb executable
    #[arg(long, value_name = "PATH")]
    pub adb: Option<PathBuf>,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export media in the date range (the default command)
    Export(ExportArgs),

    /// Scan the source and show what would be exported, without copying
    Scan {
        #[command(flatten)]
        export: ExportArgs,

        /// List every planned file
        #[arg(short, long)]
        verbose: bool,
    },

    /// List phones visible to adb
    Devices {
        /// Path to the adb executable
        #[arg(long, value_name = "PATH")]
        adb: Option<PathBuf>,
    },

    /// Open the configuration file in your default editor
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\whatsapp_media_exporter\config.toml
    /// - Linux: ~/.config/whatsapp_media_exporter/config.toml
    ///
    /// If no config file exists, a default one will be created.
    Config {
        /// Show the config file path without opening it
        #[arg(long)]
        path: bool,

        /// Reset config to defaults (creates a fresh config file)
        #[arg(long)]
        reset: bool,
    },

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Output path for the config file (defaults to standard location)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration
    ShowConfig,

    /// Run scenarios against a simulated phone (no device required)
    Test {
        #[command(subcommand)]
        test_command: TestCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TestCommands {
    /// List all available scenarios
    List {
        /// Filter by tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Run scenarios and check their outcomes
    Run {
        /// Scenario names (comma-separated); all when omitted
        #[arg(value_delimiter = ',')]
        scenarios: Vec<String>,

        /// Only scenarios with this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Where scenario exports are written (defaults to a temp folder)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show per-scenario details
        #[arg(short, long)]
        verbose: bool,
    },

    /// Export from a simulated phone with progress output
    Simulate {
        /// Scenario providing the simulated phone and settings
        #[arg(short, long, default_value = "whatsapp_basic")]
        scenario: String,

        /// Destination folder
        #[arg(short, long)]
        output: PathBuf,
    },
}
