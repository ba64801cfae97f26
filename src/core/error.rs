//! Error types for the media exporter
//!
//! Configuration and source-reachability errors abort a run before any file
//! is transferred. Per-file variants (`PerFileIo`, `TimestampUnavailable`)
//! are counted and logged by the pipeline and never abort a run.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the media exporter
#[derive(Error, Debug)]
pub enum ExportError {
    /// The adb executable could not be located or invoked
    #[error("Android Debug Bridge (adb) not available. Tried: {}", .tried.join(", "))]
    BridgeUnavailable { tried: Vec<String> },

    /// An adb invocation ran but reported failure
    #[error("adb command failed ({command}): {message}")]
    BridgeCommand { command: String, message: String },

    /// adb works but no authorized device is attached
    #[error("No devices detected. Check USB debugging and authorize this computer on the phone.")]
    NoDevicesFound,

    /// The requested device serial is not attached
    #[error("Device '{0}' is not connected")]
    DeviceNotFound(String),

    /// None of the candidate WhatsApp media roots could be listed
    #[error("Could not find WhatsApp Media folder on the device. Tried: {}", .tried.join(", "))]
    NoAccessibleMediaPath { tried: Vec<String> },

    /// A date string was not in YYYY-MM-DD form
    #[error("Invalid date '{0}'. Expected YYYY-MM-DD")]
    InvalidDate(String),

    /// End date precedes start date
    #[error("End date {end} must be the same as or later than start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Move was requested for a USB source
    #[error("Move mode is not supported for USB device sources. Use Copy.")]
    InvalidTransferMode,

    /// No subfolder was enabled
    #[error("Please select at least one subfolder to scan")]
    NoSubfoldersSelected,

    /// Destination root is empty
    #[error("Please select a destination folder")]
    MissingDestination,

    /// Local source root is missing or not a directory
    #[error("Source folder is not a valid directory: {}", .0.display())]
    InvalidSource(PathBuf),

    /// USB source selected without a device
    #[error("Please select a connected device")]
    NoDeviceSelected,

    /// Transfer of a single file failed
    #[error("Transfer failed for '{path}': {message}")]
    PerFileIo { path: String, message: String },

    /// The modification time of a file could not be read
    #[error("Could not read modification time of '{path}': {message}")]
    TimestampUnavailable { path: String, message: String },

    /// A run was started while another one is still active
    #[error("An export is already in progress")]
    RunInProgress,

    /// The worker thread died without producing a summary
    #[error("Export worker stopped unexpectedly")]
    WorkerPanicked,

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Whether this error ends a run before any transfer starts
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ExportError::PerFileIo { .. } | ExportError::TimestampUnavailable { .. }
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ExportError>;
