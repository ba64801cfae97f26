//! Media sources
//!
//! A source enumerates candidate files below a WhatsApp `Media` root and
//! transfers single files to the destination. Two implementations exist:
//!
//! - [`LocalSource`] - a folder previously copied from the phone
//! - [`UsbSource`] - a phone reached through a [`DeviceBridge`]

pub mod local;
pub mod usb;

pub use local::LocalSource;
pub use usb::UsbSource;

use crate::core::config::{Config, DEFAULT_MEDIA_ROOTS};
use crate::core::error::{ExportError, Result};
use crate::core::model::{SourceKind, SourceSpec, TransferMode};
use crate::device::{find_device, AdbBridge, DeviceBridge};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a candidate file lives on its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLocation {
    Local(PathBuf),
    /// Absolute path on the device
    Remote(String),
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileLocation::Local(path) => write!(f, "{}", path.display()),
            FileLocation::Remote(path) => write!(f, "{}", path),
        }
    }
}

/// A file found on the source
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    pub location: FileLocation,
    /// Top-level media subfolder it was found under
    pub subfolder: String,
    /// Path below the media root, `/`-separated, starting with the subfolder
    pub relative_path: String,
    /// Modification time, or why it could not be read
    pub modified: std::result::Result<DateTime<Local>, String>,
}

impl CandidateFile {
    /// Local calendar date of the modification time
    pub fn modified_date(&self) -> Option<NaiveDate> {
        self.modified.as_ref().ok().map(|t| t.date_naive())
    }

    /// Destination path below `root`, mirroring the relative path
    pub fn destination_under(&self, root: &Path) -> PathBuf {
        self.relative_path
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .fold(root.to_path_buf(), |path, part| path.join(part))
    }

    /// Modification time as a Unix timestamp
    pub fn modified_epoch(&self) -> Option<i64> {
        self.modified.as_ref().ok().map(|t| t.timestamp())
    }
}

/// Convert device epoch seconds to local time
pub fn epoch_to_local(secs: i64) -> Option<DateTime<Local>> {
    Local.timestamp_opt(secs, 0).single()
}

/// `modified` of a file listed without timestamps
pub const TIME_NOT_READ: &str = "timestamp not read";

/// Read access to a WhatsApp media tree plus single-file transfer
pub trait MediaSource: Send {
    fn kind(&self) -> SourceKind;

    /// Human-readable description for log lines
    fn describe(&self) -> String;

    /// Resolved media root (local path or device path)
    fn media_root(&self) -> String;

    /// Full location of a subfolder, for log lines
    fn subfolder_location(&self, subfolder: &str) -> String;

    /// Every regular file below one subfolder, recursively
    ///
    /// Returns `Ok(None)` when the subfolder does not exist. Files whose
    /// timestamp could not be read are still returned, with `modified` set
    /// to the reason. Without `with_times` no timestamp is read at all and
    /// every `modified` is [`TIME_NOT_READ`].
    fn list_subfolder(
        &self,
        subfolder: &str,
        with_times: bool,
    ) -> Result<Option<Vec<CandidateFile>>>;

    /// Every file below the given subfolders, in order; missing ones are skipped
    fn list_files(&self, subfolders: &[String]) -> Result<Vec<CandidateFile>> {
        let mut files = Vec::new();
        for name in subfolders {
            if let Some(found) = self.list_subfolder(name, true)? {
                files.extend(found);
            }
        }
        Ok(files)
    }

    /// Copy or move one file to an exact destination path
    ///
    /// The destination's parent exists and the path is free.
    fn transfer(&self, file: &CandidateFile, destination: &Path, mode: TransferMode) -> Result<()>;
}

/// Everything needed to open a source besides the [`SourceSpec`] itself
#[derive(Clone, Default)]
pub struct SourceSettings {
    /// Explicit adb executable; discovered when unset
    pub adb_executable: Option<PathBuf>,
    /// Device media roots tried in order
    pub media_roots: Vec<String>,
    /// Pre-built bridge; takes precedence over discovery
    pub bridge: Option<Arc<dyn DeviceBridge>>,
}

impl SourceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            adb_executable: config.bridge.executable.clone(),
            media_roots: config.bridge.effective_media_roots(),
            bridge: None,
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn DeviceBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// The provided bridge, or a discovered adb
    pub fn bridge(&self) -> Result<Arc<dyn DeviceBridge>> {
        match &self.bridge {
            Some(bridge) => Ok(Arc::clone(bridge)),
            None => Ok(Arc::new(AdbBridge::locate(self.adb_executable.as_deref())?)),
        }
    }

    pub fn media_roots(&self) -> Vec<String> {
        if self.media_roots.is_empty() {
            DEFAULT_MEDIA_ROOTS.iter().map(|s| s.to_string()).collect()
        } else {
            self.media_roots.clone()
        }
    }
}

/// Open the source a run reads from
///
/// For USB this checks that the device is still attached and resolves the
/// media root, so unreachable devices fail here rather than mid-run.
pub fn open_source(spec: &SourceSpec, settings: &SourceSettings) -> Result<Box<dyn MediaSource>> {
    match spec {
        SourceSpec::Local { root } => Ok(Box::new(LocalSource::new(root)?)),
        SourceSpec::Usb { device } => {
            let bridge = settings.bridge()?;
            let attached = bridge.list_devices()?;
            let device = find_device(&attached, &device.serial)
                .ok_or_else(|| ExportError::DeviceNotFound(device.serial.clone()))?;
            Ok(Box::new(UsbSource::open(
                bridge,
                device,
                &settings.media_roots(),
            )?))
        }
    }
}
