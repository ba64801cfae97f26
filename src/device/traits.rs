//! Device bridge abstraction for testability
//!
//! The USB source talks to the phone only through [`DeviceBridge`]. The real
//! implementation shells out to `adb`; tests use the in-memory
//! `testdb::MockBridge`. This lets the whole export pipeline run without a
//! phone attached.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use whatsapp_media_exporter::device::{AdbBridge, DeviceBridge};
//!
//! fn first_device_files(bridge: &dyn DeviceBridge) -> Result<Vec<String>, String> {
//!     let devices = bridge.list_devices().map_err(|e| e.to_string())?;
//!     let device = devices.first().ok_or("no device")?;
//!     bridge
//!         .find_files(device, "/storage/emulated/0/WhatsApp/Media/WhatsApp Images")
//!         .map_err(|e| e.to_string())
//! }
//! ```

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::Path;

/// Opaque handle for an attached device
///
/// The serial is what `adb -s` takes. The model is informational and only
/// present when `adb devices -l` reported one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceHandle {
    pub serial: String,
    pub model: Option<String>,
}

impl DeviceHandle {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Serial plus model, for pickers and log lines
    pub fn display_name(&self) -> String {
        match &self.model {
            Some(model) => format!("{} ({})", self.serial, model.replace('_', " ")),
            None => self.serial.clone(),
        }
    }
}

impl Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serial)
    }
}

/// Remote operations needed to export media from a device
///
/// Remote paths are absolute, `/`-separated strings. Timestamps are Unix
/// seconds as reported by the device.
pub trait DeviceBridge: Send + Sync {
    /// List devices that are attached and authorized
    ///
    /// Returns an empty list when nothing is attached. Fails only when the
    /// bridge itself cannot be invoked.
    fn list_devices(&self) -> Result<Vec<DeviceHandle>>;

    /// Whether a remote path (file or directory) can be listed
    fn path_exists(&self, device: &DeviceHandle, path: &str) -> Result<bool>;

    /// Every regular file below `dir`, recursively
    fn find_files(&self, device: &DeviceHandle, dir: &str) -> Result<Vec<String>>;

    /// Modification times of every regular file below `dir` in one round-trip
    ///
    /// Files the device could not stat are simply absent from the map.
    fn stat_mtimes(&self, device: &DeviceHandle, dir: &str) -> Result<HashMap<String, i64>>;

    /// Modification time of a single remote file
    fn stat_mtime(&self, device: &DeviceHandle, path: &str) -> Result<i64>;

    /// Copy a remote file to a local path
    fn pull(&self, device: &DeviceHandle, remote: &str, local: &Path) -> Result<()>;

    /// Human-readable description (executable path, "mock", ...)
    fn describe(&self) -> String;
}

/// Find a device by serial
pub fn find_device(devices: &[DeviceHandle], serial: &str) -> Option<DeviceHandle> {
    devices.iter().find(|d| d.serial == serial).cloned()
}
