//! In-memory device bridge for testing without a phone
//!
//! Holds a flat map of remote file paths to contents and timestamps.
//! Directories exist implicitly as prefixes of file paths. Individual
//! operations can be made to fail per path to exercise error handling.

use crate::core::error::{ExportError, Result};
use crate::device::{DeviceBridge, DeviceHandle};
use crate::testdb::local_noon;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A file stored on the simulated device
#[derive(Debug, Clone)]
pub struct MockRemoteFile {
    pub mtime: i64,
    pub content: Vec<u8>,
}

/// Counts of bridge calls made during a test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockBridgeStats {
    pub list_devices: usize,
    pub find_calls: usize,
    pub batch_stat_calls: usize,
    pub single_stat_calls: usize,
    pub pulls: usize,
}

/// Simulated adb
#[derive(Debug, Default)]
pub struct MockBridge {
    devices: Vec<DeviceHandle>,
    files: BTreeMap<String, MockRemoteFile>,
    unavailable: bool,
    /// Paths left out of batched stat output
    missing_from_batch: HashSet<String>,
    /// Paths whose single stat fails
    stat_errors: HashSet<String>,
    /// Paths whose pull fails
    pull_errors: HashSet<String>,
    /// Directories whose listing fails
    find_errors: HashSet<String>,
    pull_delay: Duration,
    list_devices_calls: AtomicUsize,
    find_calls: AtomicUsize,
    batch_stat_calls: AtomicUsize,
    single_stat_calls: AtomicUsize,
    pulls: AtomicUsize,
    pulled: Mutex<Vec<String>>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge whose executable cannot be found
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device: DeviceHandle) -> Self {
        self.devices.push(device);
        self
    }

    /// Add a file modified at local noon on `date`
    pub fn with_file(self, path: &str, date: NaiveDate, content: &[u8]) -> Self {
        self.with_file_at(path, local_noon(date).timestamp(), content)
    }

    /// Add a file with an exact epoch timestamp
    pub fn with_file_at(mut self, path: &str, mtime: i64, content: &[u8]) -> Self {
        self.files.insert(
            path.to_string(),
            MockRemoteFile {
                mtime,
                content: content.to_vec(),
            },
        );
        self
    }

    pub fn without_batch_stat(mut self, path: &str) -> Self {
        self.missing_from_batch.insert(path.to_string());
        self
    }

    pub fn with_stat_error(mut self, path: &str) -> Self {
        self.stat_errors.insert(path.to_string());
        self
    }

    pub fn with_pull_error(mut self, path: &str) -> Self {
        self.pull_errors.insert(path.to_string());
        self
    }

    pub fn with_find_error(mut self, dir: &str) -> Self {
        self.find_errors.insert(dir.trim_end_matches('/').to_string());
        self
    }

    /// Sleep this long in every pull
    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn single_stat_calls(&self) -> usize {
        self.single_stat_calls.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> MockBridgeStats {
        MockBridgeStats {
            list_devices: self.list_devices_calls.load(Ordering::SeqCst),
            find_calls: self.find_calls.load(Ordering::SeqCst),
            batch_stat_calls: self.batch_stat_calls.load(Ordering::SeqCst),
            single_stat_calls: self.single_stat_calls.load(Ordering::SeqCst),
            pulls: self.pulls.load(Ordering::SeqCst),
        }
    }

    /// Remote paths pulled so far, in order
    pub fn pulled(&self) -> Vec<String> {
        self.pulled
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn check_device(&self, device: &DeviceHandle) -> Result<()> {
        if self.unavailable {
            return Err(ExportError::BridgeUnavailable {
                tried: vec!["mock".to_string()],
            });
        }
        if self.devices.iter().any(|d| d.serial == device.serial) {
            Ok(())
        } else {
            Err(ExportError::BridgeCommand {
                command: format!("adb -s {}", device.serial),
                message: format!("device '{}' not found", device.serial),
            })
        }
    }

    fn files_under<'a>(&'a self, dir: &str) -> impl Iterator<Item = (&'a String, &'a MockRemoteFile)> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files
            .iter()
            .filter(move |(path, _)| path.starts_with(&prefix))
    }
}

impl DeviceBridge for MockBridge {
    fn list_devices(&self) -> Result<Vec<DeviceHandle>> {
        self.list_devices_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(ExportError::BridgeUnavailable {
                tried: vec!["mock".to_string()],
            });
        }
        Ok(self.devices.clone())
    }

    fn path_exists(&self, device: &DeviceHandle, path: &str) -> Result<bool> {
        self.check_device(device)?;
        let path = path.trim_end_matches('/');
        Ok(self.files.contains_key(path) || self.files_under(path).next().is_some())
    }

    fn find_files(&self, device: &DeviceHandle, dir: &str) -> Result<Vec<String>> {
        self.check_device(device)?;
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.find_errors.contains(dir.trim_end_matches('/')) {
            return Err(ExportError::BridgeCommand {
                command: format!("find {}", dir),
                message: "Permission denied".to_string(),
            });
        }
        Ok(self.files_under(dir).map(|(path, _)| path.clone()).collect())
    }

    fn stat_mtimes(&self, device: &DeviceHandle, dir: &str) -> Result<HashMap<String, i64>> {
        self.check_device(device)?;
        self.batch_stat_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files_under(dir)
            .filter(|(path, _)| !self.missing_from_batch.contains(*path))
            .map(|(path, file)| (path.clone(), file.mtime))
            .collect())
    }

    fn stat_mtime(&self, device: &DeviceHandle, path: &str) -> Result<i64> {
        self.check_device(device)?;
        self.single_stat_calls.fetch_add(1, Ordering::SeqCst);
        if self.stat_errors.contains(path) {
            return Err(ExportError::TimestampUnavailable {
                path: path.to_string(),
                message: "stat: Permission denied".to_string(),
            });
        }
        self.files
            .get(path)
            .map(|f| f.mtime)
            .ok_or_else(|| ExportError::TimestampUnavailable {
                path: path.to_string(),
                message: "No such file or directory".to_string(),
            })
    }

    fn pull(&self, device: &DeviceHandle, remote: &str, local: &Path) -> Result<()> {
        self.check_device(device)?;
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if !self.pull_delay.is_zero() {
            std::thread::sleep(self.pull_delay);
        }

        if self.pull_errors.contains(remote) {
            return Err(ExportError::BridgeCommand {
                command: format!("adb pull {}", remote),
                message: "remote object does not exist".to_string(),
            });
        }

        let file = self.files.get(remote).ok_or_else(|| ExportError::BridgeCommand {
            command: format!("adb pull {}", remote),
            message: "remote object does not exist".to_string(),
        })?;

        fs::write(local, &file.content)?;
        if let Ok(mut pulled) = self.pulled.lock() {
            pulled.push(remote.to_string());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "mock bridge".to_string()
    }
}
