//! USB device source
//!
//! Enumerates and pulls files from a phone through a [`DeviceBridge`].
//! Timestamps are read with one batched `stat` per subfolder; files missing
//! from the batch are retried one at a time.

use crate::core::error::{ExportError, Result};
use crate::core::model::{SourceKind, TransferMode};
use crate::device::{DeviceBridge, DeviceHandle};
use crate::source::{epoch_to_local, CandidateFile, FileLocation, MediaSource, TIME_NOT_READ};
use filetime::FileTime;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Media source backed by a device bridge
pub struct UsbSource {
    bridge: Arc<dyn DeviceBridge>,
    device: DeviceHandle,
    media_root: String,
}

impl UsbSource {
    /// Pick the first accessible media root on the device
    pub fn open(
        bridge: Arc<dyn DeviceBridge>,
        device: DeviceHandle,
        candidate_roots: &[String],
    ) -> Result<Self> {
        for root in candidate_roots {
            if bridge.path_exists(&device, root)? {
                info!("Media root on {}: {}", device, root);
                return Ok(Self {
                    bridge,
                    device,
                    media_root: root.trim_end_matches('/').to_string(),
                });
            }
            debug!("{} not accessible on {}", root, device);
        }

        Err(ExportError::NoAccessibleMediaPath {
            tried: candidate_roots.to_vec(),
        })
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    fn relative_path(&self, remote: &str) -> String {
        let prefix = format!("{}/", self.media_root);
        match remote.strip_prefix(&prefix) {
            Some(rest) => rest.to_string(),
            None => remote.rsplit('/').next().unwrap_or(remote).to_string(),
        }
    }

    fn timestamp_for(
        &self,
        remote: &str,
        batch: &HashMap<String, i64>,
    ) -> std::result::Result<i64, String> {
        if let Some(secs) = batch.get(remote) {
            return Ok(*secs);
        }
        self.bridge
            .stat_mtime(&self.device, remote)
            .map_err(|e| e.to_string())
    }
}

impl MediaSource for UsbSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Usb
    }

    fn describe(&self) -> String {
        format!("device {} via {}", self.device.display_name(), self.bridge.describe())
    }

    fn media_root(&self) -> String {
        self.media_root.clone()
    }

    fn subfolder_location(&self, subfolder: &str) -> String {
        format!("{}/{}", self.media_root, subfolder)
    }

    fn list_subfolder(
        &self,
        subfolder: &str,
        with_times: bool,
    ) -> Result<Option<Vec<CandidateFile>>> {
        let dir = self.subfolder_location(subfolder);
        if !self.bridge.path_exists(&self.device, &dir)? {
            return Ok(None);
        }

        let remote_files = self.bridge.find_files(&self.device, &dir)?;
        let batch = if with_times {
            match self.bridge.stat_mtimes(&self.device, &dir) {
                Ok(times) => times,
                Err(e) => {
                    warn!("Batched stat failed for {} ({}), falling back to per-file", dir, e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let files = remote_files
            .into_iter()
            .map(|remote| {
                let modified = if with_times {
                    self.timestamp_for(&remote, &batch).and_then(|secs| {
                        epoch_to_local(secs)
                            .ok_or_else(|| format!("timestamp out of range: {}", secs))
                    })
                } else {
                    Err(TIME_NOT_READ.to_string())
                };
                CandidateFile {
                    relative_path: self.relative_path(&remote),
                    location: FileLocation::Remote(remote),
                    subfolder: subfolder.to_string(),
                    modified,
                }
            })
            .collect::<Vec<_>>();

        debug!("{} file(s) under {}", files.len(), dir);
        Ok(Some(files))
    }

    fn transfer(&self, file: &CandidateFile, destination: &Path, mode: TransferMode) -> Result<()> {
        if mode == TransferMode::Move {
            return Err(ExportError::InvalidTransferMode);
        }

        let FileLocation::Remote(remote) = &file.location else {
            return Err(ExportError::PerFileIo {
                path: file.relative_path.clone(),
                message: "not a device file".to_string(),
            });
        };

        self.bridge
            .pull(&self.device, remote, destination)
            .map_err(|e| ExportError::PerFileIo {
                path: file.relative_path.clone(),
                message: e.to_string(),
            })?;

        if let Some(secs) = file.modified_epoch() {
            if let Err(e) = filetime::set_file_mtime(destination, FileTime::from_unix_time(secs, 0))
            {
                warn!(
                    "Could not set modification time on {}: {}",
                    destination.display(),
                    e
                );
            }
        }

        Ok(())
    }
}
