//! Local folder source
//!
//! Reads a WhatsApp folder that was copied off the phone. If the chosen root
//! contains a `Media` directory that is used as the media root, so both the
//! `WhatsApp` folder and its `Media` child can be picked.

use crate::core::error::{ExportError, Result};
use crate::core::model::{SourceKind, TransferMode};
use crate::source::{CandidateFile, FileLocation, MediaSource, TIME_NOT_READ};
use chrono::{DateTime, Local};
use filetime::FileTime;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Media source backed by the local filesystem
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
    media_root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ExportError::InvalidSource(root));
        }
        let media_root = detect_media_root(&root);
        Ok(Self { root, media_root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn media_root_path(&self) -> &Path {
        &self.media_root
    }

    fn candidate(&self, subfolder: &str, path: &Path, with_times: bool) -> CandidateFile {
        let modified = if with_times {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .map(DateTime::<Local>::from)
                .map_err(|e| e.to_string())
        } else {
            Err(TIME_NOT_READ.to_string())
        };

        CandidateFile {
            location: FileLocation::Local(path.to_path_buf()),
            subfolder: subfolder.to_string(),
            relative_path: relative_slash_path(&self.media_root, path),
            modified,
        }
    }
}

impl MediaSource for LocalSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn describe(&self) -> String {
        format!("local folder {}", self.root.display())
    }

    fn media_root(&self) -> String {
        self.media_root.display().to_string()
    }

    fn subfolder_location(&self, subfolder: &str) -> String {
        self.media_root.join(subfolder).display().to_string()
    }

    fn list_subfolder(
        &self,
        subfolder: &str,
        with_times: bool,
    ) -> Result<Option<Vec<CandidateFile>>> {
        let dir = self.media_root.join(subfolder);
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false) {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    files.push(self.candidate(subfolder, entry.path(), with_times));
                }
                Ok(_) => {}
                Err(e) => match e.path() {
                    // Unreadable file: keep it so the failure gets counted
                    Some(path) if !path.is_dir() => {
                        let mut candidate = self.candidate(subfolder, path, false);
                        candidate.modified = Err(e.to_string());
                        files.push(candidate);
                    }
                    Some(path) => warn!("Could not read {}: {}", path.display(), e),
                    None => warn!("Could not read {}: {}", dir.display(), e),
                },
            }
        }

        debug!("{} file(s) under {}", files.len(), dir.display());
        Ok(Some(files))
    }

    fn transfer(&self, file: &CandidateFile, destination: &Path, mode: TransferMode) -> Result<()> {
        let FileLocation::Local(source) = &file.location else {
            return Err(ExportError::PerFileIo {
                path: file.relative_path.clone(),
                message: "not a local file".to_string(),
            });
        };

        let result = match mode {
            TransferMode::Copy => copy_with_metadata(source, destination),
            TransferMode::Move => move_file(source, destination),
        };

        result.map_err(|e| ExportError::PerFileIo {
            path: file.relative_path.clone(),
            message: e.to_string(),
        })
    }
}

/// `<root>/Media` when it is a directory, otherwise `root`
pub fn detect_media_root(root: &Path) -> PathBuf {
    let candidate = root.join("Media");
    if candidate.is_dir() {
        candidate
    } else {
        root.to_path_buf()
    }
}

/// Copy contents, then carry over access and modification times
///
/// On failure no partial copy is left at `destination`.
pub fn copy_with_metadata(source: &Path, destination: &Path) -> std::io::Result<()> {
    copy_then(source, destination, |copied| {
        let metadata = fs::metadata(source)?;
        let atime = FileTime::from_last_access_time(&metadata);
        let mtime = FileTime::from_last_modification_time(&metadata);
        filetime::set_file_times(copied, atime, mtime)
    })
}

/// Copy, then run `finish` on the copy; the copy is removed if either fails
fn copy_then<F>(source: &Path, destination: &Path, finish: F) -> std::io::Result<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    let result = fs::copy(source, destination).and_then(|_| finish(destination));
    if let Err(e) = result {
        if destination.is_file() {
            if let Err(remove_err) = fs::remove_file(destination) {
                warn!(
                    "Could not remove partial copy {}: {}",
                    destination.display(),
                    remove_err
                );
            }
        }
        return Err(e);
    }
    Ok(())
}

/// Rename, falling back to copy-then-delete across filesystems
pub fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                "rename {} -> {} failed ({}), copying instead",
                source.display(),
                destination.display(),
                e
            );
            copy_with_metadata(source, destination)?;
            if let Err(remove_err) = fs::remove_file(source) {
                // Undo the copy
                let _ = fs::remove_file(destination);
                return Err(remove_err);
            }
            Ok(())
        }
    }
}

fn relative_slash_path(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
