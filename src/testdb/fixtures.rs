//! Scratch WhatsApp media trees on the local filesystem
//!
//! Every file gets its modification time set to local noon of a chosen
//! date, so date-range assertions don't depend on when the test runs.

pub use crate::testdb::{list_relative, local_noon};

use chrono::NaiveDate;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for a temporary WhatsApp folder
#[derive(Debug, Default)]
pub struct MediaTreeBuilder {
    media_dir: bool,
    files: Vec<(String, NaiveDate, Vec<u8>)>,
    empty_dirs: Vec<String>,
}

impl MediaTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the subfolders under `<root>/Media` instead of `<root>`
    pub fn with_media_dir(mut self) -> Self {
        self.media_dir = true;
        self
    }

    /// Add a file (path relative to the media root) dated `date`
    pub fn file(self, relative: &str, date: NaiveDate) -> Self {
        let content = relative.as_bytes().to_vec();
        self.file_with_content(relative, date, &content)
    }

    pub fn file_with_content(mut self, relative: &str, date: NaiveDate, content: &[u8]) -> Self {
        self.files.push((relative.to_string(), date, content.to_vec()));
        self
    }

    pub fn empty_dir(mut self, relative: &str) -> Self {
        self.empty_dirs.push(relative.to_string());
        self
    }

    pub fn build(self) -> MediaTree {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().to_path_buf();
        let media_root = if self.media_dir {
            root.join("Media")
        } else {
            root.clone()
        };
        fs::create_dir_all(&media_root).expect("create media root");

        for relative in &self.empty_dirs {
            fs::create_dir_all(media_root.join(relative)).expect("create dir");
        }

        for (relative, date, content) in &self.files {
            let path = media_root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(&path, content).expect("write fixture");
            let mtime = FileTime::from_unix_time(local_noon(*date).timestamp(), 0);
            filetime::set_file_mtime(&path, mtime).expect("set mtime");
        }

        MediaTree {
            _dir: dir,
            root,
            media_root,
        }
    }
}

/// A built tree; deleted when dropped
#[derive(Debug)]
pub struct MediaTree {
    _dir: TempDir,
    root: PathBuf,
    media_root: PathBuf,
}

impl MediaTree {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.media_root.join(relative)
    }
}
