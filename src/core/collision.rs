//! Destination collision handling
//!
//! Existing files at the destination are never overwritten. A taken name
//! gets a `__dup<N>` suffix before the extension, with the smallest free N.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

const DUP_MARKER: &str = "__dup";

/// Return `destination` if nothing occupies it, otherwise the first free
/// `<stem>__dup<N><.ext>` beside it.
///
/// This only inspects the filesystem, so it must be called right before the
/// transfer of each file: an earlier file in the same run may have taken
/// the name.
pub fn resolve(destination: &Path) -> PathBuf {
    if !is_taken(destination) {
        return destination.to_path_buf();
    }

    let stem = destination
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("file"));
    let extension = destination.extension();
    let parent = destination.parent().unwrap_or(Path::new("."));

    let mut counter: u64 = 1;
    loop {
        let mut name = stem.clone();
        name.push(format!("{}{}", DUP_MARKER, counter));
        if let Some(ext) = extension {
            name.push(".");
            name.push(ext);
        }

        let candidate = parent.join(name);
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Occupied by anything, including a dangling symlink
fn is_taken(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_free_path_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.jpg");
        assert_eq!(resolve(&target), target);
    }

    #[test]
    fn test_dup_suffix_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.jpg");

        fs::write(&target, b"1").unwrap();
        let first = resolve(&target);
        assert_eq!(first, dir.path().join("a__dup1.jpg"));

        fs::write(&first, b"2").unwrap();
        let second = resolve(&target);
        assert_eq!(second, dir.path().join("a__dup2.jpg"));
    }

    #[test]
    fn test_fills_lowest_gap() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"").unwrap();
        fs::write(dir.path().join("a__dup2.jpg"), b"").unwrap();
        assert_eq!(
            resolve(&dir.path().join("a.jpg")),
            dir.path().join("a__dup1.jpg")
        );
    }

    #[test]
    fn test_no_extension_and_multi_dot() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("README");
        fs::write(&plain, b"").unwrap();
        assert_eq!(resolve(&plain), dir.path().join("README__dup1"));

        let archive = dir.path().join("backup.tar.gz");
        fs::write(&archive, b"").unwrap();
        assert_eq!(resolve(&archive), dir.path().join("backup.tar__dup1.gz"));

        let hidden = dir.path().join(".nomedia");
        fs::write(&hidden, b"").unwrap();
        assert_eq!(resolve(&hidden), dir.path().join(".nomedia__dup1"));
    }

    #[test]
    fn test_existing_directory_counts_as_taken() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("clip.mp4");
        fs::create_dir(&target).unwrap();
        assert_eq!(resolve(&target), dir.path().join("clip__dup1.mp4"));
    }
}
