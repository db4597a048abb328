//! Directory walk shared by the validity scanner and the duplicate grouper

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::error::{ScanError, ScanErrorKind};

/// Make sure the root can be walked at all.
///
/// An unusable root is fatal and must be reported before any work starts.
pub fn check_root(root: &Path) -> Result<(), ScanError> {
    let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScanError::not_found(root.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => ScanError::permission_denied(root.to_path_buf()),
        _ => ScanError::io_error(Some(root.to_path_buf()), e.to_string()),
    })?;
    if !metadata.is_dir() {
        return Err(ScanError::not_a_directory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ScanError::permission_denied(root.to_path_buf())
        } else {
            ScanError::io_error(Some(root.to_path_buf()), e.to_string())
        }
    })?;
    Ok(())
}

fn is_pruned(entry: &DirEntry, config: &ScanConfig) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    if config.is_quarantine_dir(entry.path()) {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| config.should_ignore_dir(name))
        .unwrap_or(false)
}

/// Collect every candidate file under the configured root.
///
/// Hidden, ignored and quarantine directories are pruned before descending.
/// Entries are listed in file-name order, so the result is stable for a
/// given tree. Unreadable sub-trees are logged and skipped.
pub fn collect_candidates(config: &ScanConfig) -> Result<Vec<PathBuf>, ScanError> {
    check_root(&config.root)?;

    let walker = WalkDir::new(&config.root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_pruned(entry, config));

    let mut candidates = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                let extension = crate::models::extension_of(entry.path());
                if config.should_include_extension(&extension) {
                    candidates.push(entry.into_path());
                }
            }
            Err(e) => {
                let err = ScanError::from(e);
                if err.kind == ScanErrorKind::PermissionDenied {
                    log::warn!("Skipping unreadable directory: {:?}", err.path);
                } else {
                    log::warn!("Skipping entry: {}", err);
                }
            }
        }
    }

    log::debug!(
        "Found {} candidate files under {}",
        candidates.len(),
        config.root.display()
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_collects_matching_extensions() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.mp3"));
        touch(&dir.path().join("b.FLAC"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("Album/c.ogg"));

        let config = ScanConfig::builder().root(dir.path()).audio_only().build();
        let found = collect_candidates(&config).unwrap();

        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["c.ogg", "a.mp3", "b.FLAC"]);
    }

    #[test]
    fn test_prunes_hidden_and_quarantine_dirs() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("keep.mp3"));
        touch(&dir.path().join(".hidden/skip.mp3"));
        touch(&dir.path().join(".trash-dedup/Album/skip.mp3"));
        touch(&dir.path().join("invalid/skip.mp3"));

        let config = ScanConfig::builder()
            .root(dir.path())
            .quarantine_dir(dir.path().join("invalid"))
            .build();
        let found = collect_candidates(&config).unwrap();

        assert_eq!(found, vec![dir.path().join("keep.mp3")]);
    }

    #[test]
    fn test_prunes_quarantine_dir_given_in_another_form() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("keep.mp3"));
        touch(&dir.path().join("invalid/skip.mp3"));
        touch(&dir.path().join("Album/invalid/keep.mp3"));

        let config = ScanConfig::builder()
            .root(dir.path())
            .quarantine_dir(dir.path().join("Album/../invalid"))
            .build();
        let found = collect_candidates(&config).unwrap();

        assert_eq!(
            found,
            vec![
                dir.path().join("Album/invalid/keep.mp3"),
                dir.path().join("keep.mp3"),
            ]
        );
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = ScanConfig::new(dir.path().join("nope"));
        let err = collect_candidates(&config).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::NotFound);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("song.mp3");
        touch(&file);
        let err = check_root(&file).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::NotADirectory);
    }
}
