//! Action executor - quarantines or deletes files and keeps an audit log
//!
//! Nothing here decides what to remove; it only carries out decisions made
//! by the scanner or the grouper. A failure on one file is logged and the
//! batch continues.

use chrono::Local;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::models::DuplicateGroup;

/// What to do with files marked for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    /// Report only, touch nothing
    DryRun,
    /// Move under the quarantine directory, keeping the path relative to the root
    Quarantine,
    /// Remove permanently (callers must obtain confirmation first)
    Delete,
}

impl ActionMode {
    pub fn is_destructive(&self) -> bool {
        !matches!(self, ActionMode::DryRun)
    }
}

/// One audit log record
#[derive(Debug, Clone)]
pub enum AuditEntry<'a> {
    Moved {
        source: &'a Path,
        destination: &'a Path,
        kept: Option<&'a Path>,
    },
    Deleted {
        source: &'a Path,
        kept: Option<&'a Path>,
    },
    Failed {
        source: &'a Path,
        destination: Option<&'a Path>,
        kept: Option<&'a Path>,
        error: String,
    },
}

/// Plain-text, append-only log with one timestamped record per action
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    /// Create a new log file named `.<prefix>-log-<timestamp>.txt` in `dir`
    pub fn create(dir: &Path, prefix: &str, root: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let now = Local::now();
        let path = dir.join(format!(".{}-log-{}.txt", prefix, now.format("%Y%m%d-%H%M%S")));
        Self::open(path, root)
    }

    /// Open (or append to) a log at an explicit path
    pub fn open(path: PathBuf, root: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "Run started: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file, "Root: {}", root.display())?;
        writeln!(file)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record; concurrent callers are serialized
    pub fn record(&self, entry: &AuditEntry<'_>) -> io::Result<()> {
        let text = format_entry(entry, &Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(text.as_bytes())?;
        file.flush()
    }
}

fn format_entry(entry: &AuditEntry<'_>, timestamp: &str) -> String {
    let mut text = String::new();
    let kept_line = |text: &mut String, kept: Option<&Path>| {
        if let Some(kept) = kept {
            text.push_str(&format!("  KEPT: {}\n", kept.display()));
        }
    };
    match entry {
        AuditEntry::Moved {
            source,
            destination,
            kept,
        } => {
            text.push_str(&format!("[{}] MOVED: {}\n", timestamp, source.display()));
            text.push_str(&format!("  TO: {}\n", destination.display()));
            kept_line(&mut text, *kept);
        }
        AuditEntry::Deleted { source, kept } => {
            text.push_str(&format!("[{}] DELETED: {}\n", timestamp, source.display()));
            kept_line(&mut text, *kept);
        }
        AuditEntry::Failed {
            source,
            destination,
            kept,
            error,
        } => {
            text.push_str(&format!(
                "[{}] ERROR: {} - {}\n",
                timestamp,
                source.display(),
                error
            ));
            if let Some(destination) = destination {
                text.push_str(&format!("  TO: {}\n", destination.display()));
            }
            kept_line(&mut text, *kept);
        }
    }
    text.push('\n');
    text
}

fn is_cross_device_error(err: &io::Error) -> bool {
    #[cfg(windows)]
    const CROSS_DEVICE: i32 = 17; // ERROR_NOT_SAME_DEVICE
    #[cfg(not(windows))]
    const CROSS_DEVICE: i32 = 18; // EXDEV
    err.raw_os_error() == Some(CROSS_DEVICE)
}

fn already_exists(dest: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("destination already exists: {}", dest.display()),
    )
}

/// Copy into a destination that must not exist yet, then drop the source
fn copy_no_clobber(src: &Path, dest: &Path) -> io::Result<()> {
    let mut reader = File::open(src)?;
    let mut writer = match OpenOptions::new().write(true).create_new(true).open(dest) {
        Ok(writer) => writer,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Err(already_exists(dest)),
        Err(err) => return Err(err),
    };
    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.sync_all())
        .and_then(|_| fs::set_permissions(dest, reader.metadata()?.permissions()));
    if let Err(err) = copied {
        let _ = fs::remove_file(dest);
        return Err(err);
    }
    fs::remove_file(src)
}

/// Move a file, creating parent directories and never overwriting
///
/// The destination is claimed with a hard link, which fails when anything
/// already sits there. Cross-device moves copy into a freshly created file.
/// Filesystems without hard links fall back to a checked rename, which can
/// still lose a race against another writer creating the destination.
pub fn relocate_file(src: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::hard_link(src, dest) {
        Ok(()) => {
            if let Err(err) = fs::remove_file(src) {
                let _ = fs::remove_file(dest);
                return Err(err);
            }
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(already_exists(dest)),
        Err(err) if is_cross_device_error(&err) => copy_no_clobber(src, dest),
        Err(_) => {
            if dest.exists() {
                return Err(already_exists(dest));
            }
            match fs::rename(src, dest) {
                Err(err) if is_cross_device_error(&err) => copy_no_clobber(src, dest),
                result => result,
            }
        }
    }
}

/// Counts of what an executor did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionSummary {
    /// Files that would be removed in a dry run
    pub planned: usize,
    pub moved: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Bytes held by files removed (or planned for removal)
    pub bytes: u64,
}

impl ActionSummary {
    pub fn merge(&mut self, other: &ActionSummary) {
        self.planned += other.planned;
        self.moved += other.moved;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.bytes += other.bytes;
    }
}

/// Carries out removal decisions
pub struct ActionExecutor {
    root: PathBuf,
    quarantine_dir: PathBuf,
    mode: ActionMode,
    audit: Option<AuditLog>,
}

impl ActionExecutor {
    pub fn new(root: impl Into<PathBuf>, quarantine_dir: impl Into<PathBuf>, mode: ActionMode) -> Self {
        Self {
            root: root.into(),
            quarantine_dir: quarantine_dir.into(),
            mode,
            audit: None,
        }
    }

    pub fn with_audit_log(mut self, log: AuditLog) -> Self {
        self.audit = Some(log);
        self
    }

    pub fn audit_log_path(&self) -> Option<&Path> {
        self.audit.as_ref().map(AuditLog::path)
    }

    /// Where a file lands in quarantine, mirroring its path under the root
    pub fn quarantine_destination(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.root) {
            Ok(relative) => self.quarantine_dir.join(relative),
            Err(_) => self
                .quarantine_dir
                .join(path.file_name().unwrap_or(path.as_os_str())),
        }
    }

    fn audit(&self, entry: AuditEntry<'_>) {
        if let Some(log) = &self.audit {
            if let Err(e) = log.record(&entry) {
                log::error!("Failed to write audit log {}: {}", log.path().display(), e);
            }
        }
    }

    /// Act on a single file according to the mode
    pub fn remove_file(&self, path: &Path, size: u64, kept: Option<&Path>) -> ActionSummary {
        let mut summary = ActionSummary::default();
        match self.mode {
            ActionMode::DryRun => {
                log::info!("Would remove: {}", path.display());
                summary.planned += 1;
                summary.bytes += size;
            }
            ActionMode::Quarantine => {
                let destination = self.quarantine_destination(path);
                match relocate_file(path, &destination) {
                    Ok(()) => {
                        log::info!("Moved {} to {}", path.display(), destination.display());
                        self.audit(AuditEntry::Moved {
                            source: path,
                            destination: &destination,
                            kept,
                        });
                        summary.moved += 1;
                        summary.bytes += size;
                    }
                    Err(e) => {
                        log::error!("Failed to move {}: {}", path.display(), e);
                        self.audit(AuditEntry::Failed {
                            source: path,
                            destination: Some(&destination),
                            kept,
                            error: e.to_string(),
                        });
                        summary.failed += 1;
                    }
                }
            }
            ActionMode::Delete => match fs::remove_file(path) {
                Ok(()) => {
                    log::info!("Deleted {}", path.display());
                    self.audit(AuditEntry::Deleted { source: path, kept });
                    summary.deleted += 1;
                    summary.bytes += size;
                }
                Err(e) => {
                    log::error!("Failed to delete {}: {}", path.display(), e);
                    self.audit(AuditEntry::Failed {
                        source: path,
                        destination: None,
                        kept,
                        error: e.to_string(),
                    });
                    summary.failed += 1;
                }
            },
        }
        summary
    }

    /// Remove every non-keeper in a duplicate group
    pub fn apply(&self, group: &DuplicateGroup) -> ActionSummary {
        let mut summary = ActionSummary::default();
        for removed in &group.remove {
            let result = self.remove_file(
                &removed.file.path,
                removed.file.size,
                Some(&group.keep.file.path),
            );
            summary.merge(&result);
        }
        summary
    }

    /// Apply every group, continuing past individual failures
    pub fn apply_all(&self, groups: &[DuplicateGroup]) -> ActionSummary {
        let mut summary = ActionSummary::default();
        for group in groups {
            summary.merge(&self.apply(group));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaFile, ScoredFile};
    use tempfile::TempDir;

    fn write(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn group_in(root: &Path) -> DuplicateGroup {
        let keep = root.join("Album/01_song.flac");
        let dup = root.join("Album/01 - Song.mp3");
        write(&keep, b"flac");
        write(&dup, b"mp3!");
        DuplicateGroup {
            keep: ScoredFile {
                file: MediaFile::new(keep, 4),
                score: 100.0,
            },
            remove: vec![ScoredFile {
                file: MediaFile::new(dup, 4),
                score: 60.0,
            }],
        }
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let group = group_in(dir.path());
        let executor = ActionExecutor::new(dir.path(), dir.path().join(".trash-dedup"), ActionMode::DryRun);

        let summary = executor.apply(&group);
        assert_eq!(summary.planned, 1);
        assert_eq!(summary.bytes, 4);
        assert!(group.remove[0].file.path.exists());
        assert!(!dir.path().join(".trash-dedup").exists());
    }

    #[test]
    fn test_quarantine_preserves_relative_path() {
        let dir = TempDir::new().unwrap();
        let group = group_in(dir.path());
        let quarantine = dir.path().join(".trash-dedup");
        let log = AuditLog::create(dir.path(), "dedup", dir.path()).unwrap();
        let executor =
            ActionExecutor::new(dir.path(), &quarantine, ActionMode::Quarantine).with_audit_log(log);

        let summary = executor.apply(&group);
        assert_eq!(summary.moved, 1);
        assert_eq!(summary.failed, 0);

        let moved = quarantine.join("Album/01 - Song.mp3");
        assert!(moved.exists());
        assert!(!group.remove[0].file.path.exists());
        assert!(group.keep.file.path.exists());

        let log = fs::read_to_string(executor.audit_log_path().unwrap()).unwrap();
        assert!(log.contains("MOVED: "));
        assert!(log.contains(&format!("TO: {}", moved.display())));
        assert!(log.contains(&format!("KEPT: {}", group.keep.file.path.display())));
    }

    #[test]
    fn test_failed_move_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let mut group = group_in(dir.path());
        let present = dir.path().join("Album/01 song (2).mp3");
        write(&present, b"copy");
        group.remove.insert(
            0,
            ScoredFile {
                file: MediaFile::new(dir.path().join("Album/vanished.mp3"), 9),
                score: 61.0,
            },
        );
        group.remove.push(ScoredFile {
            file: MediaFile::new(present.clone(), 4),
            score: 59.0,
        });
        let log = AuditLog::create(dir.path(), "dedup", dir.path()).unwrap();
        let executor = ActionExecutor::new(dir.path(), dir.path().join(".trash-dedup"), ActionMode::Quarantine)
            .with_audit_log(log);

        let summary = executor.apply(&group);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.moved, 2);
        assert!(!present.exists());

        let log = fs::read_to_string(executor.audit_log_path().unwrap()).unwrap();
        assert!(log.contains("ERROR: "));
        assert!(log.contains("vanished.mp3"));
    }

    #[test]
    fn test_relocate_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp3");
        let dest = dir.path().join("q/a.mp3");
        write(&src, b"new");
        write(&dest, b"old");

        let err = relocate_file(&src, &dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(src.exists());
    }

    #[test]
    fn test_relocate_moves_contents() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("Album/a.mp3");
        let dest = dir.path().join("q/Album/a.mp3");
        write(&src, b"audio");

        relocate_file(&src, &dest).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"audio");
    }

    #[test]
    fn test_copy_fallback_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.mp3");
        let dest = dir.path().join("b.mp3");
        write(&src, b"new");
        write(&dest, b"old");

        let err = copy_no_clobber(&src, &dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(src.exists());

        fs::remove_file(&dest).unwrap();
        copy_no_clobber(&src, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
        assert!(!src.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_exists_error_is_not_cross_device() {
        // EEXIST shares its number with the Windows cross-device code
        assert!(!is_cross_device_error(&io::Error::from_raw_os_error(17)));
        assert!(is_cross_device_error(&io::Error::from_raw_os_error(18)));
    }

    #[test]
    fn test_delete_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.mp3");
        write(&path, b"xx");
        let executor = ActionExecutor::new(dir.path(), dir.path().join("q"), ActionMode::Delete);

        let summary = executor.remove_file(&path, 2, None);
        assert_eq!(summary.deleted, 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_destination_outside_root_uses_file_name() {
        let executor = ActionExecutor::new("/music", "/quarantine", ActionMode::Quarantine);
        assert_eq!(
            executor.quarantine_destination(Path::new("/music/A/b.mp3")),
            PathBuf::from("/quarantine/A/b.mp3")
        );
        assert_eq!(
            executor.quarantine_destination(Path::new("/elsewhere/c.mp3")),
            PathBuf::from("/quarantine/c.mp3")
        );
    }

    #[test]
    fn test_audit_entry_format() {
        let text = format_entry(
            &AuditEntry::Failed {
                source: Path::new("/m/a.mp3"),
                destination: None,
                kept: Some(Path::new("/m/a.flac")),
                error: "boom".into(),
            },
            "2026-01-01 00:00:00",
        );
        assert_eq!(
            text,
            "[2026-01-01 00:00:00] ERROR: /m/a.mp3 - boom\n  KEPT: /m/a.flac\n\n"
        );
    }

    #[test]
    fn test_summary_merge() {
        let mut total = ActionSummary::default();
        total.merge(&ActionSummary {
            moved: 2,
            bytes: 10,
            ..Default::default()
        });
        total.merge(&ActionSummary {
            failed: 1,
            ..Default::default()
        });
        assert_eq!(total.moved, 2);
        assert_eq!(total.failed, 1);
        assert_eq!(total.bytes, 10);
    }
}
