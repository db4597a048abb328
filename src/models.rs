//! Core data models for media triage

use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

/// A candidate file discovered during a directory walk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File extension (lowercase, without dot)
    pub extension: String,
    /// File size in bytes
    pub size: u64,
    /// Directory containing the file
    pub directory: PathBuf,
}

impl MediaFile {
    /// Create a MediaFile from a path and a known size
    pub fn new(path: PathBuf, size: u64) -> Self {
        let extension = extension_of(&path);
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            extension,
            size,
            directory,
        }
    }

    /// Stat the file and build a MediaFile from its metadata
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self::new(path.to_path_buf(), metadata.len()))
    }

    /// File name without directory, for display
    pub fn file_name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default()
    }
}

/// Lowercase extension of a path, empty if it has none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Canonical classes of probe diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    InvalidData,
    Truncated,
    MissingHeader,
    UnknownCodec,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::InvalidData => "invalid/corrupted data",
            DiagnosticKind::Truncated => "truncated file",
            DiagnosticKind::MissingHeader => "missing header",
            DiagnosticKind::UnknownCodec => "unknown codec",
        }
    }
}

/// A problem found with a single file
///
/// `Display` renders the message shown in reports. [`Issue::kind`] gives the
/// stable short label and [`Issue::detail`] the raw text behind it, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// The file cannot be opened for reading
    NotReadable,
    /// File metadata could not be read
    CannotStat(String),
    /// The file is 0 bytes long
    EmptyFile,
    /// The file is below the small-file threshold
    SuspiciouslySmall(u64),
    /// The probe failed with a recognised diagnostic
    Diagnostic {
        kind: DiagnosticKind,
        raw: String,
    },
    /// The probe failed with an unrecognised diagnostic (first line, truncated)
    ProbeError(String),
    /// The probe failed without saying why
    ProbeFailed,
    /// The probe did not finish in time
    ProbeTimeout,
    /// The probe reported no usable duration
    NoDuration,
    /// The duration field is not a number
    InvalidDuration(String),
    /// The duration is below the minimum
    VeryShortDuration(String),
    /// The probe could not be run for this file
    CheckFailed(String),
}

impl Issue {
    /// Short, stable classification label
    pub fn kind(&self) -> &'static str {
        match self {
            Issue::NotReadable => "not readable",
            Issue::CannotStat(_) => "cannot stat",
            Issue::EmptyFile => "empty file",
            Issue::SuspiciouslySmall(_) => "suspiciously small",
            Issue::Diagnostic { kind, .. } => kind.as_str(),
            Issue::ProbeError(_) => "probe error",
            Issue::ProbeFailed => "probe failed",
            Issue::ProbeTimeout => "probe timeout",
            Issue::NoDuration => "no duration",
            Issue::InvalidDuration(_) => "invalid duration value",
            Issue::VeryShortDuration(_) => "very short duration",
            Issue::CheckFailed(_) => "check failed",
        }
    }

    /// Raw detail text behind the classification
    pub fn detail(&self) -> Option<&str> {
        match self {
            Issue::CannotStat(d)
            | Issue::ProbeError(d)
            | Issue::InvalidDuration(d)
            | Issue::VeryShortDuration(d)
            | Issue::CheckFailed(d) => Some(d.as_str()),
            Issue::Diagnostic { raw, .. } => Some(raw.as_str()),
            _ => None,
        }
    }

    /// Whether this issue stops any further checks on the file
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Issue::NotReadable | Issue::CannotStat(_) | Issue::EmptyFile
        )
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::NotReadable => write!(f, "not readable (permission denied)"),
            Issue::CannotStat(e) => write!(f, "cannot stat: {}", e),
            Issue::EmptyFile => write!(f, "empty file (0 bytes)"),
            Issue::SuspiciouslySmall(n) => write!(f, "suspiciously small ({} bytes)", n),
            Issue::Diagnostic { kind, .. } => write!(f, "{}", kind.as_str()),
            Issue::ProbeError(line) => write!(f, "{}", line),
            Issue::ProbeFailed => write!(f, "probe failed (unknown reason)"),
            Issue::ProbeTimeout => write!(f, "probe timeout (file may be corrupted)"),
            Issue::NoDuration => write!(f, "no duration (possibly corrupted)"),
            Issue::InvalidDuration(raw) => write!(f, "invalid duration value: {}", raw),
            Issue::VeryShortDuration(raw) => write!(f, "very short duration ({}s)", raw),
            Issue::CheckFailed(e) => write!(f, "check failed: {}", e),
        }
    }
}

impl Serialize for Issue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Issue", 3)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("detail", &self.detail())?;
        state.end()
    }
}

/// A file together with the issues found on it
#[derive(Debug, Clone, Serialize)]
pub struct InvalidFile {
    pub file: MediaFile,
    pub issues: Vec<Issue>,
}

/// Result of a validity scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidityReport {
    /// Scan root
    pub root: PathBuf,
    /// Number of candidate files examined
    pub total_files: u64,
    /// Files with at least one issue, sorted by path
    pub invalid: Vec<InvalidFile>,
    /// Total scan duration in milliseconds
    pub duration_ms: u64,
}

impl ValidityReport {
    /// Number of files with issues
    pub fn invalid_count(&self) -> usize {
        self.invalid.len()
    }

    /// Whether every examined file was valid
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// A file paired with its quality score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFile {
    pub file: MediaFile,
    pub score: f64,
}

/// A set of same-directory duplicates with one file to keep
///
/// Always holds exactly one keeper and at least one file to remove, and
/// `remove` is ordered by descending score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub keep: ScoredFile,
    pub remove: Vec<ScoredFile>,
}

impl DuplicateGroup {
    /// Directory shared by every file in the group
    pub fn directory(&self) -> &Path {
        &self.keep.file.directory
    }

    /// Total bytes held by the files marked for removal
    pub fn removable_bytes(&self) -> u64 {
        self.remove.iter().map(|s| s.file.size).sum()
    }
}

/// Result of a duplicate search
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupReport {
    /// Scan root
    pub root: PathBuf,
    /// Number of candidate files examined
    pub total_files: u64,
    /// Duplicate groups, in directory order
    pub groups: Vec<DuplicateGroup>,
}

impl DedupReport {
    /// Number of files marked for removal across all groups
    pub fn removable_files(&self) -> usize {
        self.groups.iter().map(|g| g.remove.len()).sum()
    }

    /// Bytes held by files marked for removal across all groups
    pub fn removable_bytes(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::removable_bytes).sum()
    }
}
