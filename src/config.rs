//! Configuration for a triage run

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of probe workers
pub const DEFAULT_WORKERS: usize = 4;

/// Default per-file probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Files below this size (bytes) are flagged as suspiciously small
pub const DEFAULT_SMALL_FILE_THRESHOLD: u64 = 1000;

/// Durations below this (seconds) are flagged as very short
pub const DEFAULT_MIN_DURATION_SECS: f64 = 1.0;

/// Default probe program
pub const DEFAULT_PROBE_PROGRAM: &str = "ffprobe";

/// Name of the quarantine directory created under the scan root by dedup runs
pub const DEFAULT_QUARANTINE_DIR_NAME: &str = ".trash-dedup";

/// Configuration for the scanner and the duplicate grouper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Root directory to scan
    pub root: PathBuf,

    /// File extensions to include (lowercase, without dot)
    pub extensions: HashSet<String>,

    /// Directory names to prune from the walk
    pub ignore_dirs: HashSet<String>,

    /// Number of probe workers
    /// 0 means auto-detect (CPU cores)
    pub num_threads: usize,

    /// Program used to probe media files
    pub probe_program: String,

    /// Per-file probe timeout
    pub probe_timeout: Duration,

    /// Files smaller than this many bytes get a "suspiciously small" issue
    pub small_file_threshold: u64,

    /// Durations shorter than this many seconds get a "very short" issue
    pub min_duration_secs: f64,

    /// Quarantine directory to exclude from the walk, if it lives under the root
    pub quarantine_dir: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            extensions: Self::default_extensions(),
            ignore_dirs: Self::default_ignore_dirs(),
            num_threads: DEFAULT_WORKERS,
            probe_program: DEFAULT_PROBE_PROGRAM.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            small_file_threshold: DEFAULT_SMALL_FILE_THRESHOLD,
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            quarantine_dir: None,
        }
    }
}

fn to_set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl ScanConfig {
    /// Create a new config for the given root
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    /// Create a config builder
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }

    /// Get the audio extensions checked for validity
    pub fn default_audio_extensions() -> HashSet<String> {
        to_set(&[
            "mp3", "flac", "m4a", "aac", "ogg", "opus", "wma", "wav", "aiff", "ape", "wv",
        ])
    }

    /// Get the video extensions checked for validity
    pub fn default_video_extensions() -> HashSet<String> {
        to_set(&[
            "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpeg", "mpg", "ts", "vob",
        ])
    }

    /// Get all media extensions
    pub fn default_extensions() -> HashSet<String> {
        let mut extensions = Self::default_audio_extensions();
        extensions.extend(Self::default_video_extensions());
        extensions
    }

    /// Get the audio extensions considered by duplicate detection
    pub fn default_dedup_extensions() -> HashSet<String> {
        to_set(&["mp3", "flac", "m4a", "ogg", "wav", "wma", "aac"])
    }

    /// Get the default directories to ignore
    pub fn default_ignore_dirs() -> HashSet<String> {
        to_set(&[
            "$RECYCLE.BIN",
            "System Volume Information",
            "@eaDir",
            DEFAULT_QUARANTINE_DIR_NAME,
        ])
    }

    /// Check if an extension should be included
    pub fn should_include_extension(&self, ext: &str) -> bool {
        self.extensions.contains(&ext.to_lowercase())
    }

    /// Check if a directory should be pruned from the walk
    pub fn should_ignore_dir(&self, name: &str) -> bool {
        // Hidden directories (starting with .), which also covers .trash-* quarantine output
        if name.starts_with('.') {
            return true;
        }
        self.ignore_dirs.contains(name)
    }

    /// Check if a path is the configured quarantine directory
    ///
    /// Paths are compared as written first. When only the final component
    /// agrees, both sides are resolved so a relative or `..` spelling still
    /// matches the walked path.
    pub fn is_quarantine_dir(&self, path: &Path) -> bool {
        let Some(quarantine) = self.quarantine_dir.as_deref() else {
            return false;
        };
        if quarantine == path {
            return true;
        }
        if quarantine.file_name() != path.file_name() {
            return false;
        }
        match (std::fs::canonicalize(quarantine), std::fs::canonicalize(path)) {
            (Ok(resolved), Ok(walked)) => resolved == walked,
            _ => false,
        }
    }

    /// Get the effective number of worker threads
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(DEFAULT_WORKERS)
        } else {
            self.num_threads
        }
    }
}

/// Builder for ScanConfig
#[derive(Debug, Default)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root directory
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Set only audio extensions
    pub fn audio_only(mut self) -> Self {
        self.config.extensions = ScanConfig::default_audio_extensions();
        self
    }

    /// Set only video extensions
    pub fn video_only(mut self) -> Self {
        self.config.extensions = ScanConfig::default_video_extensions();
        self
    }

    /// Set the extensions used for duplicate detection
    pub fn dedup_audio(mut self) -> Self {
        self.config.extensions = ScanConfig::default_dedup_extensions();
        self
    }

    /// Set the number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Set the probe program
    pub fn probe_program(mut self, program: impl Into<String>) -> Self {
        self.config.probe_program = program.into();
        self
    }

    /// Set the probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the quarantine directory
    pub fn quarantine_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.quarantine_dir = Some(dir.into());
        self
    }

    /// Build the config
    pub fn build(self) -> ScanConfig {
        self.config
    }
}
