//! Unattended triage of media libraries
//!
//! This library finds truncated or corrupted media files with a parallel
//! probe-driven scan, and finds same-folder duplicate audio tracks, choosing
//! the best copy to keep. Removal is always opt-in and goes through a
//! quarantine directory with an audit log.

pub mod actions;
pub mod config;
pub mod dedup;
pub mod error;
pub mod models;
pub mod probe;
pub mod progress;
pub mod quality;
pub mod report;
pub mod validity;
pub mod walk;

pub use actions::{ActionExecutor, ActionMode, ActionSummary, AuditLog};
pub use config::ScanConfig;
pub use dedup::{find_duplicates, names_are_duplicates, normalize_name};
pub use error::{ScanError, ScanErrorKind};
pub use models::{
    DedupReport, DuplicateGroup, InvalidFile, Issue, MediaFile, ScoredFile,
    ValidityReport,
};
pub use probe::{FfprobeAdapter, Probe, ProbeError, ProbeOutcome};
pub use progress::{ProgressReporter, ScanPhase};
pub use quality::{quality_score, rank_group};
pub use validity::{classify_file, scan_validity};
