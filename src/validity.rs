//! Validity scanner - flags truncated, corrupted and structurally invalid files

use rayon::prelude::*;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::models::{DiagnosticKind, InvalidFile, Issue, MediaFile, ValidityReport};
use crate::probe::{parse_duration_field, Probe, ProbeError, ProbeOutcome};
use crate::progress::{ProgressReporter, ScanPhase};
use crate::walk;

/// Longest fallback diagnostic kept in an issue, in characters
const MAX_DIAGNOSTIC_CHARS: usize = 100;

/// Diagnostic substrings and the issue they map to, checked in order
const DIAGNOSTIC_RULES: &[(&str, DiagnosticKind)] = &[
    ("Invalid data", DiagnosticKind::InvalidData),
    ("End of file", DiagnosticKind::Truncated),
    ("Header missing", DiagnosticKind::MissingHeader),
    ("Could not find codec", DiagnosticKind::UnknownCodec),
];

/// Map probe diagnostic text to a single issue
pub fn classify_diagnostic(stderr: &str) -> Issue {
    let text = stderr.trim();
    if text.is_empty() {
        return Issue::ProbeFailed;
    }
    for (needle, kind) in DIAGNOSTIC_RULES {
        if text.contains(needle) {
            return Issue::Diagnostic {
                kind: *kind,
                raw: text.to_string(),
            };
        }
    }
    let first_line = text.lines().next().unwrap_or_default();
    Issue::ProbeError(first_line.chars().take(MAX_DIAGNOSTIC_CHARS).collect())
}

/// Check the duration reported by a successful probe
pub fn check_duration(stdout: &str, min_duration_secs: f64) -> Option<Issue> {
    let raw = match parse_duration_field(stdout) {
        None | Some("") | Some("N/A") => return Some(Issue::NoDuration),
        Some(raw) => raw,
    };
    match raw.parse::<f64>() {
        Err(_) => Some(Issue::InvalidDuration(raw.to_string())),
        Ok(duration) if duration < min_duration_secs => {
            Some(Issue::VeryShortDuration(raw.to_string()))
        }
        Ok(_) => None,
    }
}

/// Filesystem checks that run before the file is probed
fn check_filesystem(path: &Path, config: &ScanConfig) -> (MediaFile, Vec<Issue>) {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return (MediaFile::new(path.to_path_buf(), 0), vec![Issue::NotReadable]);
        }
        Err(e) => {
            return (
                MediaFile::new(path.to_path_buf(), 0),
                vec![Issue::CannotStat(e.to_string())],
            );
        }
    };
    let file = MediaFile::new(path.to_path_buf(), metadata.len());

    if File::open(path).is_err() {
        return (file, vec![Issue::NotReadable]);
    }
    if file.size == 0 {
        return (file, vec![Issue::EmptyFile]);
    }
    if file.size < config.small_file_threshold {
        let size = file.size;
        return (file, vec![Issue::SuspiciouslySmall(size)]);
    }
    (file, Vec::new())
}

/// Run the per-file checks on one candidate.
///
/// Only a missing probe tool is an error; everything else wrong with the
/// file comes back as issues.
pub fn classify_file(
    path: &Path,
    config: &ScanConfig,
    probe: &dyn Probe,
) -> Result<(MediaFile, Vec<Issue>), ScanError> {
    let (file, mut issues) = check_filesystem(path, config);
    if issues.iter().any(Issue::is_terminal) {
        return Ok((file, issues));
    }

    match probe.probe(path) {
        Ok(ProbeOutcome::TimedOut) => issues.push(Issue::ProbeTimeout),
        Ok(ProbeOutcome::Completed {
            success: false,
            stderr,
            ..
        }) => issues.push(classify_diagnostic(&stderr)),
        Ok(ProbeOutcome::Completed {
            success: true,
            stdout,
            ..
        }) => issues.extend(check_duration(&stdout, config.min_duration_secs)),
        Err(ProbeError::Unavailable { program, .. }) => {
            return Err(ScanError::probe_unavailable(&program));
        }
        Err(ProbeError::Io(e)) => issues.push(Issue::CheckFailed(e.to_string())),
    }

    Ok((file, issues))
}

/// Scan the configured root and classify every candidate file.
///
/// Files are probed concurrently by `config.effective_threads()` workers.
/// The invalid list is sorted by path, so the report does not depend on
/// completion order or worker count. A missing probe aborts the scan and
/// stops further files from being dispatched.
pub fn scan_validity(
    config: &ScanConfig,
    probe: &dyn Probe,
    reporter: &ProgressReporter,
) -> Result<ValidityReport, ScanError> {
    let start = Instant::now();
    log::info!("Scanning {} for media files...", config.root.display());
    let candidates = walk::collect_candidates(config)?;
    let total = candidates.len() as u64;
    let workers = config.effective_threads();

    log::info!("Found {} media files. Checking with {} workers...", total, workers);
    reporter.report_start(&config.root, ScanPhase::Check, total, workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("probe-{}", i))
        .build()
        .map_err(|e| ScanError::thread_pool(e.to_string()))?;

    let checked = AtomicU64::new(0);
    let flagged = AtomicU64::new(0);
    let invalid: Mutex<Vec<InvalidFile>> = Mutex::new(Vec::new());
    let log_every = (total / 20).max(1);

    pool.install(|| {
        candidates.par_iter().try_for_each(|path| {
            let (file, issues) = classify_file(path, config, probe)?;
            if !issues.is_empty() {
                log::debug!("{}: {} issue(s)", file.path.display(), issues.len());
                flagged.fetch_add(1, Ordering::Relaxed);
                invalid
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(InvalidFile { file, issues });
            }

            let done = checked.fetch_add(1, Ordering::Relaxed) + 1;
            if done % log_every == 0 || done == total {
                log::info!("Progress: {}/{} ({}%)", done, total, done * 100 / total);
            }
            reporter.report_progress(
                ScanPhase::Check,
                done,
                total,
                flagged.load(Ordering::Relaxed),
            );
            Ok::<(), ScanError>(())
        })
    })?;

    let mut invalid = invalid.into_inner().unwrap_or_else(PoisonError::into_inner);
    invalid.sort_by(|a, b| a.file.path.cmp(&b.file.path));

    let duration_ms = start.elapsed().as_millis() as u64;
    reporter.report_done(total, invalid.len() as u64, duration_ms);

    Ok(ValidityReport {
        root: config.root.clone(),
        total_files: total,
        invalid,
        duration_ms,
    })
}
