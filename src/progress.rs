//! Progress reporting module for triage runs
//!
//! Progress is written to stderr as one JSON object per line so a wrapping
//! tool can follow a long scan. The reporter is shared by all probe workers.

use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::error::ScanError;

/// Default minimum interval between progress messages
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// Run phase indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    /// Probing candidates for validity
    Check,
    /// Grouping candidates into duplicate sets
    Group,
}

/// Start message sent when a run begins
#[derive(Debug, Clone, Serialize)]
pub struct StartMessage {
    /// Message type identifier
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Scan root
    pub root: String,
    /// Phase the run starts in
    pub phase: ScanPhase,
    /// Number of candidate files
    pub total: u64,
    /// Number of workers
    pub workers: usize,
}

/// Progress message sent during a run
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMessage {
    /// Message type identifier ("p" for progress)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Current phase
    pub phase: ScanPhase,
    /// Number of files processed
    #[serde(rename = "f")]
    pub done: u64,
    /// Number of candidate files
    #[serde(rename = "t")]
    pub total: u64,
    /// Number of files with issues so far
    #[serde(rename = "x")]
    pub flagged: u64,
    /// Estimated remaining time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_ms: Option<u64>,
}

/// Error message sent when a non-fatal error occurs
#[derive(Debug, Clone, Serialize)]
pub struct ErrorProgressMessage {
    /// Message type identifier ("err" for error)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Error type/category
    pub error_type: String,
    /// Error message description
    pub message: String,
    /// Path that caused the error (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Done message sent when a run completes
#[derive(Debug, Clone, Serialize)]
pub struct DoneMessage {
    /// Message type identifier ("done" for completion)
    #[serde(rename = "_t")]
    pub msg_type: &'static str,
    /// Sequence number
    pub seq: u64,
    /// Timestamp in milliseconds since reporter creation
    pub ts: u64,
    /// Total number of files examined
    #[serde(rename = "tf")]
    pub total_files: u64,
    /// Number of files flagged (invalid, or marked for removal)
    #[serde(rename = "ff")]
    pub flagged_files: u64,
    /// Total run duration in milliseconds
    pub ms: u64,
}

/// Estimate remaining time from the current rate
pub fn estimate_remaining_ms(done: u64, total: u64, elapsed_ms: u64) -> Option<u64> {
    if done == 0 || elapsed_ms == 0 {
        return None;
    }
    let rate = done as f64 / elapsed_ms as f64;
    let remaining = total.saturating_sub(done);
    Some((remaining as f64 / rate) as u64)
}

/// Progress reporter for outputting run progress to stderr
pub struct ProgressReporter {
    /// Whether progress reporting is enabled
    enabled: bool,
    /// Reporting interval in milliseconds
    interval_ms: u64,
    /// Last report time
    last_report: Mutex<Instant>,
    /// Sequence number for messages
    seq: AtomicU64,
    /// Start time of the reporter
    start_time: Instant,
}

impl ProgressReporter {
    /// Create a new ProgressReporter
    ///
    /// # Arguments
    /// * `enabled` - Whether progress reporting is enabled
    /// * `interval_ms` - Minimum interval between progress messages in milliseconds
    pub fn new(enabled: bool, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            interval_ms,
            last_report: Mutex::new(now),
            seq: AtomicU64::new(0),
            start_time: now,
        }
    }

    /// A reporter that never prints
    pub fn disabled() -> Self {
        Self::new(false, DEFAULT_INTERVAL_MS)
    }

    /// Claim the next report slot if the interval has elapsed.
    ///
    /// Only one of several concurrent callers wins a given slot.
    pub fn should_report(&self) -> bool {
        if !self.enabled {
            return false;
        }
        let mut last = match self.last_report.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if last.elapsed().as_millis() as u64 >= self.interval_ms {
            *last = Instant::now();
            true
        } else {
            false
        }
    }

    /// Get the next sequence number (monotonically increasing)
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Get the current timestamp in milliseconds since reporter creation
    pub fn current_timestamp(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Output a serializable message to stderr as JSON
    pub fn output_to_stderr<T: Serialize>(&self, msg: &T) {
        if let Ok(json) = serde_json::to_string(msg) {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "{}", json).ok();
            stderr.flush().ok();
        }
    }

    /// Report the start of a phase
    pub fn report_start(&self, root: &Path, phase: ScanPhase, total: u64, workers: usize) {
        if !self.enabled {
            return;
        }

        let msg = StartMessage {
            msg_type: "start",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            root: root.to_string_lossy().to_string(),
            phase,
            total,
            workers,
        };
        self.output_to_stderr(&msg);
    }

    /// Report progress, respecting the interval.
    ///
    /// Returns true if a message was actually sent.
    pub fn report_progress(&self, phase: ScanPhase, done: u64, total: u64, flagged: u64) -> bool {
        if !self.should_report() {
            return false;
        }

        let ts = self.current_timestamp();
        let msg = ProgressMessage {
            msg_type: "p",
            seq: self.next_seq(),
            ts,
            phase,
            done,
            total,
            flagged,
            eta_ms: estimate_remaining_ms(done, total, ts),
        };
        self.output_to_stderr(&msg);
        true
    }

    /// Report a non-fatal error immediately (ignores interval timing)
    pub fn report_error(&self, error: &ScanError) {
        if !self.enabled {
            return;
        }

        let msg = ErrorProgressMessage {
            msg_type: "err",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            error_type: format!("{:?}", error.kind),
            message: error.message.clone(),
            path: error.path.as_ref().map(|p| p.to_string_lossy().to_string()),
        };
        self.output_to_stderr(&msg);
    }

    /// Report run completion
    pub fn report_done(&self, total_files: u64, flagged_files: u64, ms: u64) {
        if !self.enabled {
            return;
        }

        let msg = DoneMessage {
            msg_type: "done",
            seq: self.next_seq(),
            ts: self.current_timestamp(),
            total_files,
            flagged_files,
            ms,
        };
        self.output_to_stderr(&msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_phase_serialization() {
        assert_eq!(serde_json::to_string(&ScanPhase::Check).unwrap(), "\"check\"");
        assert_eq!(serde_json::to_string(&ScanPhase::Group).unwrap(), "\"group\"");
    }

    #[test]
    fn test_progress_message_serialization() {
        let msg = ProgressMessage {
            msg_type: "p",
            seq: 2,
            ts: 200,
            phase: ScanPhase::Check,
            done: 100,
            total: 400,
            flagged: 3,
            eta_ms: Some(600),
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();

        assert_eq!(parsed["_t"], "p");
        assert_eq!(parsed["phase"], "check");
        assert_eq!(parsed["f"], 100);
        assert_eq!(parsed["t"], 400);
        assert_eq!(parsed["x"], 3);
        assert_eq!(parsed["eta_ms"], 600);
    }

    #[test]
    fn test_progress_message_without_eta() {
        let msg = ProgressMessage {
            msg_type: "p",
            seq: 0,
            ts: 0,
            phase: ScanPhase::Check,
            done: 0,
            total: 10,
            flagged: 0,
            eta_ms: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("eta_ms"));
    }

    #[test]
    fn test_done_message_serialization() {
        let msg = DoneMessage {
            msg_type: "done",
            seq: 10,
            ts: 5000,
            total_files: 1000,
            flagged_files: 12,
            ms: 4500,
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(parsed["_t"], "done");
        assert_eq!(parsed["tf"], 1000);
        assert_eq!(parsed["ff"], 12);
    }

    #[test]
    fn test_estimate_remaining() {
        // 100 files in 1000ms, 900 left
        assert_eq!(estimate_remaining_ms(100, 1000, 1000), Some(9000));
        assert_eq!(estimate_remaining_ms(0, 1000, 1000), None);
    }

    #[test]
    fn test_reporter_sequence_numbers() {
        let reporter = ProgressReporter::new(true, 200);
        assert_eq!(reporter.next_seq(), 0);
        assert_eq!(reporter.next_seq(), 1);
        assert_eq!(reporter.next_seq(), 2);
    }

    #[test]
    fn test_disabled_reporter_is_silent() {
        let reporter = ProgressReporter::disabled();
        assert!(!reporter.should_report());
        assert!(!reporter.report_progress(ScanPhase::Check, 1, 2, 0));
        reporter.report_start(Path::new("/m"), ScanPhase::Check, 2, 4);
        reporter.report_done(2, 0, 10);
        // Nothing was emitted, so no sequence numbers were consumed
        assert_eq!(reporter.next_seq(), 0);
    }

    #[test]
    fn test_should_report_timing() {
        let reporter = ProgressReporter::new(true, 100);
        assert!(!reporter.should_report());
        std::thread::sleep(std::time::Duration::from_millis(150));
        assert!(reporter.should_report());
        // The slot was claimed, so an immediate second call loses
        assert!(!reporter.should_report());
    }
}
