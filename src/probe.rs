//! Probe adapter - runs the external media inspection tool on one file

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running probe is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What a probe invocation produced
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The tool exited on its own
    Completed {
        success: bool,
        stdout: String,
        stderr: String,
    },
    /// The tool was killed after the timeout elapsed
    TimedOut,
}

/// Errors raised while trying to run the probe
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe program is not installed; no file can be classified
    #[error("{program} not found")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// Running the probe failed for this file only
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Inspects a media file and reports how the inspection went
pub trait Probe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<ProbeOutcome, ProbeError>;
}

/// Probe backed by ffprobe (or a compatible program)
#[derive(Debug, Clone)]
pub struct FfprobeAdapter {
    program: String,
    timeout: Duration,
}

impl FfprobeAdapter {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn spawn(&self, path: &Path) -> Result<Child, ProbeError> {
        Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration,format_name",
                "-of",
                "default=noprint_wrappers=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::Unavailable {
                        program: self.program.clone(),
                        source: e,
                    }
                } else {
                    ProbeError::Io(e)
                }
            })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl Probe for FfprobeAdapter {
    fn probe(&self, path: &Path) -> Result<ProbeOutcome, ProbeError> {
        let mut child = self.spawn(path)?;

        // Pipes are drained on their own threads so a chatty probe cannot block on a full pipe
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if Instant::now() >= deadline {
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let Some(status) = status else {
            log::debug!("Probe timed out on {}", path.display());
            let _ = child.kill();
            let _ = child.wait();
            return Ok(ProbeOutcome::TimedOut);
        };

        Ok(ProbeOutcome::Completed {
            success: status.success(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

/// Extract the raw `duration=` value from probe output.
///
/// Returns `None` when the field is absent.
pub fn parse_duration_field(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("duration="))
        .map(str::trim)
}
