//! Media Triage CLI
//!
//! Finds corrupted media files and same-folder duplicate tracks.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use media_triage::config::DEFAULT_QUARANTINE_DIR_NAME;
use media_triage::progress::DEFAULT_INTERVAL_MS;
use media_triage::{
    dedup, report, validity, ActionExecutor, ActionMode, ActionSummary, AuditLog, FfprobeAdapter,
    ProgressReporter, ScanConfig,
};

const ABOUT: &str = r#"
Media Triage - find corrupted media files and duplicate tracks

Examples:
  media_triage check /media                      report invalid files
  media_triage check /music --audio-only -j 8    audio only, 8 probe workers
  media_triage check /media --move-invalid /q    move invalid files to /q
  media_triage dedup /music                      dry run, list duplicates
  media_triage dedup /music --quarantine         move duplicates to .trash-dedup
"#;

/// Exit status for fatal errors (bad root, missing probe)
const EXIT_FATAL: u8 = 2;

/// Find corrupted media files and duplicate tracks
#[derive(Parser)]
#[command(name = "media_triage")]
#[command(author, version, about = ABOUT, long_about = None)]
#[command(help_template = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check media files for corruption using ffprobe
    Check {
        /// Directory to scan
        path: PathBuf,

        /// Number of parallel probe workers
        #[arg(short = 'j', long, default_value = "4")]
        workers: usize,

        /// Write report to file
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Only check audio files
        #[arg(long, conflicts_with = "video_only")]
        audio_only: bool,

        /// Only check video files
        #[arg(long)]
        video_only: bool,

        /// Move invalid files to this directory
        #[arg(long, value_name = "DIR", conflicts_with = "delete_invalid")]
        move_invalid: Option<PathBuf>,

        /// Delete invalid files (asks for confirmation)
        #[arg(long)]
        delete_invalid: bool,

        /// Per-file probe timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Probe program to run
        #[arg(long, default_value = "ffprobe")]
        probe: String,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,

        /// Emit JSON progress lines on stderr
        #[arg(long)]
        progress: bool,
    },

    /// Find duplicate audio files in the same folder and keep the best copy
    Dedup {
        /// Music directory to scan
        path: PathBuf,

        /// Move duplicates to the quarantine folder (default is a dry run)
        #[arg(long)]
        quarantine: bool,

        /// Quarantine folder (default: <path>/.trash-dedup)
        #[arg(long, value_name = "DIR")]
        quarantine_dir: Option<PathBuf>,

        /// Write report to file
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,

        /// Emit JSON progress lines on stderr
        #[arg(long)]
        progress: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check {
            path,
            workers,
            output,
            audio_only,
            video_only,
            move_invalid,
            delete_invalid,
            timeout,
            probe,
            json,
            progress,
        }) => {
            let mut builder = ScanConfig::builder()
                .root(&path)
                .num_threads(workers)
                .probe_program(probe)
                .probe_timeout(Duration::from_secs(timeout));
            if audio_only {
                builder = builder.audio_only();
            } else if video_only {
                builder = builder.video_only();
            }
            if let Some(dir) = &move_invalid {
                builder = builder.quarantine_dir(dir);
            }
            let config = builder.build();
            let disposal = if move_invalid.is_some() {
                Disposal::Move
            } else if delete_invalid {
                Disposal::Delete
            } else {
                Disposal::Keep
            };
            run_check(&config, output.as_deref(), disposal, json, progress)
        }
        Some(Commands::Dedup {
            path,
            quarantine,
            quarantine_dir,
            output,
            json,
            progress,
        }) => {
            let quarantine_dir =
                quarantine_dir.unwrap_or_else(|| path.join(DEFAULT_QUARANTINE_DIR_NAME));
            let config = ScanConfig::builder()
                .root(&path)
                .dedup_audio()
                .quarantine_dir(&quarantine_dir)
                .build();
            let mode = if quarantine {
                ActionMode::Quarantine
            } else {
                ActionMode::DryRun
            };
            run_dedup(&config, mode, output.as_deref(), json, progress)
        }
        None => {
            println!("{}", ABOUT);
            println!("Run 'media_triage --help' for all options");
            ExitCode::SUCCESS
        }
    }
}

/// What to do with invalid files after a check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposal {
    Keep,
    Move,
    Delete,
}

fn fatal(err: impl std::fmt::Display) -> ExitCode {
    error!("{}", err);
    eprintln!("Error: {}", err);
    ExitCode::from(EXIT_FATAL)
}

fn reporter(enabled: bool) -> ProgressReporter {
    ProgressReporter::new(enabled, DEFAULT_INTERVAL_MS)
}

fn run_check(
    config: &ScanConfig,
    output: Option<&Path>,
    disposal: Disposal,
    json: bool,
    progress: bool,
) -> ExitCode {
    let probe = FfprobeAdapter::new(config.probe_program.clone(), config.probe_timeout);
    let result = match validity::scan_validity(config, &probe, &reporter(progress)) {
        Ok(result) => result,
        Err(e) => return fatal(e.message),
    };

    let text = if json {
        match report::format_json(&result) {
            Ok(text) => text,
            Err(e) => return fatal(e),
        }
    } else {
        report::format_validity(&result)
    };
    if let Err(e) = report::write_report(&text, output) {
        return fatal(e);
    }

    if result.is_clean() {
        return ExitCode::SUCCESS;
    }

    let executor = match disposal {
        Disposal::Keep => None,
        Disposal::Move => {
            let Some(dir) = config.quarantine_dir.as_deref() else {
                return fatal("no quarantine directory configured");
            };
            info!("Moving {} invalid files to {}...", result.invalid_count(), dir.display());
            match AuditLog::create(dir, "media-check", &config.root) {
                Ok(log) => Some(
                    ActionExecutor::new(&config.root, dir, ActionMode::Quarantine)
                        .with_audit_log(log),
                ),
                Err(e) => return fatal(format!("cannot create {}: {}", dir.display(), e)),
            }
        }
        Disposal::Delete => {
            let stdin = io::stdin();
            let confirmed = confirm_deletion(
                result.invalid_count(),
                &mut stdin.lock(),
                &mut io::stderr(),
            );
            match confirmed {
                Ok(true) => match AuditLog::create(&config.root, "media-check", &config.root) {
                    Ok(log) => Some(
                        ActionExecutor::new(&config.root, &config.root, ActionMode::Delete)
                            .with_audit_log(log),
                    ),
                    Err(e) => return fatal(e),
                },
                Ok(false) => {
                    info!("Deletion cancelled");
                    None
                }
                Err(e) => return fatal(e),
            }
        }
    };

    if let Some(executor) = executor {
        let mut summary = ActionSummary::default();
        for invalid in &result.invalid {
            summary.merge(&executor.remove_file(&invalid.file.path, invalid.file.size, None));
        }
        log_summary(&summary, &executor);
    }

    ExitCode::from(1)
}

fn run_dedup(
    config: &ScanConfig,
    mode: ActionMode,
    output: Option<&Path>,
    json: bool,
    progress: bool,
) -> ExitCode {
    let result = match dedup::find_duplicates(config, &reporter(progress)) {
        Ok(result) => result,
        Err(e) => return fatal(e.message),
    };

    let text = if json {
        match report::format_json(&result) {
            Ok(text) => text,
            Err(e) => return fatal(e),
        }
    } else {
        report::format_dedup(&result, mode == ActionMode::DryRun)
    };
    if let Err(e) = report::write_report(&text, output) {
        return fatal(e);
    }

    if result.groups.is_empty() {
        return ExitCode::SUCCESS;
    }

    let Some(quarantine_dir) = config.quarantine_dir.as_deref() else {
        return fatal("no quarantine directory configured");
    };
    let mut executor = ActionExecutor::new(&config.root, quarantine_dir, mode);
    if mode.is_destructive() {
        if let Err(e) = std::fs::create_dir_all(quarantine_dir) {
            return fatal(format!("cannot create {}: {}", quarantine_dir.display(), e));
        }
        match AuditLog::create(&config.root, "dedup", &config.root) {
            Ok(log) => executor = executor.with_audit_log(log),
            Err(e) => return fatal(e),
        }
    }

    let summary = executor.apply_all(&result.groups);
    log_summary(&summary, &executor);
    if mode == ActionMode::DryRun {
        info!("This was a DRY RUN. Run with --quarantine to move files to the quarantine folder.");
    } else {
        info!("Files moved to: {}", quarantine_dir.display());
        info!("Review and delete the quarantine folder when satisfied.");
    }
    ExitCode::SUCCESS
}

fn log_summary(summary: &ActionSummary, executor: &ActionExecutor) {
    info!(
        "Done: {} planned, {} moved, {} deleted, {} failed ({:.1} MB)",
        summary.planned,
        summary.moved,
        summary.deleted,
        summary.failed,
        summary.bytes as f64 / (1024.0 * 1024.0)
    );
    if let Some(path) = executor.audit_log_path() {
        info!("Log saved to: {}", path.display());
    }
}

/// Ask before a permanent delete; only an exact `yes` confirms
fn confirm_deletion<R: BufRead, W: Write>(
    count: usize,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    write!(output, "Delete {} files? Type 'yes' to confirm: ", count)?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}
