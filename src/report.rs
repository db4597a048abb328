//! Human-readable and JSON renderings of triage results

use std::io;
use std::path::Path;

use crate::models::{DedupReport, ValidityReport};

const RULE_WIDTH: usize = 50;

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Join report lines, ending with a newline
fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Render the validity report as plain text
pub fn format_validity(report: &ValidityReport) -> String {
    let mut lines = vec![
        "Media File Check Report".to_string(),
        "=".repeat(RULE_WIDTH),
        format!("Scanned: {}", report.root.display()),
        format!("Total files: {}", report.total_files),
        format!("Invalid files: {}", report.invalid_count()),
        String::new(),
    ];

    if report.is_clean() {
        lines.push("No invalid files found!".to_string());
        return finish(lines);
    }

    lines.push("Invalid Files:".to_string());
    lines.push("-".repeat(RULE_WIDTH));
    for invalid in &report.invalid {
        lines.push(String::new());
        lines.push(invalid.file.path.display().to_string());
        lines.extend(invalid.issues.iter().map(|issue| format!("  - {}", issue)));
    }
    finish(lines)
}

/// Render the duplicate report as plain text
pub fn format_dedup(report: &DedupReport, dry_run: bool) -> String {
    let mut lines = vec![
        format!("Scanned {} total files", report.total_files),
        String::new(),
    ];

    if report.groups.is_empty() {
        lines.push("No duplicates found!".to_string());
        return finish(lines);
    }

    lines.push(format!(
        "Found {} duplicate groups ({} files to remove)",
        report.groups.len(),
        report.removable_files()
    ));
    lines.push("=".repeat(60));

    let action = if dry_run { "Would remove" } else { "Remove" };
    for group in &report.groups {
        lines.push(String::new());
        lines.push(format!("Keeping: {}", group.keep.file.file_name()));
        lines.push(format!("  Path: {}", group.keep.file.path.display()));
        lines.push(format!("  Quality score: {:.1}", group.keep.score));
        lines.extend(group.remove.iter().map(|removed| {
            format!(
                "  {}: {} ({:.1} MB, score: {:.1})",
                action,
                removed.file.file_name(),
                mb(removed.file.size),
                removed.score
            )
        }));
    }

    lines.push("=".repeat(60));
    lines.push(format!(
        "Total: {} duplicate files, {:.1} MB",
        report.removable_files(),
        mb(report.removable_bytes())
    ));
    finish(lines)
}

/// Render any serializable report as pretty JSON
pub fn format_json<T: serde::Serialize>(report: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Write a rendered report to a file, or to stdout when no path is given
pub fn write_report(text: &str, output: Option<&Path>) -> io::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            log::info!("Report written to {}", path.display());
            Ok(())
        }
        None => {
            use std::io::Write;
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()
        }
    }
}
