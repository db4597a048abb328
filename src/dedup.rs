//! Duplicate grouper - finds same-folder copies of one logical track
//!
//! Matching is deliberately conservative: a missed duplicate is acceptable,
//! a false match is not. Groups never span directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::models::{DedupReport, DuplicateGroup, MediaFile};
use crate::progress::{ProgressReporter, ScanPhase};
use crate::quality;
use crate::walk;

/// Words that mark a distinct recording of the same song
pub const VERSION_MARKERS: &[&str] = &[
    "live",
    "acoustic",
    "remix",
    "remaster",
    "demo",
    "edit",
    "version",
    "mix",
    "radio",
    "extended",
    "instrumental",
    "reprise",
];

/// Maximum length difference (in characters) for a substring match
const MAX_SUBSTRING_LEN_DIFF: usize = 5;

/// Undecodable name bytes map onto U+F780..=U+F87F (private use)
const UNDECODABLE_BYTE_BASE: u32 = 0xF780;

/// Comparable form of a file's name.
///
/// Bytes that are not valid UTF-8 map one-to-one onto private-use
/// characters, so names that differ only in such bytes stay distinct.
fn comparable_name(file: &MediaFile) -> String {
    let raw = file.path.file_name().unwrap_or_default().as_encoded_bytes();
    let mut name = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        name.push_str(chunk.valid());
        name.extend(
            chunk
                .invalid()
                .iter()
                .filter_map(|&b| char::from_u32(UNDECODABLE_BYTE_BASE + u32::from(b))),
        );
    }
    name
}

/// Normalize a name for comparison.
///
/// Lowercases, turns runs of `-`/`_` into a single space, collapses
/// whitespace and trims. Never removes words.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for c in lowered.chars() {
        if c == '-' || c == '_' || c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Normalize a file name: drop the extension, then [`normalize_name`]
pub fn normalize_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    normalize_name(stem)
}

/// Parse a leading track number such as the `01` in `01 - Song.mp3`.
///
/// The digits must be followed by a space, `-`, `_` or `.`.
pub fn extract_track_number(file_name: &str) -> Option<u64> {
    let digits_end = file_name
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(file_name.len());
    if digits_end == 0 {
        return None;
    }
    let next = file_name[digits_end..].chars().next()?;
    if !(next.is_whitespace() || matches!(next, '-' | '_' | '.')) {
        return None;
    }
    file_name[..digits_end].parse().ok()
}

/// Remove leading digits and the whitespace after them from a normalized name
pub fn strip_track_number(normalized: &str) -> &str {
    normalized
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start()
}

/// Decide whether two file names denote the same track.
///
/// Rules, in order: differing track numbers never match; equal names after
/// stripping track numbers match; a version marker present in only one name
/// never matches; otherwise a substring within five characters matches.
///
/// A name that is nothing but a track number (`01.mp3`) strips to an empty
/// title, which is a substring of every name. It therefore matches any other
/// name of at most five characters with no conflicting track number.
pub fn names_are_duplicates(a: &str, b: &str) -> bool {
    if let (Some(ta), Some(tb)) = (extract_track_number(a), extract_track_number(b)) {
        if ta != tb {
            return false;
        }
    }

    let norm_a = normalize_file_name(a);
    let norm_b = normalize_file_name(b);
    let a = strip_track_number(&norm_a);
    let b = strip_track_number(&norm_b);

    if a == b {
        return true;
    }

    if VERSION_MARKERS
        .iter()
        .any(|marker| a.contains(marker) != b.contains(marker))
    {
        return false;
    }

    if a.contains(b) || b.contains(a) {
        let len_diff = a.chars().count().abs_diff(b.chars().count());
        return len_diff <= MAX_SUBSTRING_LEN_DIFF;
    }

    false
}

/// Cluster the files of one directory, in listing order.
///
/// The first unclaimed file seeds a cluster and every later unclaimed file
/// is compared against that seed only, never against other members, so
/// membership is not transitive. Single-file clusters are dropped.
pub fn cluster_directory(files: &[MediaFile]) -> Vec<Vec<MediaFile>> {
    let names: Vec<String> = files.iter().map(comparable_name).collect();
    let mut claimed = vec![false; files.len()];
    let mut clusters = Vec::new();

    for (i, seed) in files.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        let mut cluster = vec![seed.clone()];
        for (j, other) in files.iter().enumerate().skip(i + 1) {
            if claimed[j] {
                continue;
            }
            if names_are_duplicates(&names[i], &names[j]) {
                cluster.push(other.clone());
                claimed[j] = true;
            }
        }
        if cluster.len() > 1 {
            claimed[i] = true;
            clusters.push(cluster);
        }
    }

    clusters
}

/// Bucket files by containing directory, keeping listing order inside each bucket
pub fn group_by_directory(files: Vec<MediaFile>) -> BTreeMap<PathBuf, Vec<MediaFile>> {
    let mut buckets: BTreeMap<PathBuf, Vec<MediaFile>> = BTreeMap::new();
    for file in files {
        buckets.entry(file.directory.clone()).or_default().push(file);
    }
    buckets
}

/// Walk the configured root and return every duplicate group found
pub fn find_duplicates(
    config: &ScanConfig,
    reporter: &ProgressReporter,
) -> Result<DedupReport, ScanError> {
    log::info!("Scanning {}...", config.root.display());
    let candidates = walk::collect_candidates(config)?;

    let mut files = Vec::with_capacity(candidates.len());
    for path in candidates {
        match MediaFile::from_path(&path) {
            Ok(file) => {
                files.push(file);
                if files.len() % 1000 == 0 {
                    log::info!("  Scanned {} files...", files.len());
                }
            }
            Err(e) => {
                let err = ScanError::io_error(Some(path.clone()), e.to_string());
                log::warn!("Skipping {}: {}", path.display(), e);
                reporter.report_error(&err);
            }
        }
    }
    let total = files.len() as u64;
    log::info!("Scanned {} total files", total);

    let buckets = group_by_directory(files);
    reporter.report_start(&config.root, ScanPhase::Group, buckets.len() as u64, 1);

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut flagged = 0u64;
    for (done, (directory, files)) in buckets.iter().enumerate() {
        for cluster in cluster_directory(files) {
            if let Some(group) = quality::rank_group(cluster) {
                log::debug!(
                    "{}: keeping {} over {} file(s)",
                    directory.display(),
                    group.keep.file.file_name(),
                    group.remove.len()
                );
                flagged += group.remove.len() as u64;
                groups.push(group);
            }
        }
        reporter.report_progress(
            ScanPhase::Group,
            done as u64 + 1,
            buckets.len() as u64,
            flagged,
        );
    }

    reporter.report_done(total, flagged, reporter.current_timestamp());
    Ok(DedupReport {
        root: config.root.clone(),
        total_files: total,
        groups,
    })
}
