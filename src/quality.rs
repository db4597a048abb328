//! Quality ranker - scores duplicates and picks the copy to keep

use crate::models::{DuplicateGroup, MediaFile, ScoredFile};

/// Score for extensions missing from the format table
pub const UNKNOWN_FORMAT_QUALITY: f64 = 30.0;

/// Size bonus cap, in megabytes
pub const MAX_SIZE_BONUS: f64 = 20.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Base quality of a container format, higher is better
pub fn base_quality(extension: &str) -> f64 {
    match extension.to_lowercase().as_str() {
        "flac" => 100.0,
        "wav" => 95.0,
        "m4a" | "aac" => 80.0,
        "ogg" => 70.0,
        "mp3" => 60.0,
        "wma" => 50.0,
        _ => UNKNOWN_FORMAT_QUALITY,
    }
}

/// One point per megabyte, capped at [`MAX_SIZE_BONUS`]
pub fn size_bonus(size: u64) -> f64 {
    (size as f64 / BYTES_PER_MB).min(MAX_SIZE_BONUS)
}

pub fn quality_score(file: &MediaFile) -> f64 {
    base_quality(&file.extension) + size_bonus(file.size)
}

/// Score a set of duplicates and pick the keeper.
///
/// Files are ordered by descending score with a stable sort, so equal
/// scores keep their listing order and the earliest listed file wins a tie.
/// Returns `None` for fewer than two files.
pub fn rank_group(files: Vec<MediaFile>) -> Option<DuplicateGroup> {
    if files.len() < 2 {
        return None;
    }

    let mut scored: Vec<ScoredFile> = files
        .into_iter()
        .map(|file| ScoredFile {
            score: quality_score(&file),
            file,
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut scored = scored.into_iter();
    let keep = scored.next()?;
    Some(DuplicateGroup {
        keep,
        remove: scored.collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    const MB: u64 = 1024 * 1024;

    fn file(name: &str, size: u64) -> MediaFile {
        MediaFile::new(PathBuf::from("/music/Album").join(name), size)
    }

    #[test]
    fn test_base_quality_table() {
        assert_eq!(base_quality("flac"), 100.0);
        assert_eq!(base_quality("WAV"), 95.0);
        assert_eq!(base_quality("m4a"), 80.0);
        assert_eq!(base_quality("aac"), 80.0);
        assert_eq!(base_quality("ogg"), 70.0);
        assert_eq!(base_quality("mp3"), 60.0);
        assert_eq!(base_quality("wma"), 50.0);
        assert_eq!(base_quality("opus"), 30.0);
    }

    #[test]
    fn test_size_bonus_is_capped() {
        assert_eq!(size_bonus(0), 0.0);
        assert_eq!(size_bonus(5 * MB), 5.0);
        assert_eq!(size_bonus(20 * MB), 20.0);
        assert_eq!(size_bonus(400 * MB), 20.0);
    }

    #[test]
    fn test_flac_beats_larger_mp3() {
        let group = rank_group(vec![
            file("01 - Song.mp3", 12 * MB),
            file("01_song.flac", 3 * MB),
        ])
        .unwrap();
        assert_eq!(group.keep.file.file_name(), "01_song.flac");
        assert_eq!(group.keep.score, 103.0);
        assert_eq!(group.remove.len(), 1);
        assert_eq!(group.remove[0].score, 72.0);
    }

    #[test]
    fn test_remove_list_sorted_descending() {
        let group = rank_group(vec![
            file("a.wma", MB),
            file("a.mp3", MB),
            file("a.flac", MB),
            file("a.ogg", MB),
        ])
        .unwrap();
        let scores: Vec<f64> = group.remove.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![71.0, 61.0, 51.0]);
    }

    #[test]
    fn test_tie_keeps_listing_order() {
        let group = rank_group(vec![file("first.mp3", MB), file("second.mp3", MB)]).unwrap();
        assert_eq!(group.keep.file.file_name(), "first.mp3");
        assert_eq!(group.remove[0].file.file_name(), "second.mp3");
    }

    #[test]
    fn test_single_file_is_not_a_group() {
        assert!(rank_group(vec![file("only.mp3", MB)]).is_none());
        assert!(rank_group(Vec::new()).is_none());
    }

    proptest! {
        #[test]
        fn prop_keeper_scores_highest(
            entries in prop::collection::vec(
                (prop::sample::select(vec!["flac", "wav", "m4a", "ogg", "mp3", "wma", "xyz"]),
                 0u64..50 * MB),
                2..8,
            )
        ) {
            let files: Vec<MediaFile> = entries
                .iter()
                .enumerate()
                .map(|(i, (ext, size))| file(&format!("t{}.{}", i, ext), *size))
                .collect();
            let count = files.len();
            let group = rank_group(files).unwrap();
            prop_assert_eq!(group.remove.len() + 1, count);
            for removed in &group.remove {
                prop_assert!(group.keep.score >= removed.score);
            }
            for pair in group.remove.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }

        #[test]
        fn prop_score_monotonic_in_size(
            ext in prop::sample::select(vec!["flac", "mp3", "ogg", "unknown"]),
            a in 0u64..100 * MB,
            b in 0u64..100 * MB,
        ) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let s = quality_score(&file(&format!("x.{}", ext), small));
            let l = quality_score(&file(&format!("x.{}", ext), large));
            prop_assert!(l >= s);
            prop_assert!(l <= base_quality(ext) + MAX_SIZE_BONUS);
        }
    }
}
