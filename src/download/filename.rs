//! Title sanitization, label truncation, and sequenced filenames.
//!
//! Target files are named `{title}_{NNNNN}{ext}` where `NNNNN` is a
//! zero-padded counter unique within the target directory. [`next_name`]
//! computes the next free counter from the directory contents alone;
//! [`NameReservations`] layers an in-process record of names handed out
//! during planning on top of it, so a whole batch can be named before any
//! download writes a file.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum length (in characters) of a sanitized title.
pub const TITLE_MAX_CHARS: usize = 31;

/// Width of the zero-padded sequence suffix.
const SEQUENCE_WIDTH: usize = 5;

/// Characters that must not appear in titles used as path components.
#[allow(clippy::expect_used)]
static RESERVED_TITLE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?|\\/:：!&#*\[\]\n\s\t]").expect("title regex is valid") // Static pattern, safe to panic
});

/// Trailing `_NNNNN` sequence suffix on a file stem.
#[allow(clippy::expect_used)]
static SEQUENCE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_([0-9]{5})$").expect("sequence regex is valid") // Static pattern, safe to panic
});

/// Errors raised while picking a sequenced filename.
#[derive(Debug, Error)]
pub enum FilenameError {
    /// The target directory has not been created yet.
    #[error("target directory does not exist: {path}")]
    DirectoryMissing {
        /// Directory that was expected to exist.
        path: PathBuf,
    },

    /// Listing the target directory failed.
    #[error("cannot list directory {path}: {source}")]
    Io {
        /// Directory being listed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Every candidate suffix collided. Indicates a bug, since `C + 1`
    /// candidates cannot all collide with `C` taken names.
    #[error("no free sequence number for '{base}' in {path}")]
    NoFreeSlot {
        /// Directory being searched.
        path: PathBuf,
        /// Requested base name.
        base: String,
    },
}

/// Result of filename sequencing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedName {
    /// File name (no directory).
    pub file: String,
    /// Numeric sequence suffix of `file`.
    pub fno: u32,
}

/// Replaces filesystem-hostile characters with `_` and caps the length.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    RESERVED_TITLE_CHARS
        .replace_all(title, "_")
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect()
}

/// Shortens `s` to at most `max_chars` characters for log output.
///
/// Long strings keep roughly the first third and the last two thirds of the
/// budget around a `...` marker. When `max_chars` leaves no room for the
/// marker (`<= 4`) the string is simply cut.
#[must_use]
pub fn truncate_label(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }
    if max_chars <= 4 {
        return s.chars().take(max_chars).collect();
    }

    let budget = max_chars - 3;
    let head_len = budget / 3;
    let tail_len = budget - head_len;
    let head: String = s.chars().take(head_len).collect();
    let tail: String = s.chars().skip(len - tail_len).collect();
    format!("{head}...{tail}")
}

/// Formats `{stem}_{NNNNN}{ext}`.
#[must_use]
pub fn sequenced_file_name(stem: &str, fno: u32, ext: &str) -> String {
    format!("{stem}_{fno:0width$}{ext}", width = SEQUENCE_WIDTH)
}

/// Picks the next collision-free sequenced filename in `dir`.
///
/// If the stem of `base_name` already ends in `_NNNNN` and that exact file is
/// absent, it is returned unchanged with `fno = starting_number`. Otherwise
/// the suffix is stripped and suffixes `1..=C+1` are tried, where `C` is the
/// number of files currently in `dir`.
///
/// # Errors
///
/// Returns [`FilenameError::DirectoryMissing`] if `dir` does not exist,
/// [`FilenameError::Io`] if it cannot be listed, and
/// [`FilenameError::NoFreeSlot`] if the search is exhausted.
pub fn next_name(
    dir: &Path,
    base_name: &str,
    starting_number: u32,
) -> Result<SequencedName, FilenameError> {
    next_name_excluding(dir, base_name, starting_number, &HashSet::new())
}

/// Like [`next_name`], but also treats every name in `reserved` as taken.
fn next_name_excluding(
    dir: &Path,
    base_name: &str,
    starting_number: u32,
    reserved: &HashSet<String>,
) -> Result<SequencedName, FilenameError> {
    if !dir.is_dir() {
        return Err(FilenameError::DirectoryMissing {
            path: dir.to_path_buf(),
        });
    }

    let (stem, ext) = split_extension(base_name);
    if ext.is_empty() || ext == "." {
        warn!(filename = %base_name, "filename has no usable extension");
    }

    let stem = if SEQUENCE_SUFFIX.is_match(stem) {
        if !dir.join(base_name).is_file() && !reserved.contains(base_name) {
            return Ok(SequencedName {
                file: base_name.to_string(),
                fno: starting_number,
            });
        }
        &stem[..stem.len() - (SEQUENCE_WIDTH + 1)]
    } else {
        stem
    };

    let existing = list_file_names(dir)?;
    let taken = existing.len() + reserved.len();
    let upper = u32::try_from(taken + 1).unwrap_or(u32::MAX);

    for fno in 1..=upper {
        let file = sequenced_file_name(stem, fno, ext);
        if !existing.contains(&file) && !reserved.contains(&file) {
            return Ok(SequencedName { file, fno });
        }
    }

    Err(FilenameError::NoFreeSlot {
        path: dir.to_path_buf(),
        base: base_name.to_string(),
    })
}

/// Splits `name` into stem and extension (the extension keeps its dot).
/// A leading dot does not start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && !name[..pos].chars().all(|c| c == '.') => {
            (&name[..pos], &name[pos..])
        }
        _ => (name, ""),
    }
}

fn list_file_names(dir: &Path) -> Result<HashSet<String>, FilenameError> {
    let entries = std::fs::read_dir(dir).map_err(|source| FilenameError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut names = HashSet::new();
    for entry in entries {
        let entry = entry.map_err(|source| FilenameError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_ok_and(|t| t.is_file()) {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Names handed out during planning, grouped by directory.
///
/// Directory scans alone race when several items of one batch target the
/// same directory before any file is written. Every name handed out here is
/// remembered, so later reservations skip it even though nothing exists on
/// disk yet.
#[derive(Debug, Default)]
pub struct NameReservations {
    by_dir: HashMap<PathBuf, HashSet<String>>,
}

impl NameReservations {
    /// Creates an empty reservation set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next free sequenced name for `base_name` in `dir`.
    ///
    /// # Errors
    ///
    /// Same as [`next_name`].
    pub fn reserve(
        &mut self,
        dir: &Path,
        base_name: &str,
        starting_number: u32,
    ) -> Result<SequencedName, FilenameError> {
        let reserved = self.by_dir.entry(dir.to_path_buf()).or_default();
        let name = next_name_excluding(dir, base_name, starting_number, reserved)?;
        debug!(dir = %dir.display(), file = %name.file, "reserved filename");
        reserved.insert(name.file.clone());
        Ok(name)
    }

    /// Reserves `file_name` exactly, returning false if this batch already holds it.
    pub fn reserve_exact(&mut self, dir: &Path, file_name: &str) -> bool {
        self.by_dir
            .entry(dir.to_path_buf())
            .or_default()
            .insert(file_name.to_string())
    }

    /// True if `file_name` in `dir` has been handed out.
    #[must_use]
    pub fn is_reserved(&self, dir: &Path, file_name: &str) -> bool {
        self.by_dir
            .get(dir)
            .is_some_and(|names| names.contains(file_name))
    }

    /// Total number of reserved names across all directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_dir.values().map(HashSet::len).sum()
    }

    /// True when nothing has been reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    // ==================== sanitize_title ====================

    #[test]
    fn test_sanitize_title_replaces_reserved_characters() {
        assert_eq!(sanitize_title("My Clip!"), "My_Clip_");
        assert_eq!(sanitize_title("a/b\\c:d：e?f|g"), "a_b_c_d_e_f_g");
        assert_eq!(sanitize_title("x&y#z*[w]"), "x_y_z__w_");
        assert_eq!(sanitize_title("line\nbreak\ttab"), "line_break_tab");
    }

    #[test]
    fn test_sanitize_title_caps_length_in_characters() {
        let title = "视频".repeat(40);
        let sanitized = sanitize_title(&title);
        assert_eq!(sanitized.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn test_sanitize_title_never_contains_reserved_characters() {
        let inputs = ["#话题 第一集!", "??", "a b c d e f g h i j k l m n o p q r s t", ""];
        for input in inputs {
            let out = sanitize_title(input);
            assert!(!RESERVED_TITLE_CHARS.is_match(&out), "{out:?}");
            assert!(out.chars().count() <= TITLE_MAX_CHARS);
        }
    }

    // ==================== truncate_label ====================

    #[test]
    fn test_truncate_label_short_string_unchanged() {
        assert_eq!(truncate_label("clip.mp4", 30), "clip.mp4");
    }

    #[test]
    fn test_truncate_label_long_string_has_marker_and_fits() {
        let s = "abcdefghijklmnopqrstuvwxyz0123456789_00001.mp4";
        for max in [5, 10, 30, 44] {
            let out = truncate_label(s, max);
            assert!(out.chars().count() <= max, "{out} > {max}");
            assert!(out.contains("..."), "{out}");
        }
        let out = truncate_label(s, 30);
        assert!(out.starts_with("abcdefghi"));
        assert!(out.ends_with("_00001.mp4"));
    }

    #[test]
    fn test_truncate_label_tiny_budget_cuts() {
        assert_eq!(truncate_label("abcdefgh", 4), "abcd");
        assert_eq!(truncate_label("abcdefgh", 0), "");
    }

    #[test]
    fn test_truncate_label_counts_characters_not_bytes() {
        let s = "一二三四五六七八九十一二三四五六七八九十";
        let out = truncate_label(s, 10);
        assert_eq!(out.chars().count(), 10);
    }

    // ==================== next_name ====================

    #[test]
    fn test_next_name_returns_unused_suffixed_name_unchanged() {
        let dir = TempDir::new().unwrap();
        let name = next_name(dir.path(), "clip_00001.mp4", 1).unwrap();
        assert_eq!(name, SequencedName { file: "clip_00001.mp4".into(), fno: 1 });
    }

    #[test]
    fn test_next_name_skips_existing_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "clip_00001.mp4");
        touch(dir.path(), "clip_00002.mp4");

        let name = next_name(dir.path(), "clip_00001.mp4", 1).unwrap();
        assert_eq!(name.file, "clip_00003.mp4");
        assert_eq!(name.fno, 3);
    }

    #[test]
    fn test_next_name_fills_gaps() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "clip_00001.mp4");
        touch(dir.path(), "clip_00003.mp4");

        let name = next_name(dir.path(), "clip_00001.mp4", 1).unwrap();
        assert_eq!(name.file, "clip_00002.mp4");
    }

    #[test]
    fn test_next_name_without_suffix_starts_at_one() {
        let dir = TempDir::new().unwrap();
        let name = next_name(dir.path(), "clip.mp4", 1).unwrap();
        assert_eq!(name.file, "clip_00001.mp4");
    }

    #[test]
    fn test_next_name_other_files_do_not_block() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "other_00001.mp4");
        touch(dir.path(), "notes.txt");
        let name = next_name(dir.path(), "clip_00001.mp4", 1).unwrap();
        assert_eq!(name.file, "clip_00001.mp4");
    }

    #[test]
    fn test_next_name_never_returns_existing_file() {
        let dir = TempDir::new().unwrap();
        for i in 1..=7 {
            touch(dir.path(), &sequenced_file_name("pic", i, ".png"));
        }
        let name = next_name(dir.path(), "pic_00004.png", 4).unwrap();
        assert!(!dir.path().join(&name.file).exists());
        assert_eq!(name.file, "pic_00008.png");
    }

    #[test]
    fn test_next_name_accepts_missing_extension() {
        let dir = TempDir::new().unwrap();
        let name = next_name(dir.path(), "noext", 1).unwrap();
        assert_eq!(name.file, "noext_00001");
        let name = next_name(dir.path(), "dot.", 1).unwrap();
        assert_eq!(name.file, "dot_00001.");
    }

    #[test]
    fn test_next_name_missing_directory_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let result = next_name(&missing, "clip_00001.mp4", 1);
        assert!(matches!(result, Err(FilenameError::DirectoryMissing { .. })));
    }

    #[test]
    fn test_split_extension_leading_dot() {
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("a.b.c"), ("a.b", ".c"));
    }

    // ==================== NameReservations ====================

    #[test]
    fn test_reservations_hand_out_increasing_unique_names() {
        let dir = TempDir::new().unwrap();
        let mut reservations = NameReservations::new();

        let names: Vec<_> = (0..4)
            .map(|_| reservations.reserve(dir.path(), "pic_00001.png", 1).unwrap())
            .collect();

        let fnos: Vec<_> = names.iter().map(|n| n.fno).collect();
        assert_eq!(fnos, [1, 2, 3, 4]);
        assert_eq!(reservations.len(), 4);
        assert!(reservations.is_reserved(dir.path(), "pic_00003.png"));
    }

    #[test]
    fn test_reservations_combine_disk_and_memory() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "pic_00001.png");
        touch(dir.path(), "pic_00002.png");
        let mut reservations = NameReservations::new();

        let first = reservations.reserve(dir.path(), "pic_00001.png", 1).unwrap();
        let second = reservations.reserve(dir.path(), "pic_00001.png", 1).unwrap();
        assert_eq!(first.file, "pic_00003.png");
        assert_eq!(second.file, "pic_00004.png");
    }

    #[test]
    fn test_reservations_are_per_directory() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let mut reservations = NameReservations::new();

        let in_a = reservations.reserve(a.path(), "x_00001.png", 1).unwrap();
        let in_b = reservations.reserve(b.path(), "x_00001.png", 1).unwrap();
        assert_eq!(in_a.file, in_b.file);
    }

    #[test]
    fn test_reserve_exact_detects_duplicates() {
        let dir = TempDir::new().unwrap();
        let mut reservations = NameReservations::new();
        assert!(reservations.is_empty());
        assert!(reservations.reserve_exact(dir.path(), "song.mp3"));
        assert!(!reservations.reserve_exact(dir.path(), "song.mp3"));
    }
}
