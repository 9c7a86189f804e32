//! Filesystem-safe name normalization.
//!
//! Dataset directory names and uploaded audio filenames pass through here
//! before they touch the disk.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum length for normalized names.
const MAX_NAME_LENGTH: usize = 128;

/// Characters reserved on NTFS that must be removed.
const NTFS_RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Reserved names on Windows NTFS.
const NTFS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Stem used when a filename normalizes to nothing.
const UNNAMED_STEM: &str = "unnamed";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static CONSECUTIVE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]{2,}").unwrap());

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9\-_]").unwrap());

/// Normalize a name for use as a directory or file stem.
///
/// # Rules Applied
/// 1. Convert to lowercase
/// 2. Replace whitespace runs with underscores
/// 3. Remove NTFS-reserved characters
/// 4. Replace anything outside `[a-z0-9_-]` with underscore
/// 5. Collapse consecutive separators
/// 6. Trim leading/trailing separators
/// 7. Truncate to 128 characters
/// 8. Suffix Windows device names with `_data`
///
/// The result is empty when the input holds nothing usable; callers decide
/// whether that is an error.
///
/// # Examples
///
/// ```
/// use vctrain_core::naming::normalize_name;
///
/// assert_eq!(normalize_name("My Voice!"), "my_voice");
/// assert_eq!(normalize_name("Singer 2.0"), "singer_2_0");
/// assert_eq!(normalize_name("!!!"), "");
/// ```
pub fn normalize_name(name: &str) -> String {
    let mut result = name.trim().to_lowercase();

    result = WHITESPACE.replace_all(&result, "_").to_string();

    for &c in NTFS_RESERVED_CHARS {
        result = result.replace(c, "");
    }

    result = NON_ALNUM.replace_all(&result, "_").to_string();
    result = CONSECUTIVE_SEPARATORS.replace_all(&result, "_").to_string();
    result = result.trim_matches(|c| c == '-' || c == '_').to_string();

    // Only ASCII survives NON_ALNUM, so byte slicing is safe here.
    if result.len() > MAX_NAME_LENGTH {
        result.truncate(MAX_NAME_LENGTH);
        if let Some(pos) = result.rfind(|c| c == '-' || c == '_') {
            if pos > MAX_NAME_LENGTH / 2 {
                result.truncate(pos);
            }
        }
        result = result.trim_matches(|c| c == '-' || c == '_').to_string();
    }

    let upper = result.to_uppercase();
    if NTFS_RESERVED_NAMES.contains(&upper.as_str()) {
        result = format!("{}_data", result);
    }

    result
}

/// Normalize a filename while preserving its extension.
///
/// The stem goes through [`normalize_name`]; the extension is lowercased.
/// A stem that normalizes to nothing becomes `unnamed`.
///
/// # Examples
///
/// ```
/// use vctrain_core::naming::normalize_filename;
///
/// assert_eq!(normalize_filename("Take 01.WAV"), "take_01.wav");
/// assert_eq!(normalize_filename("clip.wav"), "clip.wav");
/// ```
pub fn normalize_filename(filename: &str) -> String {
    let (stem, ext) = match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos + 1..])),
        _ => (filename, None),
    };

    let mut stem = normalize_name(stem);
    if stem.is_empty() {
        stem = UNNAMED_STEM.to_string();
    }

    match ext {
        Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext.to_lowercase()),
        _ => stem,
    }
}

/// Extract the extension of a filename, lowercased and without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_basic() {
        assert_eq!(normalize_name("My Voice!"), "my_voice");
        assert_eq!(normalize_name("Singer-2"), "singer-2");
        assert_eq!(normalize_name("  lead   vocals  "), "lead_vocals");
        assert_eq!(normalize_name("tab\tseparated"), "tab_separated");
    }

    #[test]
    fn test_normalize_name_special_chars() {
        assert_eq!(normalize_name("voice/test:file"), "voicetestfile");
        assert_eq!(normalize_name("voice<>test"), "voicetest");
        assert_eq!(normalize_name("café"), "caf");
        assert_eq!(normalize_name("../escape"), "escape");
    }

    #[test]
    fn test_normalize_name_consecutive_separators() {
        assert_eq!(normalize_name("take---one"), "take_one");
        assert_eq!(normalize_name("take___one"), "take_one");
        assert_eq!(normalize_name("take-_-one"), "take_one");
    }

    #[test]
    fn test_normalize_name_reserved() {
        assert_eq!(normalize_name("CON"), "con_data");
        assert_eq!(normalize_name("nul"), "nul_data");
    }

    #[test]
    fn test_normalize_name_empty() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name("   "), "");
        assert_eq!(normalize_name("!!!"), "");
    }

    #[test]
    fn test_long_name_truncation() {
        let long_name = "a".repeat(200);
        let normalized = normalize_name(&long_name);
        assert_eq!(normalized.len(), MAX_NAME_LENGTH);
    }

    #[test]
    fn test_normalize_filename() {
        assert_eq!(normalize_filename("clip.wav"), "clip.wav");
        assert_eq!(normalize_filename("My Take.FLAC"), "my_take.flac");
        assert_eq!(normalize_filename("take.1.mp3"), "take_1.mp3");
        assert_eq!(normalize_filename("###.wav"), "unnamed.wav");
        assert_eq!(normalize_filename("noext"), "noext");
        assert_eq!(normalize_filename(".hidden"), "hidden");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a/b/clip.WAV"), Some("wav".to_string()));
        assert_eq!(file_extension("weights.pth"), Some("pth".to_string()));
        assert_eq!(file_extension("README"), None);
    }
}
