//! Filesystem names for works, chapters, and pages.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::model::ChapterRecord;

/// Longest name most filesystems accept for one path component, in bytes.
const MAX_COMPONENT_BYTES: usize = 255;

#[allow(clippy::expect_used)]
static ILLEGAL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[/?<>\\:*|"\x00-\x1f\x{80}-\x{9f}]"#).expect("illegal-char regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static WINDOWS_RESERVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(con|prn|aux|nul|com[0-9]|lpt[0-9])(\..*)?$")
        .expect("reserved-name regex is valid") // Static pattern, safe to panic
});

/// Turns arbitrary text into a single safe path component.
///
/// Strips characters illegal on common filesystems and control characters,
/// drops dot-only and Windows device names, trims trailing dots and spaces,
/// truncates to 255 bytes, and finally strips leading dots so the result is
/// never hidden. May return an empty string.
#[must_use]
pub fn sanitize_dir_name(name: &str) -> String {
    let cleaned = ILLEGAL_CHARS.replace_all(name, "");
    let cleaned = if cleaned.chars().all(|c| c == '.') || WINDOWS_RESERVED.is_match(&cleaned) {
        ""
    } else {
        cleaned.trim_end_matches(['.', ' '])
    };
    truncate_to_bytes(cleaned, MAX_COMPONENT_BYTES)
        .trim_start_matches('.')
        .to_string()
}

fn truncate_to_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Candidate directory for a work before collision handling.
///
/// Falls back to the decimal work id when nothing of the title survives
/// sanitization, so the result is always a child of `base_dir`.
#[must_use]
pub fn work_base_path(base_dir: &Path, work_id: u64, title: &str) -> PathBuf {
    let name = sanitize_dir_name(title);
    if name.is_empty() {
        base_dir.join(work_id.to_string())
    } else {
        base_dir.join(name)
    }
}

/// Directory name of one chapter inside its work directory.
///
/// `{title} - c{chapter} (v{volume}) {groups}` with the volume padded to two
/// digits and each group wrapped in brackets.
#[must_use]
pub fn chapter_dir_name(work_title: &str, chapter: &ChapterRecord) -> String {
    let groups = chapter
        .groups
        .iter()
        .map(|group| format!("[{group}]"))
        .collect::<Vec<_>>()
        .join(" ");
    sanitize_dir_name(&format!(
        "{work_title} - c{} (v{:02}) {groups}",
        chapter.chapter, chapter.volume
    ))
}

/// File name of the page at zero-based `index`: a 1-based three-digit
/// number plus the reference's extension, if it has one.
#[must_use]
pub fn page_file_name(index: usize, page_ref: &str) -> String {
    let number = format!("{:03}", index + 1);
    let file_part = page_ref.rsplit('/').next().unwrap_or(page_ref);
    match file_part.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => format!("{number}.{ext}"),
        _ => number,
    }
}
