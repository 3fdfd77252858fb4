//! Manifest rendering: two text documents describing an archived work.
//!
//! The info document (`info.txt`) is kept next to the chapters; the
//! description document is the external-facing summary. Both are produced by
//! placeholder substitution over a template:
//!
//! | Placeholder     | Value                                          |
//! |-----------------|------------------------------------------------|
//! | `{id}`          | work id                                        |
//! | `{title}`       | work title                                     |
//! | `{url}`         | work URL prefix joined with the id             |
//! | `{description}` | work description with markup stripped          |
//! | `{date}`        | render time, e.g. `October 16th 2026, 3:04:05 pm` |
//! | `{version}`     | crate version                                  |
//! | `{chapterlist}` | chapters grouped under `Volume N` headings     |
//! | `{grouplist}`   | distinct group names, one `- name` per line    |
//! | `{chapternum}`  | number of chapters                             |
//!
//! Placeholders match case-insensitively and every occurrence is replaced.
//! Substituted text is never scanned again.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use chrono::{Datelike, NaiveDateTime};
use regex::{Captures, Regex};
use tracing::{debug, instrument};

use super::error::ArchiveError;
use super::model::{ChapterRecord, Work};

/// File name of the info document inside the work directory.
pub const INFO_FILE_NAME: &str = "info.txt";
/// File name of the description document inside the work directory.
pub const DESCRIPTION_FILE_NAME: &str = "description.txt";

const INFO_TEMPLATE_FILE: &str = "info.template.txt";
const DESCRIPTION_TEMPLATE_FILE: &str = "description.template.txt";

/// Group names that carry no attribution and are left out of group lists.
const ANONYMOUS_GROUPS: [&str; 2] = ["no group", "Unknown"];

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{(id|title|url|description|date|version|chapterlist|grouplist|chapternum)\}")
        .expect("placeholder regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static BBCODE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[url=([^\]]*)\](.*?)\[/url\]").expect("url markup regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static BBCODE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[/?(?:b|u|i|spoiler|list|url)\]|\[/\*\]")
        .expect("bbcode tag regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?[bui]>").expect("html tag regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HTML_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>").expect("line break regex is valid") // Static pattern, safe to panic
});

/// The two manifest templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTemplates {
    pub info: String,
    pub description: String,
}

impl Default for ManifestTemplates {
    fn default() -> Self {
        Self {
            info: include_str!("../../templates/info.template.txt").to_string(),
            description: include_str!("../../templates/description.template.txt").to_string(),
        }
    }
}

impl ManifestTemplates {
    /// Loads `info.template.txt` and `description.template.txt` from `dir`.
    ///
    /// A missing file falls back to the built-in template.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Manifest`] if a template exists but cannot be read.
    pub async fn load(dir: &Path) -> Result<Self, ArchiveError> {
        let defaults = Self::default();
        Ok(Self {
            info: read_or(dir.join(INFO_TEMPLATE_FILE), defaults.info).await?,
            description: read_or(dir.join(DESCRIPTION_TEMPLATE_FILE), defaults.description)
                .await?,
        })
    }
}

async fn read_or(path: PathBuf, fallback: String) -> Result<String, ArchiveError> {
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "template missing, using built-in");
            Ok(fallback)
        }
        Err(e) => Err(ArchiveError::manifest(path, e)),
    }
}

/// Rendered manifest documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub info: String,
    pub description: String,
}

/// Renders and writes manifests from a shared template pair.
#[derive(Debug, Clone, Default)]
pub struct ManifestWriter {
    templates: Arc<ManifestTemplates>,
}

impl ManifestWriter {
    #[must_use]
    pub fn new(templates: ManifestTemplates) -> Self {
        Self {
            templates: Arc::new(templates),
        }
    }

    /// Renders both documents. `chapters` must already be sorted.
    #[must_use]
    pub fn render(
        &self,
        work: &Work,
        chapters: &[ChapterRecord],
        work_url: &str,
        generated_at: NaiveDateTime,
    ) -> Manifest {
        let values = Placeholders {
            id: work.id.to_string(),
            title: &work.title,
            url: work_url,
            description: strip_markup(&work.description),
            date: format_manifest_date(generated_at),
            chapter_list: render_chapter_list(chapters),
            group_list: render_group_list(chapters),
            chapter_count: chapters.len().to_string(),
        };

        Manifest {
            info: values.substitute(&self.templates.info),
            description: values.substitute(&self.templates.description),
        }
    }

    /// Writes both documents into `work_dir`, creating it if needed.
    ///
    /// Returns the path of the info document.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Manifest`] naming the path that failed.
    #[instrument(skip(manifest), fields(dir = %work_dir.display()))]
    pub async fn write(work_dir: &Path, manifest: &Manifest) -> Result<PathBuf, ArchiveError> {
        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(|e| ArchiveError::manifest(work_dir, e))?;

        let info_path = work_dir.join(INFO_FILE_NAME);
        tokio::fs::write(&info_path, &manifest.info)
            .await
            .map_err(|e| ArchiveError::manifest(&info_path, e))?;

        let description_path = work_dir.join(DESCRIPTION_FILE_NAME);
        tokio::fs::write(&description_path, &manifest.description)
            .await
            .map_err(|e| ArchiveError::manifest(&description_path, e))?;

        debug!("manifest written");
        Ok(info_path)
    }
}

struct Placeholders<'a> {
    id: String,
    title: &'a str,
    url: &'a str,
    description: String,
    date: String,
    chapter_list: String,
    group_list: String,
    chapter_count: String,
}

impl Placeholders<'_> {
    fn value(&self, name: &str) -> Option<&str> {
        let value = match name.to_ascii_lowercase().as_str() {
            "id" => self.id.as_str(),
            "title" => self.title,
            "url" => self.url,
            "description" => self.description.as_str(),
            "date" => self.date.as_str(),
            "version" => env!("CARGO_PKG_VERSION"),
            "chapterlist" => self.chapter_list.as_str(),
            "grouplist" => self.group_list.as_str(),
            "chapternum" => self.chapter_count.as_str(),
            _ => return None,
        };
        Some(value)
    }

    fn substitute(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures<'_>| {
                self.value(&caps[1])
                    .map_or_else(|| caps[0].to_string(), str::to_string)
            })
            .into_owned()
    }
}

/// Converts BBCode/HTML-ish markup in a description into plain text.
///
/// `[url=X]Y[/url]` becomes `Y (X)`, formatting tags are dropped, `<br>`
/// becomes a newline and `[*]` a `* ` list marker.
#[must_use]
pub fn strip_markup(text: &str) -> String {
    let text = BBCODE_URL.replace_all(text, "$2 ($1)");
    let text = BBCODE_TAG.replace_all(&text, "");
    let text = HTML_TAG.replace_all(&text, "");
    let text = HTML_BREAK.replace_all(&text, "\n");
    text.replace("[*]", "* ")
}

/// Chapter lines grouped under a `Volume N` heading whenever the volume changes.
#[must_use]
pub fn render_chapter_list(chapters: &[ChapterRecord]) -> String {
    let mut out = String::new();
    let mut current_volume = None;
    for chapter in chapters {
        if current_volume != Some(chapter.volume) {
            out.push_str(&format!("Volume {}\n", chapter.volume));
            current_volume = Some(chapter.volume);
        }
        out.push_str(" * Chapter ");
        out.push_str(chapter.chapter.raw());
        if let Some(title) = &chapter.title {
            out.push_str(" - ");
            out.push_str(title);
        }
        out.push('\n');
    }
    out.trim().to_string()
}

/// Distinct group names in first-seen order, one `- name` line each.
#[must_use]
pub fn render_group_list(chapters: &[ChapterRecord]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for group in chapters.iter().flat_map(|chapter| &chapter.groups) {
        let name = clean_group_name(group);
        if !name.is_empty() && !ANONYMOUS_GROUPS.contains(&name) && !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen.iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_group_name(name: &str) -> &str {
    name.trim().trim_end_matches(',').trim_end()
}

/// Formats a timestamp like `October 16th 2026, 3:04:05 pm`.
#[must_use]
pub fn format_manifest_date(at: NaiveDateTime) -> String {
    let day = at.day();
    format!(
        "{} {day}{} {}",
        at.format("%B"),
        ordinal_suffix(day),
        at.format("%Y, %-I:%M:%S %P")
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Sorts chapters by volume, then chapter number.
pub fn sort_chapters(chapters: &mut [ChapterRecord]) {
    chapters.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
