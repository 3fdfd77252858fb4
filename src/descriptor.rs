//! Work descriptors handed over by the metadata client.
//!
//! A descriptor is one JSON document per work:
//!
//! ```json
//! {
//!   "id": 4113,
//!   "title": "Clover",
//!   "description": "[b]Four[/b] friends...",
//!   "chapter_count": 2,
//!   "chapters": [
//!     { "id": 1, "volume": 1, "chapter": "1", "title": "Start", "groups": ["Alpha"],
//!       "pages": ["x1.png"], "page_base_url": "https://cdn.example.com/data/h/",
//!       "language": "gb", "uploaded_at": 1700000000 }
//!   ]
//! }
//! ```
//!
//! `chapter_count` is optional and defaults to the number of chapters in the
//! target language.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::archive::{ChapterRecord, Work};

/// Errors loading a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("cannot read work descriptor {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid work descriptor {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A work and every chapter the metadata client knows of.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkDescriptor {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Declared number of target-language chapters.
    #[serde(default)]
    pub chapter_count: Option<usize>,
    #[serde(default)]
    pub chapters: Vec<ChapterRecord>,
}

impl WorkDescriptor {
    /// Parses a descriptor; `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::Parse`] for malformed JSON.
    pub fn from_json(text: &str, origin: &str) -> Result<Self, DescriptorError> {
        serde_json::from_str(text).map_err(|source| DescriptorError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Reads and parses a descriptor file.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, DescriptorError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DescriptorError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&text, &path.display().to_string())
    }

    /// Splits into the work and its chapters in `language`, in supplied order.
    #[must_use]
    pub fn into_work(self, language: &str) -> (Work, Vec<ChapterRecord>) {
        let total = self.chapters.len();
        let chapters: Vec<ChapterRecord> = self
            .chapters
            .into_iter()
            .filter(|chapter| chapter.language == language)
            .collect();
        debug!(
            work_id = self.id,
            total,
            kept = chapters.len(),
            language,
            "filtered chapters by language"
        );
        let work = Work {
            id: self.id,
            title: self.title,
            description: self.description,
            chapter_count: self.chapter_count.unwrap_or(chapters.len()),
        };
        (work, chapters)
    }
}
