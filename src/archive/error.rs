//! Error types for the archive pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadError;
use crate::reservation::ReservationError;

/// Why a work (or one of its chapters) failed to archive.
///
/// Name collisions are not errors; they are resolved by renaming.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The reservation store could not allocate the work directory.
    #[error("failed to reserve directory for work {work_id} '{title}': {source}")]
    Reservation {
        work_id: u64,
        title: String,
        #[source]
        source: ReservationError,
    },

    /// An earlier allocation failure aborted chapter registration.
    #[error("chapter registration for work {work_id} was aborted by an earlier failure")]
    RegistrationAborted { work_id: u64 },

    /// A page of the chapter failed to download.
    #[error("chapter {chapter_id}: {source}")]
    Page {
        chapter_id: u64,
        #[source]
        source: DownloadError,
    },

    /// Creating the chapter directory failed.
    #[error("chapter {chapter_id}: cannot create {path}: {source}")]
    ChapterIo {
        chapter_id: u64,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A chapter task panicked.
    #[error("chapter {chapter_id} task panicked: {message}")]
    ChapterPanicked { chapter_id: u64, message: String },

    /// Registration closed with a different number of chapters than declared.
    #[error("work {work_id} declared {expected} chapters but {registered} were registered")]
    ChapterCountMismatch {
        work_id: u64,
        expected: usize,
        registered: usize,
    },

    /// Registration closed without any chapters.
    #[error("work {work_id} has no chapters to archive")]
    NoChapters { work_id: u64 },

    /// Reading a manifest template or writing a manifest file failed.
    #[error("manifest file {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// Creates a page failure for `chapter_id`.
    #[must_use]
    pub fn page(chapter_id: u64, source: DownloadError) -> Self {
        Self::Page { chapter_id, source }
    }

    /// Creates a chapter directory failure.
    #[must_use]
    pub fn chapter_io(chapter_id: u64, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ChapterIo {
            chapter_id,
            path: path.into(),
            source,
        }
    }

    /// Creates a manifest file failure.
    #[must_use]
    pub fn manifest(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Manifest {
            path: path.into(),
            source,
        }
    }
}
