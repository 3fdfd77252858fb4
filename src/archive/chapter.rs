//! Per-chapter download task.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::context::ArchiveContext;
use super::error::ArchiveError;
use super::model::ChapterRecord;
use super::naming::{chapter_dir_name, page_file_name};
use crate::download::{DownloadError, PageOutcome, PageProgress};

/// What a successful chapter left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSummary {
    pub chapter_id: u64,
    pub directory: PathBuf,
    /// Pages fetched by this run.
    pub written: usize,
    /// Pages left alone because they already existed or downloads are off.
    pub skipped: usize,
    /// Bytes written across all fetched pages.
    pub bytes: u64,
}

/// Handle to a chapter download running on the tokio runtime.
///
/// The work starts as soon as the task is spawned. Dropping the handle does
/// not stop it.
#[derive(Debug)]
pub struct ChapterTask {
    chapter_id: u64,
    handle: JoinHandle<Result<ChapterSummary, ArchiveError>>,
}

impl ChapterTask {
    /// Spawns the download of `chapter` into a subdirectory of `work_dir`.
    ///
    /// Each page not yet on disk gets its own task that waits for a rate
    /// gate permit and then fetches. The chapter resolves once every page
    /// task has succeeded, or with the first page failure; page tasks still
    /// running at that point carry on and their results are discarded.
    #[must_use]
    pub fn spawn(
        ctx: ArchiveContext,
        work_dir: PathBuf,
        work_title: String,
        chapter: ChapterRecord,
    ) -> Self {
        let chapter_id = chapter.id;
        let span = info_span!("chapter", chapter_id, chapter = %chapter.chapter.raw());
        let handle = tokio::spawn(
            async move { run_chapter(&ctx, &work_dir, &work_title, &chapter).await }
                .instrument(span),
        );
        Self { chapter_id, handle }
    }

    /// Waits for the chapter to settle.
    ///
    /// # Errors
    ///
    /// Returns the chapter's failure, or [`ArchiveError::ChapterPanicked`]
    /// if the task did not run to completion.
    pub async fn join(self) -> Result<ChapterSummary, ArchiveError> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(join_error) => Err(ArchiveError::ChapterPanicked {
                chapter_id: self.chapter_id,
                message: join_error.to_string(),
            }),
        }
    }
}

async fn run_chapter(
    ctx: &ArchiveContext,
    work_dir: &Path,
    work_title: &str,
    chapter: &ChapterRecord,
) -> Result<ChapterSummary, ArchiveError> {
    if chapter.chapter.has_trailing_separator() {
        warn!(raw = chapter.chapter.raw(), "chapter number has a trailing separator");
        ctx.notifier.warn(format!(
            "Trailing '.' in chapter number '{}' of {work_title} (chapter id {})",
            chapter.chapter.raw(),
            chapter.id
        ));
    }

    let directory = work_dir.join(chapter_dir_name(work_title, chapter));
    tokio::fs::create_dir_all(&directory)
        .await
        .map_err(|e| ArchiveError::chapter_io(chapter.id, &directory, e))?;
    info!(dir = %directory.display(), "chapter destination");

    let total = chapter.pages.len();
    let mut skipped = 0;
    let mut pages = FuturesUnordered::new();

    for (index, page_ref) in chapter.pages.iter().enumerate() {
        let destination = directory.join(page_file_name(index, page_ref));
        if !ctx.config.download_images || path_exists(&destination, chapter.id).await? {
            skipped += 1;
            continue;
        }

        let url = chapter.page_url(page_ref);
        let progress = PageProgress {
            current: index + 1,
            total,
        };
        pages.push(spawn_page(ctx, url, destination, progress));
    }

    let mut written = 0;
    let mut bytes = 0;
    while let Some(joined) = pages.next().await {
        let outcome = joined.unwrap_or_else(|join_error| {
            Err(DownloadError::io(
                &directory,
                std::io::Error::other(format!("page task aborted: {join_error}")),
            ))
        });
        match outcome {
            Ok(PageOutcome::Written { bytes: page_bytes }) => {
                written += 1;
                bytes += page_bytes;
            }
            Ok(PageOutcome::Skipped) => skipped += 1,
            Err(source) => {
                error!(error = %source, in_flight = pages.len(), "page failed, abandoning chapter");
                ctx.notifier.error(format!(
                    "Chapter {} of {work_title} failed: {source}",
                    chapter.chapter.raw()
                ));
                return Err(ArchiveError::page(chapter.id, source));
            }
        }
    }

    debug!(written, skipped, bytes, "chapter complete");
    Ok(ChapterSummary {
        chapter_id: chapter.id,
        directory,
        written,
        skipped,
        bytes,
    })
}

fn spawn_page(
    ctx: &ArchiveContext,
    url: String,
    destination: PathBuf,
    progress: PageProgress,
) -> JoinHandle<Result<PageOutcome, DownloadError>> {
    let gate = ctx.gate.clone();
    let fetcher = ctx.fetcher.clone();
    let timeout = ctx.config.request_timeout;
    tokio::spawn(
        async move {
            gate.acquire().await;
            fetcher.fetch(&url, &destination, timeout, progress).await
        }
        .in_current_span(),
    )
}

async fn path_exists(path: &Path, chapter_id: u64) -> Result<bool, ArchiveError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| ArchiveError::chapter_io(chapter_id, path, e))
}
