//! Per-work lifecycle: register chapters, wait for them, write the manifest.

use std::path::PathBuf;

use chrono::Local;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tracing::{debug, error, info, instrument};

use super::chapter::{ChapterSummary, ChapterTask};
use super::context::ArchiveContext;
use super::error::ArchiveError;
use super::manifest::{ManifestWriter, sort_chapters};
use super::model::{ChapterRecord, Work};
use super::naming::work_base_path;

/// Registration state of an [`ArchiveOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Accepting chapters.
    Collecting,
    /// Directory allocation failed; every further registration is refused.
    Aborted,
}

/// A fully archived work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedArchive {
    pub work_id: u64,
    pub title: String,
    /// Resolved work directory.
    pub directory: PathBuf,
    pub chapter_count: usize,
    /// Path of the written `info.txt`.
    pub info_path: PathBuf,
    /// Rendered external-facing description.
    pub description: String,
    pub chapters: Vec<ChapterSummary>,
}

/// Drives the archive of one work.
///
/// Each [`add_chapter`](Self::add_chapter) starts that chapter's download
/// right away. [`finish`](Self::finish) closes registration, waits for every
/// chapter, and writes the manifest if all of them succeeded. The
/// orchestrator is consumed by `finish` and cannot be reused.
#[derive(Debug)]
pub struct ArchiveOrchestrator {
    work: Work,
    ctx: ArchiveContext,
    state: OrchestratorState,
    work_dir: Option<PathBuf>,
    chapters: Vec<ChapterRecord>,
    tasks: Vec<ChapterTask>,
}

impl ArchiveOrchestrator {
    #[must_use]
    pub fn new(work: Work, ctx: ArchiveContext) -> Self {
        Self {
            work,
            ctx,
            state: OrchestratorState::Collecting,
            work_dir: None,
            chapters: Vec::new(),
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn work(&self) -> &Work {
        &self.work
    }

    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Number of chapters registered so far.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.tasks.len()
    }

    /// Work directory, once the first chapter has allocated it.
    #[must_use]
    pub fn work_dir(&self) -> Option<&PathBuf> {
        self.work_dir.as_ref()
    }

    /// Registers a chapter and starts downloading it.
    ///
    /// The first call allocates the work directory.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Reservation`] if allocating the work directory
    /// fails. The orchestrator is then aborted and every later call returns
    /// [`ArchiveError::RegistrationAborted`].
    #[instrument(skip(self, chapter), fields(work_id = self.work.id, chapter_id = chapter.id))]
    pub async fn add_chapter(&mut self, chapter: ChapterRecord) -> Result<(), ArchiveError> {
        if self.state == OrchestratorState::Aborted {
            return Err(ArchiveError::RegistrationAborted {
                work_id: self.work.id,
            });
        }

        let work_dir = match &self.work_dir {
            Some(dir) => dir.clone(),
            None => {
                let base_path =
                    work_base_path(&self.ctx.config.base_dir, self.work.id, &self.work.title);
                match self
                    .ctx
                    .allocator
                    .allocate(self.work.id, &self.work.title, &base_path)
                    .await
                {
                    Ok(dir) => {
                        self.work_dir = Some(dir.clone());
                        dir
                    }
                    Err(err) => {
                        self.state = OrchestratorState::Aborted;
                        return Err(err);
                    }
                }
            }
        };

        self.tasks.push(ChapterTask::spawn(
            self.ctx.clone(),
            work_dir,
            self.work.title.clone(),
            chapter.clone(),
        ));
        self.chapters.push(chapter);
        debug!(registered = self.tasks.len(), "chapter registered");
        Ok(())
    }

    /// Closes registration and waits for the outcome of the whole work.
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::RegistrationAborted`] if allocation failed earlier
    /// - [`ArchiveError::ChapterCountMismatch`] if the number of registered
    ///   chapters differs from the work's declared count
    /// - [`ArchiveError::NoChapters`] if nothing was registered
    /// - the first chapter failure, in completion order
    /// - [`ArchiveError::Manifest`] if the manifest cannot be written
    ///
    /// Chapter tasks keep running after a failure; files already written stay
    /// on disk and no manifest is written.
    #[instrument(skip(self), fields(work_id = self.work.id, title = %self.work.title))]
    pub async fn finish(self) -> Result<CompletedArchive, ArchiveError> {
        let Self {
            work,
            ctx,
            state,
            work_dir,
            mut chapters,
            tasks,
        } = self;

        let result = match (state, work_dir) {
            (OrchestratorState::Aborted, _) => {
                Err(ArchiveError::RegistrationAborted { work_id: work.id })
            }
            _ if tasks.len() != work.chapter_count => Err(ArchiveError::ChapterCountMismatch {
                work_id: work.id,
                expected: work.chapter_count,
                registered: tasks.len(),
            }),
            (OrchestratorState::Collecting, None) => {
                Err(ArchiveError::NoChapters { work_id: work.id })
            }
            (OrchestratorState::Collecting, Some(work_dir)) => {
                match await_chapters(tasks).await {
                    Ok(summaries) => {
                        sort_chapters(&mut chapters);
                        let manifest = ctx.manifest.render(
                            &work,
                            &chapters,
                            &ctx.config.work_url(work.id),
                            Local::now().naive_local(),
                        );
                        ManifestWriter::write(&work_dir, &manifest)
                            .await
                            .map(|info_path| CompletedArchive {
                                work_id: work.id,
                                title: work.title.clone(),
                                directory: work_dir,
                                chapter_count: chapters.len(),
                                info_path,
                                description: manifest.description,
                                chapters: summaries,
                            })
                    }
                    Err(err) => Err(err),
                }
            }
        };

        match &result {
            Ok(archive) => {
                info!(
                    chapters = archive.chapter_count,
                    dir = %archive.directory.display(),
                    "finished archiving {} with {} chapters",
                    work.title,
                    archive.chapter_count
                );
                ctx.notifier.info(format!(
                    "Finished archiving {} with {} chapters",
                    work.title, archive.chapter_count
                ));
            }
            Err(err) => {
                error!(error = %err, "archiving {} failed", work.title);
                ctx.notifier
                    .error(format!("Archiving #{} {} failed: {err}", work.id, work.title));
            }
        }
        result
    }
}

/// Resolves once every chapter succeeded, or with the first failure.
async fn await_chapters(tasks: Vec<ChapterTask>) -> Result<Vec<ChapterSummary>, ArchiveError> {
    let mut pending: FuturesUnordered<_> = tasks.into_iter().map(ChapterTask::join).collect();
    let mut summaries = Vec::with_capacity(pending.len());
    while let Some(outcome) = pending.next().await {
        summaries.push(outcome?);
    }
    summaries.sort_by_key(|summary| summary.chapter_id);
    Ok(summaries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::archive::manifest::{DESCRIPTION_FILE_NAME, INFO_FILE_NAME, ManifestTemplates};
    use crate::archive::model::ChapterNumber;
    use crate::config::ArchiveConfig;
    use crate::download::RateGate;
    use crate::notify::{ChannelNotifier, Notification, Severity};
    use crate::reservation::{
        MemoryReservationStore, Reservation, ReservationError, ReservationStore,
    };

    struct UnreachableStore;

    #[async_trait]
    impl ReservationStore for UnreachableStore {
        async fn reserve(
            &self,
            _work_id: u64,
            _title: &str,
            _dir_name: &str,
        ) -> Result<Reservation, ReservationError> {
            Err(ReservationError::Unavailable("offline".to_string()))
        }
    }

    fn dry_run_context(
        base_dir: PathBuf,
        store: Arc<dyn ReservationStore>,
    ) -> (ArchiveContext, tokio::sync::mpsc::UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::channel();
        let config = ArchiveConfig {
            base_dir,
            download_images: false,
            ..ArchiveConfig::default()
        };
        let ctx = ArchiveContext::new(config, store, Arc::new(notifier))
            .with_gate(Arc::new(RateGate::disabled()))
            .with_templates(ManifestTemplates {
                info: "{title}\n{chapterlist}\n{grouplist}".to_string(),
                description: "{chapternum} chapters".to_string(),
            });
        (ctx, rx)
    }

    fn work(chapter_count: usize) -> Work {
        Work {
            id: 4113,
            title: "Clover".to_string(),
            description: String::new(),
            chapter_count,
        }
    }

    fn chapter(id: u64, volume: u32, number: &str) -> ChapterRecord {
        ChapterRecord {
            id,
            volume,
            chapter: ChapterNumber::parse(number),
            title: None,
            groups: vec!["Alpha".to_string()],
            pages: vec!["p1.png".to_string()],
            page_base_url: "http://127.0.0.1:9/".to_string(),
            language: "gb".to_string(),
            uploaded_at: None,
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_finish_writes_sorted_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, mut rx) =
            dry_run_context(dir.path().to_path_buf(), Arc::new(MemoryReservationStore::new()));
        let mut orchestrator = ArchiveOrchestrator::new(work(3), ctx);

        orchestrator.add_chapter(chapter(3, 2, "1")).await.unwrap();
        orchestrator.add_chapter(chapter(2, 1, "2")).await.unwrap();
        orchestrator.add_chapter(chapter(1, 1, "1")).await.unwrap();
        let archive = orchestrator.finish().await.unwrap();

        assert_eq!(archive.directory, dir.path().join("Clover"));
        assert_eq!(archive.chapter_count, 3);
        assert_eq!(archive.description, "3 chapters");
        assert_eq!(
            std::fs::read_to_string(&archive.info_path).unwrap(),
            "Clover\nVolume 1\n * Chapter 1\n * Chapter 2\nVolume 2\n * Chapter 1\n- Alpha"
        );
        assert!(archive.directory.join(DESCRIPTION_FILE_NAME).exists());
        let ids: Vec<u64> = archive.chapters.iter().map(|c| c.chapter_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_finish_with_too_few_chapters_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, mut rx) =
            dry_run_context(dir.path().to_path_buf(), Arc::new(MemoryReservationStore::new()));
        let mut orchestrator = ArchiveOrchestrator::new(work(3), ctx);
        orchestrator.add_chapter(chapter(1, 1, "1")).await.unwrap();

        let result = orchestrator.finish().await;

        assert!(matches!(
            result,
            Err(ArchiveError::ChapterCountMismatch {
                expected: 3,
                registered: 1,
                ..
            })
        ));
        assert!(!dir.path().join("Clover").join(INFO_FILE_NAME).exists());
        assert_eq!(drain(&mut rx)[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_finish_with_too_many_chapters_is_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) =
            dry_run_context(dir.path().to_path_buf(), Arc::new(MemoryReservationStore::new()));
        let mut orchestrator = ArchiveOrchestrator::new(work(1), ctx);
        orchestrator.add_chapter(chapter(1, 1, "1")).await.unwrap();
        orchestrator.add_chapter(chapter(2, 1, "2")).await.unwrap();

        let result = orchestrator.finish().await;

        assert!(matches!(
            result,
            Err(ArchiveError::ChapterCountMismatch {
                expected: 1,
                registered: 2,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_finish_without_chapters_is_no_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) =
            dry_run_context(dir.path().to_path_buf(), Arc::new(MemoryReservationStore::new()));

        let result = ArchiveOrchestrator::new(work(0), ctx).finish().await;

        assert!(matches!(result, Err(ArchiveError::NoChapters { work_id: 4113 })));
    }

    #[tokio::test]
    async fn test_allocation_failure_aborts_registration() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _rx) = dry_run_context(dir.path().to_path_buf(), Arc::new(UnreachableStore));
        let mut orchestrator = ArchiveOrchestrator::new(work(2), ctx);

        let first = orchestrator.add_chapter(chapter(1, 1, "1")).await;
        let second = orchestrator.add_chapter(chapter(2, 1, "2")).await;

        assert!(matches!(first, Err(ArchiveError::Reservation { .. })));
        assert!(matches!(
            second,
            Err(ArchiveError::RegistrationAborted { work_id: 4113 })
        ));
        assert_eq!(orchestrator.state(), OrchestratorState::Aborted);
        assert_eq!(orchestrator.registered(), 0);
        assert!(matches!(
            orchestrator.finish().await,
            Err(ArchiveError::RegistrationAborted { .. })
        ));
    }

    #[tokio::test]
    async fn test_work_directory_allocated_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryReservationStore::new());
        let (ctx, _rx) = dry_run_context(dir.path().to_path_buf(), store.clone());
        let mut orchestrator = ArchiveOrchestrator::new(work(2), ctx);

        orchestrator.add_chapter(chapter(1, 1, "1")).await.unwrap();
        orchestrator.add_chapter(chapter(2, 1, "2")).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            orchestrator.work_dir(),
            Some(&dir.path().join("Clover"))
        );
        orchestrator.finish().await.unwrap();
    }
}
