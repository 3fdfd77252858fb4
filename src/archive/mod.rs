//! Archive orchestration: from a work and its chapters to a directory of
//! pages plus a manifest.
//!
//! # Flow
//!
//! 1. [`ArchiveOrchestrator::add_chapter`] allocates the work directory once
//!    through the [`DirectoryAllocator`], then spawns a [`ChapterTask`].
//! 2. Each chapter task fetches its missing pages, paced by the shared
//!    [`RateGate`](crate::download::RateGate).
//! 3. [`ArchiveOrchestrator::finish`] closes registration, waits for every
//!    chapter, and on success writes `info.txt` and `description.txt`.
//!
//! Any chapter failure fails the whole work. Nothing is rolled back.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use archiver_core::archive::{ArchiveContext, ArchiveOrchestrator, ChapterRecord, Work};
//! use archiver_core::config::ArchiveConfig;
//! use archiver_core::notify::LogNotifier;
//! use archiver_core::reservation::MemoryReservationStore;
//!
//! # async fn example(work: Work, chapters: Vec<ChapterRecord>) -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = ArchiveContext::new(
//!     ArchiveConfig::default(),
//!     Arc::new(MemoryReservationStore::new()),
//!     Arc::new(LogNotifier),
//! );
//! let mut orchestrator = ArchiveOrchestrator::new(work, ctx);
//! for chapter in chapters {
//!     orchestrator.add_chapter(chapter).await?;
//! }
//! let archive = orchestrator.finish().await?;
//! println!("archived into {}", archive.directory.display());
//! # Ok(())
//! # }
//! ```

mod allocator;
mod chapter;
mod context;
mod error;
mod history;
pub mod manifest;
mod model;
pub mod naming;
mod orchestrator;

pub use allocator::DirectoryAllocator;
pub use chapter::{ChapterSummary, ChapterTask};
pub use context::ArchiveContext;
pub use error::ArchiveError;
pub use history::ArchiveHistory;
pub use manifest::{Manifest, ManifestTemplates, ManifestWriter, strip_markup};
pub use model::{ChapterNumber, ChapterRecord, Work};
pub use naming::{chapter_dir_name, page_file_name, sanitize_dir_name, work_base_path};
pub use orchestrator::{ArchiveOrchestrator, CompletedArchive, OrchestratorState};
