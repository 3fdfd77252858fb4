//! Archiver Core Library
//!
//! Archives the chapters of serialized works: resolves a collision-free
//! directory per work, fetches every chapter's pages under a process-wide
//! request-rate ceiling, and writes a manifest once the whole work is on disk.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`archive`] - Work orchestration, chapter tasks, directory allocation, manifests
//! - [`download`] - Rate gate and streaming page fetcher
//! - [`reservation`] - Directory-name reservation stores
//! - [`db`] - Database connection and schema management
//! - [`notify`] - Fire-and-forget notification sinks
//! - [`config`] - Run-wide settings
//! - [`descriptor`] - Work descriptors from the metadata client

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod config;
pub mod db;
pub mod descriptor;
pub mod download;
pub mod notify;
pub mod reservation;
#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use archive::{
    ArchiveContext, ArchiveError, ArchiveHistory, ArchiveOrchestrator, ChapterNumber,
    ChapterRecord, CompletedArchive, DirectoryAllocator, ManifestTemplates, Work,
};
pub use config::{ArchiveConfig, ConfigError};
pub use db::{Database, DbError};
pub use descriptor::{DescriptorError, WorkDescriptor};
pub use download::{DownloadError, PageFetcher, PageOutcome, RateGate};
pub use notify::{ChannelNotifier, LogNotifier, Notification, Notifier, Severity};
pub use reservation::{
    MemoryReservationStore, Reservation, ReservationError, ReservationStore,
    SqliteReservationStore,
};
