//! Process-scoped collaborators shared by every work in a run.

use std::fmt;
use std::sync::Arc;

use super::allocator::DirectoryAllocator;
use super::manifest::{ManifestTemplates, ManifestWriter};
use crate::config::ArchiveConfig;
use crate::download::{PageFetcher, RateGate};
use crate::notify::Notifier;
use crate::reservation::ReservationStore;

/// Everything an orchestrator and its chapter tasks need besides the work itself.
///
/// Built once by the top-level run and cloned into each orchestrator; clones
/// share the same rate gate, allocator cache, and HTTP connection pool.
#[derive(Clone)]
pub struct ArchiveContext {
    pub gate: Arc<RateGate>,
    pub fetcher: PageFetcher,
    pub allocator: Arc<DirectoryAllocator>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<ArchiveConfig>,
    pub manifest: ManifestWriter,
}

impl ArchiveContext {
    /// Builds a context with a rate gate derived from `config`, a default
    /// fetcher, and the built-in manifest templates.
    #[must_use]
    pub fn new(
        config: ArchiveConfig,
        store: Arc<dyn ReservationStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let gate = Arc::new(RateGate::new(config.rate_interval, config.rate_burst));
        Self {
            gate,
            fetcher: PageFetcher::new(),
            allocator: Arc::new(DirectoryAllocator::new(store, Arc::clone(&notifier))),
            notifier,
            config: Arc::new(config),
            manifest: ManifestWriter::default(),
        }
    }

    #[must_use]
    pub fn with_templates(mut self, templates: ManifestTemplates) -> Self {
        self.manifest = ManifestWriter::new(templates);
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Arc<RateGate>) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: PageFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }
}

impl fmt::Debug for ArchiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveContext")
            .field("gate", &self.gate)
            .field("allocator", &self.allocator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
