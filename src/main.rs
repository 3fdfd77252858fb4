//! CLI entry point for the archiver.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use archiver_core::{
    ArchiveContext, ArchiveError, ArchiveHistory, ArchiveOrchestrator, ChapterRecord,
    CompletedArchive, Database, LogNotifier, ManifestTemplates, ReservationStore,
    SqliteReservationStore, Work, WorkDescriptor,
};
use clap::Parser;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tracing::{debug, error, info};

mod cli;

use cli::Args;

// Single-threaded: all pages and chapters interleave on one thread
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Archiver starting");

    let config = args.archive_config();
    config.validate()?;

    let mut descriptors = Vec::with_capacity(args.works.len());
    for path in &args.works {
        descriptors.push(WorkDescriptor::load(path).await?);
    }

    tokio::fs::create_dir_all(&config.base_dir)
        .await
        .with_context(|| format!("cannot create base directory {}", config.base_dir.display()))?;

    let db_path = args.db_path();
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("cannot open database {}", db_path.display()))?;
    let store: Arc<dyn ReservationStore> = Arc::new(SqliteReservationStore::new(db.clone()));
    let history = ArchiveHistory::new(db.clone());

    let templates = match &args.templates {
        Some(dir) => ManifestTemplates::load(dir).await?,
        None => ManifestTemplates::default(),
    };

    let language = config.target_language.clone();
    let ctx = ArchiveContext::new(config, store, Arc::new(LogNotifier)).with_templates(templates);

    let mut pending = FuturesUnordered::new();
    let mut skipped = 0usize;
    for descriptor in descriptors {
        if !args.force && history.is_archived(descriptor.id).await? {
            info!(work_id = descriptor.id, title = %descriptor.title, "already archived, skipping");
            skipped += 1;
            continue;
        }
        let (work, chapters) = descriptor.into_work(&language);
        if chapters.is_empty() {
            info!(
                work_id = work.id,
                title = %work.title,
                language = %language,
                "no chapters in the target language, skipping"
            );
            skipped += 1;
            continue;
        }
        pending.push(archive_work(ctx.clone(), work, chapters));
    }

    // Drain every outcome: returning early would drop the runtime under live chapter tasks
    let mut completed = 0usize;
    let mut failed = 0usize;
    let mut unrecorded = 0usize;
    while let Some(outcome) = pending.next().await {
        match outcome {
            Ok(archive) => {
                completed += 1;
                if let Err(err) = history.record_archived(&archive).await {
                    error!(work_id = archive.work_id, error = %err, "cannot record archived work");
                    ctx.notifier.error(format!(
                        "Archived #{} {} but could not record it: {err}",
                        archive.work_id, archive.title
                    ));
                    unrecorded += 1;
                }
            }
            // Already logged and notified by the orchestrator or allocator
            Err(_) => failed += 1,
        }
    }

    info!(completed, failed, skipped, unrecorded, "Archive run complete");
    db.close().await;

    if failed > 0 {
        bail!("{failed} work(s) failed to archive");
    }
    if unrecorded > 0 {
        bail!("{unrecorded} archived work(s) could not be recorded in the history");
    }
    Ok(())
}

async fn archive_work(
    ctx: ArchiveContext,
    work: Work,
    chapters: Vec<ChapterRecord>,
) -> Result<CompletedArchive, ArchiveError> {
    let mut orchestrator = ArchiveOrchestrator::new(work, ctx);
    for chapter in chapters {
        orchestrator.add_chapter(chapter).await?;
    }
    orchestrator.finish().await
}
