//! Reindex pipeline orchestration.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::bulk::{BulkBatch, BulkWriter};
use crate::client::{Executor, Transport};
use crate::config::ReindexConfig;
use crate::error::Result;
use crate::extractor::Extractor;
use crate::probe::probe_dialect;
use crate::progress::ProgressTracker;
use crate::schema::{copy_schema, delete_index, index_exists};
use crate::transform::{BulkAction, DocumentHook, DocumentRecord, Identity, Transformer};
use crate::verify::{CountReport, Verifier};

/// Reindex statistics.
#[derive(Debug, Default, Clone)]
pub struct ReindexStats {
    /// Documents read from the source.
    pub extracted: u64,
    /// Documents accepted by the destination.
    pub written: u64,
    /// Documents skipped because they already existed.
    pub conflicts: u64,
    /// Documents rejected by the destination.
    pub failed: u64,
    /// Bulk requests sent.
    pub batches: u64,
    /// Duration in seconds, verification excluded.
    pub duration_secs: f64,
    /// Final count comparison.
    pub verification: CountReport,
}

impl ReindexStats {
    /// Calculate throughput (documents written per second).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.written as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Mutable state of one scroll-to-bulk transfer.
///
/// One [`TransferSession::step`] moves exactly one page: fetch, transform,
/// write, record. Nothing overlaps.
struct TransferSession<'a, T: Transport> {
    extractor: Extractor<'a, T>,
    transformer: Transformer,
    writer: BulkWriter<'a, T>,
    tracker: ProgressTracker,
    stats: ReindexStats,
}

impl<'a, T: Transport> TransferSession<'a, T> {
    /// Moves one page. Returns `false` once the scroll is exhausted.
    async fn step(&mut self) -> Result<bool> {
        let Some(page) = self.extractor.next_page().await? else {
            return Ok(false);
        };

        let extracted = page.len() as u64;
        let batch: BulkBatch = page
            .into_iter()
            .map(|doc| self.transformer.to_instruction(doc))
            .collect();
        let outcome = self.writer.write(&batch).await?;

        self.stats.extracted += extracted;
        self.stats.written += outcome.written;
        self.stats.conflicts += outcome.conflicts;
        self.stats.failed += outcome.failed;
        self.stats.batches += 1;
        self.tracker.record(extracted);

        Ok(true)
    }

    /// Releases the cursor and closes the progress line.
    async fn finish(self) -> ReindexStats {
        self.tracker.finish();
        self.extractor.release().await;
        self.stats
    }
}

/// Reindex pipeline.
pub struct Pipeline<T: Transport> {
    config: ReindexConfig,
    executor: Executor<T>,
    hook: Arc<dyn DocumentHook>,
    show_progress: bool,
}

impl<T: Transport> Pipeline<T> {
    /// Creates a pipeline talking to both clusters through `transport`.
    pub fn new(config: ReindexConfig, transport: T) -> Self {
        let executor = Executor::new(transport, config.options.retry.clone());
        Self {
            config,
            executor,
            hook: Arc::new(Identity),
            show_progress: true,
        }
    }

    /// Rewrites every document before it is written.
    #[must_use]
    pub fn with_hook(mut self, hook: impl DocumentHook + 'static) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Enables or disables the progress line on stdout.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run the reindex pipeline.
    ///
    /// # Errors
    ///
    /// Fails when the destination cannot be prepared, the version probe
    /// fails, the scroll expires, or a bounded retry policy gives up. A count
    /// mismatch at the end is reported in the stats, not as an error.
    pub async fn run(&self) -> Result<ReindexStats> {
        let start = Instant::now();
        let ReindexConfig {
            source,
            destination,
            options,
        } = &self.config;

        info!("Starting reindex pipeline");

        if options.remove_destination && index_exists(&self.executor, destination).await? {
            delete_index(&self.executor, destination).await?;
        }

        if index_exists(&self.executor, destination).await? {
            info!("'{}' exists, keeping its settings and mappings", destination);
        } else {
            let concrete = copy_schema(&self.executor, source, destination).await?;
            info!("Destination '{}' created from '{}'", destination, concrete);
        }

        let dialect = probe_dialect(&self.executor, source).await?;

        let extractor = Extractor::open(
            &self.executor,
            dialect,
            source,
            options.frame_size,
            &options.scroll_keep_alive,
        )
        .await?;

        let total = extractor.total();
        let tracker = if self.show_progress {
            ProgressTracker::new(total)
        } else {
            ProgressTracker::hidden(total)
        };

        let action = BulkAction::from_update_flag(options.update_existing);
        let hook = Arc::clone(&self.hook);
        let transformer = Transformer::new(destination.index.clone(), action, dialect)
            .with_hook(Box::new(move |doc: DocumentRecord| hook.apply(doc)));

        let mut session = TransferSession {
            extractor,
            transformer,
            writer: BulkWriter::new(&self.executor, destination, action),
            tracker,
            stats: ReindexStats::default(),
        };

        while session.step().await? {}
        let mut stats = session.finish().await;
        stats.duration_secs = start.elapsed().as_secs_f64();

        stats.verification = Verifier::new(
            &self.executor,
            source,
            destination,
            options.verify_timeout(),
            options.verify_interval(),
        )
        .verify()
        .await;

        info!(
            "Reindex complete: {} extracted, {} written, {} conflicts, {} failed in {:.2}s ({:.0} docs/sec)",
            stats.extracted,
            stats.written,
            stats.conflicts,
            stats.failed,
            stats.duration_secs,
            stats.throughput()
        );

        Ok(stats)
    }
}
