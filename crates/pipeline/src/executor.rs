//! The fetch-transform-write orchestrator.
//!
//! [`SyncPipeline::run`] processes exactly one document per call:
//!
//! 1. read it through the [`ContentStore`] (default content on missing/blank),
//! 2. rewrite it through the [`TextTransformer`],
//! 3. write the result back with no explicit version token, letting the store
//!    condition the write on whatever version is current at that moment.
//!
//! A failure in any step aborts the rest. Nothing is retried or rolled back.

use tracing::{info, info_span, Instrument};

use crate::{
    ContentPath, ContentStore, ContentUpdate, PipelineError, PipelineRunId, RepoConfig,
    TextTransformer, Timestamp, Usage, UsageCost, WriteOutcome,
};

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Identifier recorded on the run's tracing span.
    pub run_id: PipelineRunId,
    /// When the run started.
    pub started_at: Timestamp,
    /// Document that was processed.
    pub path: ContentPath,
    /// `true` when the transform input came from the default table.
    pub used_default: bool,
    /// Result of the final write.
    pub write: WriteOutcome,
    /// Token counters of the transform call.
    pub usage: Usage,
    /// Estimated cost of the transform call.
    pub cost: UsageCost,
}

/// Composes a [`ContentStore`] and a [`TextTransformer`] into one
/// read-transform-write cycle.
#[derive(Debug, Clone)]
pub struct SyncPipeline {
    store: ContentStore,
    transformer: TextTransformer,
}

impl SyncPipeline {
    /// Creates a pipeline from already-constructed clients.
    pub fn new(store: ContentStore, transformer: TextTransformer) -> Self {
        Self { store, transformer }
    }

    /// Rewrites the document at `path` in `config` according to `instructions`.
    ///
    /// Concurrent runs against the same path are guarded only by the store's
    /// conditional write: the losing run fails with
    /// [`crate::StoreError::VersionConflict`] and the stored content is left as
    /// the winner wrote it.
    pub async fn run(
        &self,
        config: &RepoConfig,
        path: &ContentPath,
        instructions: &str,
    ) -> Result<RunReport, PipelineError> {
        let run_id = PipelineRunId::new_random();
        let span = info_span!("pipeline_run", %run_id, repo = %config, path = %path);

        async move {
            let started_at = Timestamp::now();
            info!("pipeline run started");

            // Failures are logged once, by the caller.
            let (write, used_default, usage, cost) =
                self.execute(config, path, instructions).await?;
            info!(mode = %write.mode, sha = %write.sha, "pipeline run completed");

            Ok(RunReport {
                run_id,
                started_at,
                path: path.clone(),
                used_default,
                write,
                usage,
                cost,
            })
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        config: &RepoConfig,
        path: &ContentPath,
        instructions: &str,
    ) -> Result<(WriteOutcome, bool, Usage, UsageCost), PipelineError> {
        let read = self.store.read_resource(config, path).await?;
        let transformed = self.transformer.transform(&read.content, instructions).await?;

        // No sha: the store looks up the version current at write time.
        let update = ContentUpdate::new(path.clone(), transformed.text);
        let write = self.store.write(config, update).await?;

        Ok((write, read.used_default, transformed.usage, transformed.cost))
    }
}
