//! The ingestion orchestrator.
//!
//! [`Pipeline::ingest`] walks the state machine
//!
//! ```text
//! Idle → Fetching → Pruning (optional) → Extracting → Annotating → Persisting → Done
//! ```
//!
//! strictly in order. The first failing stage ends the run in `Failed` with
//! an [`IngestError`] naming the stage and carrying the originating error.
//! No stage is retried here; callers that want retries wrap the whole call.

use crate::config::IngestConfig;
use crate::error::PaperNotesError;
use crate::output::{join_segments, IngestOutput, IngestStats, PaperRecord};
use crate::pipeline::extract::{DocumentExtractor, UnstructuredExtractor};
use crate::pipeline::input::{check_pdf_url, HttpFetcher, PdfFetcher};
use crate::pipeline::notes::{LlmToolModel, NoteGenerator, SchemaNoteGenerator};
use crate::pipeline::persist::{LlmEmbedder, PaperStore};
use crate::pipeline::prune::{PagePruner, PdfiumPruner};
use crate::progress::{IngestStage, NoopProgressCallback, ProgressCallback};
use crate::storage::{SupabaseClient, SupabasePaperTable, SupabaseVectorStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// What to ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// URL of the paper; must end in `.pdf`.
    pub url: String,
    /// Display name stored with the paper.
    pub name: String,
    /// 1-based pages to drop, in the original numbering. `None` or empty skips pruning.
    pub pages_to_delete: Option<Vec<usize>>,
}

impl IngestRequest {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            pages_to_delete: None,
        }
    }

    pub fn delete_pages(mut self, pages: Vec<usize>) -> Self {
        self.pages_to_delete = Some(pages);
        self
    }
}

/// Terminal `Failed` state: the stage that was running and why it failed.
#[derive(Debug, Error)]
#[error("Ingestion failed while {stage}: {source}")]
pub struct IngestError {
    pub stage: IngestStage,
    #[source]
    pub source: PaperNotesError,
}

/// The wired-up collaborators for one or more ingestions.
pub struct Pipeline {
    fetcher: Arc<dyn PdfFetcher>,
    pruner: Arc<dyn PagePruner>,
    extractor: Arc<dyn DocumentExtractor>,
    notes: Arc<dyn NoteGenerator>,
    store: PaperStore,
    progress: ProgressCallback,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PdfFetcher>,
        pruner: Arc<dyn PagePruner>,
        extractor: Arc<dyn DocumentExtractor>,
        notes: Arc<dyn NoteGenerator>,
        store: PaperStore,
    ) -> Self {
        Self {
            fetcher,
            pruner,
            extractor,
            notes,
            store,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// Build the production pipeline: HTTP fetch, pdfium pruning,
    /// Unstructured extraction, `edgequake-llm` notes and Supabase storage.
    ///
    /// Validates the configuration first, so a missing credential fails
    /// here rather than halfway through a run.
    pub fn from_config(config: &IngestConfig) -> Result<Self, PaperNotesError> {
        config.validate()?;

        let fetcher = Arc::new(HttpFetcher::new(config.download_timeout_secs)?);
        let extractor = Arc::new(UnstructuredExtractor::from_config(config)?);
        let model = Arc::new(LlmToolModel::from_config(config)?);
        let notes = Arc::new(SchemaNoteGenerator::new(model));
        let store = build_store(config)?;

        Ok(Self::new(
            fetcher,
            Arc::new(PdfiumPruner),
            extractor,
            notes,
            store,
        ))
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &PaperStore {
        &self.store
    }

    /// Run one ingestion to `Done` or `Failed`.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<IngestOutput, IngestError> {
        let total_start = Instant::now();
        let mut stats = IngestStats::default();
        info!("Ingesting '{}' from {}", request.name, request.url);

        // ── Fetching ─────────────────────────────────────────────────────
        let (raw, ms) = self
            .stage(IngestStage::Fetching, async {
                check_pdf_url(&request.url)?;
                self.fetcher.fetch(&request.url).await
            })
            .await?;
        stats.fetch_duration_ms = ms;

        // ── Pruning (optional) ───────────────────────────────────────────
        let pages = request.pages_to_delete.as_deref().unwrap_or_default();
        let pdf = if pages.is_empty() {
            debug!("No pages to delete; skipping pruning");
            raw
        } else {
            let (pruned, ms) = self
                .stage(IngestStage::Pruning, self.pruner.prune(&raw, pages))
                .await?;
            stats.prune_duration_ms = ms;
            stats.pages_removed = distinct_count(pages);
            pruned
        };

        // ── Extracting ───────────────────────────────────────────────────
        let (segments, ms) = self
            .stage(IngestStage::Extracting, self.extractor.extract(&pdf))
            .await?;
        drop(pdf);
        stats.extract_duration_ms = ms;
        stats.segment_count = segments.len();

        // ── Annotating ───────────────────────────────────────────────────
        let (notes, ms) = self
            .stage(IngestStage::Annotating, self.notes.generate_notes(&segments))
            .await?;
        stats.annotate_duration_ms = ms;
        stats.note_count = notes.len();

        // ── Persisting ───────────────────────────────────────────────────
        let record = PaperRecord {
            paper: join_segments(&segments),
            url: request.url.clone(),
            name: request.name.clone(),
            notes,
        };
        let (_, ms) = self
            .stage(
                IngestStage::Persisting,
                self.store.persist(&record, &segments),
            )
            .await?;
        stats.persist_duration_ms = ms;

        // ── Done ─────────────────────────────────────────────────────────
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        self.progress.on_done(stats.note_count, stats.segment_count);
        info!(
            "Ingested '{}': {} segments, {} notes in {}ms",
            record.name, stats.segment_count, stats.note_count, stats.total_duration_ms
        );

        Ok(IngestOutput { record, stats })
    }

    /// Run one stage, reporting progress and timing, and lift its error
    /// into the terminal `Failed` state.
    async fn stage<T, F>(&self, stage: IngestStage, work: F) -> Result<(T, u64), IngestError>
    where
        F: Future<Output = Result<T, PaperNotesError>>,
    {
        self.progress.on_stage_start(stage);
        let start = Instant::now();
        match work.await {
            Ok(value) => {
                let ms = start.elapsed().as_millis() as u64;
                debug!("Stage {} finished in {}ms", stage, ms);
                self.progress.on_stage_complete(stage, ms);
                Ok((value, ms))
            }
            Err(source) => {
                self.progress.on_failed(stage, &source.to_string());
                Err(IngestError { stage, source })
            }
        }
    }
}

/// Build the Supabase-backed [`PaperStore`] described by `config`.
pub fn build_store(config: &IngestConfig) -> Result<PaperStore, PaperNotesError> {
    let client = SupabaseClient::from_config(config)?;
    let embedder = Arc::new(LlmEmbedder::from_config(config)?);
    let relational = Arc::new(SupabasePaperTable::new(
        client.clone(),
        config.papers_table.clone(),
    ));
    let vectors = Arc::new(SupabaseVectorStore::new(
        client,
        config.embeddings_table.clone(),
        config.match_function.clone(),
        embedder,
    ));
    Ok(PaperStore::new(relational, vectors))
}

/// Ingest one paper with the production pipeline built from `config`.
///
/// A configuration error is reported as a failure in the `Idle` stage,
/// before any network call.
pub async fn ingest(
    request: &IngestRequest,
    config: &IngestConfig,
) -> Result<IngestOutput, IngestError> {
    let pipeline = Pipeline::from_config(config).map_err(|source| IngestError {
        stage: IngestStage::Idle,
        source,
    })?;
    pipeline.ingest(request).await
}

fn distinct_count(pages: &[usize]) -> usize {
    let mut sorted = pages.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}
