//! Orchestrator tests over in-memory stages.

mod common;

use common::*;
use paper_notes::error::{PaperNotesError, StoreError};
use paper_notes::{IngestRequest, IngestStage, Pipeline};
use std::sync::Arc;

const URL: &str = "https://example.org/paper.pdf";

struct Harness {
    fetcher: Arc<FixedFetcher>,
    pruner: Arc<RecordingPruner>,
    extractor: Arc<FixedExtractor>,
    rows: Arc<MemoryRows>,
    vectors: Arc<MemoryVectors>,
    progress: Arc<RecordingProgress>,
    pipeline: Pipeline,
}

fn harness(rel_fail: Option<StoreError>) -> Harness {
    let fetcher = FixedFetcher::new(marker_pdf(3));
    let pruner = Arc::new(RecordingPruner::default());
    let extractor = FixedExtractor::new(vec![
        segment("Attention Is All You Need", 1),
        segment("Multi-head attention lets the model attend jointly.", 3),
    ]);
    let notes = Arc::new(FixedNotes(vec![note(
        "Self-attention replaces recurrence entirely.",
        &[1, 3],
    )]));
    let (store, rows, vectors) = memory_store(rel_fail);
    let progress = Arc::new(RecordingProgress::default());
    let pipeline = Pipeline::new(
        fetcher.clone(),
        pruner.clone(),
        extractor.clone(),
        notes,
        store,
    )
    .with_progress(progress.clone());

    Harness {
        fetcher,
        pruner,
        extractor,
        rows,
        vectors,
        progress,
        pipeline,
    }
}

#[tokio::test]
async fn ingest_writes_one_row_and_one_vector_per_segment() {
    let h = harness(None);
    let request = IngestRequest::new(URL, "Attention").delete_pages(vec![2]);

    let output = h.pipeline.ingest(&request).await.unwrap();

    let rows = h.rows.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].url, URL);
    assert_eq!(rows[0].name, "Attention");
    assert_eq!(rows[0].notes.len(), 1);
    assert_eq!(rows[0].notes[0].page_numbers, vec![1, 3]);
    assert_eq!(
        rows[0].paper,
        "Attention Is All You Need\n\nMulti-head attention lets the model attend jointly."
    );
    assert_eq!(h.vectors.entries.lock().unwrap().len(), 2);

    assert_eq!(*h.pruner.calls.lock().unwrap(), vec![vec![2]]);
    assert!(h.extractor.seen.lock().unwrap()[0].ends_with(PRUNED_TAG));

    assert_eq!(output.record, rows[0]);
    assert_eq!(output.stats.pages_removed, 1);
    assert_eq!(output.stats.segment_count, 2);
    assert_eq!(output.stats.note_count, 1);
}

#[tokio::test]
async fn stages_run_in_order() {
    let h = harness(None);
    let request = IngestRequest::new(URL, "Attention").delete_pages(vec![2]);
    h.pipeline.ingest(&request).await.unwrap();

    use IngestStage::*;
    let expected: Vec<Event> = [Fetching, Pruning, Extracting, Annotating, Persisting]
        .into_iter()
        .flat_map(|s| [Event::Start(s), Event::Complete(s)])
        .chain([Event::Done(1, 2)])
        .collect();
    assert_eq!(*h.progress.events.lock().unwrap(), expected);
}

#[tokio::test]
async fn empty_page_list_skips_pruning() {
    for pages in [None, Some(Vec::new())] {
        let h = harness(None);
        let request = IngestRequest {
            url: URL.into(),
            name: "Attention".into(),
            pages_to_delete: pages,
        };
        let output = h.pipeline.ingest(&request).await.unwrap();

        assert!(h.pruner.calls.lock().unwrap().is_empty());
        assert_eq!(h.extractor.seen.lock().unwrap()[0], marker_pdf(3));
        assert_eq!(output.stats.pages_removed, 0);
        assert!(!h
            .progress
            .events
            .lock()
            .unwrap()
            .contains(&Event::Start(IngestStage::Pruning)));
    }
}

#[tokio::test]
async fn non_pdf_url_fails_before_fetching() {
    let h = harness(None);
    let request = IngestRequest::new("https://arxiv.org/abs/1706.03762", "Attention");

    let err = h.pipeline.ingest(&request).await.unwrap_err();

    assert_eq!(err.stage, IngestStage::Fetching);
    assert!(matches!(
        err.source,
        PaperNotesError::UnsupportedInput { .. }
    ));
    assert!(h.fetcher.urls.lock().unwrap().is_empty());
    assert!(h.rows.rows.lock().unwrap().is_empty());
    assert!(h.vectors.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn relational_failure_is_reported_after_vectors_commit() {
    let h = harness(Some(StoreError::persistence("arxiv_papers", "HTTP 503")));
    let request = IngestRequest::new(URL, "Attention");

    let err = h.pipeline.ingest(&request).await.unwrap_err();

    assert_eq!(err.stage, IngestStage::Persisting);
    assert!(err.source.relational_failure().is_some());
    assert!(err.source.vector_failure().is_none());
    assert!(h.rows.rows.lock().unwrap().is_empty());
    assert_eq!(h.vectors.entries.lock().unwrap().len(), 2);
    assert_eq!(
        h.progress.events.lock().unwrap().last(),
        Some(&Event::Failed(IngestStage::Persisting))
    );
}

#[tokio::test]
async fn extraction_failure_stops_before_persisting() {
    let (store, rows, vectors) = memory_store(None);
    let pipeline = Pipeline::new(
        FixedFetcher::new(marker_pdf(1)),
        Arc::new(RecordingPruner::default()),
        Arc::new(FailingExtractor),
        Arc::new(FixedNotes(Vec::new())),
        store,
    );

    let err = pipeline
        .ingest(&IngestRequest::new(URL, "Attention"))
        .await
        .unwrap_err();

    assert_eq!(err.stage, IngestStage::Extracting);
    assert!(matches!(err.source, PaperNotesError::ExtractionFailed { .. }));
    assert!(rows.rows.lock().unwrap().is_empty());
    assert!(vectors.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reingesting_duplicates_records() {
    let h = harness(None);
    let request = IngestRequest::new(URL, "Attention");
    h.pipeline.ingest(&request).await.unwrap();
    h.pipeline.ingest(&request).await.unwrap();

    assert_eq!(h.rows.rows.lock().unwrap().len(), 2);
    assert_eq!(h.vectors.entries.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn stored_segments_are_searchable() {
    let h = harness(None);
    h.pipeline
        .ingest(&IngestRequest::new(URL, "Attention"))
        .await
        .unwrap();

    let hits = h
        .pipeline
        .store()
        .vectors()
        .similarity_search("Multi-head", 5)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.page_number, Some(3));
}
