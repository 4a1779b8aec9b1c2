//! Shared fakes and fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use paper_notes::error::{PaperNotesError, StoreError};
use paper_notes::output::{NoteRecord, PaperRecord, SearchHit, SegmentMetadata, TextSegment};
use paper_notes::pipeline::extract::DocumentExtractor;
use paper_notes::pipeline::input::PdfFetcher;
use paper_notes::pipeline::notes::NoteGenerator;
use paper_notes::pipeline::persist::{PaperStore, RelationalStore, VectorStore};
use paper_notes::pipeline::prune::PagePruner;
use paper_notes::progress::{IngestProgressCallback, IngestStage};
use std::sync::{Arc, Mutex};

// ── PDF fixture ──────────────────────────────────────────────────────────────

/// A minimal valid PDF with `pages` pages; page N shows the text `marker-N`.
pub fn marker_pdf(pages: usize) -> Vec<u8> {
    let first_page = 4;
    let kids: Vec<String> = (0..pages)
        .map(|i| format!("{} 0 R", first_page + 2 * i))
        .collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {pages} >>", kids.join(" ")),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for i in 0..pages {
        let content_id = first_page + 2 * i + 1;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {content_id} 0 R >>"
        ));
        let stream = format!("BT /F1 24 Tf 72 720 Td (marker-{}) Tj ET", i + 1);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}\nendstream",
            stream.len()
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref_at = out.len();
    let mut trailer = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        trailer.push_str(&format!("{offset:010} 00000 n \n"));
    }
    trailer.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    out.extend_from_slice(trailer.as_bytes());
    out
}

pub fn segment(text: &str, page: u32) -> TextSegment {
    TextSegment::new(
        text,
        SegmentMetadata {
            page_number: Some(page),
            ..Default::default()
        },
    )
}

// ── Stage fakes ──────────────────────────────────────────────────────────────

/// Returns fixed bytes and remembers every URL it was asked for.
pub struct FixedFetcher {
    pub bytes: Vec<u8>,
    pub urls: Mutex<Vec<String>>,
}

impl FixedFetcher {
    pub fn new(bytes: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            bytes,
            urls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PdfFetcher for FixedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PaperNotesError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(self.bytes.clone())
    }
}

/// Records the page lists it receives and appends a tag to the bytes.
#[derive(Default)]
pub struct RecordingPruner {
    pub calls: Mutex<Vec<Vec<usize>>>,
}

pub const PRUNED_TAG: &[u8] = b"%pruned";

#[async_trait]
impl PagePruner for RecordingPruner {
    async fn prune(&self, pdf: &[u8], pages: &[usize]) -> Result<Vec<u8>, PaperNotesError> {
        self.calls.lock().unwrap().push(pages.to_vec());
        let mut out = pdf.to_vec();
        out.extend_from_slice(PRUNED_TAG);
        Ok(out)
    }
}

/// Returns fixed segments and remembers the bytes it was given.
pub struct FixedExtractor {
    pub segments: Vec<TextSegment>,
    pub seen: Mutex<Vec<Vec<u8>>>,
}

impl FixedExtractor {
    pub fn new(segments: Vec<TextSegment>) -> Arc<Self> {
        Arc::new(Self {
            segments,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DocumentExtractor for FixedExtractor {
    async fn extract(&self, pdf: &[u8]) -> Result<Vec<TextSegment>, PaperNotesError> {
        self.seen.lock().unwrap().push(pdf.to_vec());
        Ok(self.segments.clone())
    }
}

pub struct FailingExtractor;

#[async_trait]
impl DocumentExtractor for FailingExtractor {
    async fn extract(&self, _pdf: &[u8]) -> Result<Vec<TextSegment>, PaperNotesError> {
        Err(PaperNotesError::ExtractionFailed {
            detail: "HTTP 502: bad gateway".into(),
        })
    }
}

/// Returns fixed notes.
pub struct FixedNotes(pub Vec<NoteRecord>);

#[async_trait]
impl NoteGenerator for FixedNotes {
    async fn generate_notes(
        &self,
        _segments: &[TextSegment],
    ) -> Result<Vec<NoteRecord>, PaperNotesError> {
        Ok(self.0.clone())
    }
}

pub fn note(text: &str, pages: &[u32]) -> NoteRecord {
    NoteRecord {
        note: text.to_string(),
        page_numbers: pages.to_vec(),
    }
}

// ── In-memory stores ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRows {
    pub fail: Option<StoreError>,
    pub rows: Mutex<Vec<PaperRecord>>,
}

#[async_trait]
impl RelationalStore for MemoryRows {
    async fn insert_paper(&self, record: &PaperRecord) -> Result<(), StoreError> {
        if let Some(ref e) = self.fail {
            return Err(e.clone());
        }
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryVectors {
    pub entries: Mutex<Vec<TextSegment>>,
}

#[async_trait]
impl VectorStore for MemoryVectors {
    async fn upsert_segments(&self, segments: &[TextSegment]) -> Result<usize, StoreError> {
        self.entries.lock().unwrap().extend_from_slice(segments);
        Ok(segments.len())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.text.contains(query))
            .take(k)
            .map(|s| SearchHit {
                content: s.text.clone(),
                metadata: s.metadata.clone(),
                similarity: 1.0,
            })
            .collect())
    }
}

pub fn memory_store(fail: Option<StoreError>) -> (PaperStore, Arc<MemoryRows>, Arc<MemoryVectors>) {
    let rows = Arc::new(MemoryRows {
        fail,
        ..Default::default()
    });
    let vectors = Arc::new(MemoryVectors::default());
    (PaperStore::new(rows.clone(), vectors.clone()), rows, vectors)
}

// ── Progress recorder ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(IngestStage),
    Complete(IngestStage),
    Failed(IngestStage),
    Done(usize, usize),
}

#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<Event>>,
}

impl IngestProgressCallback for RecordingProgress {
    fn on_stage_start(&self, stage: IngestStage) {
        self.events.lock().unwrap().push(Event::Start(stage));
    }

    fn on_stage_complete(&self, stage: IngestStage, _elapsed_ms: u64) {
        self.events.lock().unwrap().push(Event::Complete(stage));
    }

    fn on_failed(&self, stage: IngestStage, _error: &str) {
        self.events.lock().unwrap().push(Event::Failed(stage));
    }

    fn on_done(&self, note_count: usize, segment_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Done(note_count, segment_count));
    }
}
