//! Data produced and persisted by an ingestion run.

use serde::{Deserialize, Serialize};

/// Provenance attached to one extracted segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    /// 1-indexed page the segment was read from, when the extractor knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    /// Element category reported by the extractor (`Title`, `NarrativeText`, `Table`, …).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Extractor-assigned element identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Remaining provider metadata, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One unit of extracted text, in the document's reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    pub text: String,
    pub metadata: SegmentMetadata,
}

impl TextSegment {
    pub fn new(text: impl Into<String>, metadata: SegmentMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// One structured annotation produced by the model.
///
/// Field names match the notes tool schema; `pageNumbers` is the source
/// reference back into the paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub note: String,
    #[serde(rename = "pageNumbers")]
    pub page_numbers: Vec<u32>,
}

/// The relational row written once per ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Full paper text: segment texts concatenated in reading order.
    pub paper: String,
    #[serde(rename = "arxiv_url")]
    pub url: String,
    pub name: String,
    pub notes: Vec<NoteRecord>,
}

/// A similarity-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    #[serde(default)]
    pub metadata: SegmentMetadata,
    pub similarity: f32,
}

/// Per-run counters and timings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub pages_removed: usize,
    pub segment_count: usize,
    pub note_count: usize,
    pub fetch_duration_ms: u64,
    pub prune_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub annotate_duration_ms: u64,
    pub persist_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful ingestion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutput {
    pub record: PaperRecord,
    pub stats: IngestStats,
}

/// Join segment texts in reading order.
///
/// Segments are separated by a blank line so paragraph boundaries survive
/// in both the stored paper text and the model prompt.
pub fn join_segments(segments: &[TextSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
