//! Error types for the paper-notes library.
//!
//! Two error types reflect two different scopes of failure:
//!
//! * [`PaperNotesError`]: the single taxonomy every pipeline stage reports
//!   with. Each variant is terminal for the current ingestion; nothing in
//!   the library retries.
//!
//! * [`StoreError`]: the outcome of one persistence backend. The relational
//!   insert and the vector upsert fail independently, so both outcomes are
//!   carried side by side inside [`PaperNotesError::PersistenceFailed`].
//!
//! The orchestrator wraps either in [`crate::ingest::IngestError`] together
//! with the stage that failed.

use thiserror::Error;

/// All errors returned by the paper-notes library.
#[derive(Debug, Error)]
pub enum PaperNotesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input URL does not end with a recognised document suffix.
    #[error("Unsupported input '{input}': expected a URL ending in .pdf")]
    UnsupportedInput { input: String },

    /// The PDF could not be downloaded.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// A requested page does not exist in the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    OutOfRange { page: usize, total: usize },

    /// The buffer could not be parsed (or re-serialised) as a PDF.
    #[error("Invalid PDF: {detail}")]
    InvalidFormat { detail: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// A required credential or endpoint was not configured.
    #[error("Missing required configuration '{key}'\n{hint}")]
    MissingCredential { key: &'static str, hint: String },

    /// A configured value is present but malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The document decomposition service failed or returned garbage.
    #[error("Document extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The paper text does not fit the model's context window.
    #[error(
        "Paper text is too large for the model context: ~{estimated_tokens} tokens, limit {limit}"
    )]
    ContextTooLarge {
        estimated_tokens: usize,
        limit: usize,
    },

    /// The model response did not match the notes tool schema.
    #[error("Model response violates the notes schema: {detail}")]
    SchemaViolation { detail: String },

    /// The model call itself failed (auth, network, provider error).
    #[error("Model call failed: {message}")]
    ModelFailed { message: String },

    // ── Persistence errors ────────────────────────────────────────────────
    /// At least one of the two persistence writes failed.
    ///
    /// The writes are independent: a `None` side committed successfully.
    #[error("Persistence failed ({})", describe_store_outcomes(.relational.as_ref(), .vector.as_ref()))]
    PersistenceFailed {
        relational: Option<StoreError>,
        vector: Option<StoreError>,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panic, temp file I/O).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaperNotesError {
    /// Returns the relational-side failure of a persistence error, if any.
    pub fn relational_failure(&self) -> Option<&StoreError> {
        match self {
            PaperNotesError::PersistenceFailed { relational, .. } => relational.as_ref(),
            _ => None,
        }
    }

    /// Returns the vector-side failure of a persistence error, if any.
    pub fn vector_failure(&self) -> Option<&StoreError> {
        match self {
            PaperNotesError::PersistenceFailed { vector, .. } => vector.as_ref(),
            _ => None,
        }
    }
}

/// Outcome of a single failed storage write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend was unreachable or returned an error.
    #[error("{store} write failed: {detail}")]
    PersistenceFailed { store: String, detail: String },

    /// The target schema rejected the row shape.
    #[error("{store} rejected the row: {detail}")]
    ValidationFailed { store: String, detail: String },
}

impl StoreError {
    pub fn persistence(store: impl Into<String>, detail: impl Into<String>) -> Self {
        StoreError::PersistenceFailed {
            store: store.into(),
            detail: detail.into(),
        }
    }

    pub fn validation(store: impl Into<String>, detail: impl Into<String>) -> Self {
        StoreError::ValidationFailed {
            store: store.into(),
            detail: detail.into(),
        }
    }
}

fn describe_store_outcomes(relational: Option<&StoreError>, vector: Option<&StoreError>) -> String {
    let side = |e: Option<&StoreError>| match e {
        Some(e) => e.to_string(),
        None => "ok".to_string(),
    };
    format!("relational: {}; vector: {}", side(relational), side(vector))
}
