//! # paper-notes
//!
//! Ingest a research paper PDF into a searchable knowledge store.
//!
//! Given a URL, the crate downloads the PDF, optionally drops pages the
//! caller names (cover pages, appendices), decomposes it into text segments
//! through a document-partition service, asks a language model for
//! structured notes via a forced tool call, and writes both the paper row
//! and per-segment embeddings to Supabase.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Fetch    check the `.pdf` suffix, download bytes
//!  ├─ 2. Prune    delete 1-based pages via pdfium (spawn_blocking)
//!  ├─ 3. Extract  Unstructured partition API → ordered segments
//!  ├─ 4. Annotate formatNotes tool call → [{note, pageNumbers}]
//!  └─ 5. Persist  paper row + embeddings, written concurrently
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_notes::{ingest, IngestConfig, IngestRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::builder()
//!         .extraction_api_key(std::env::var("UNSTRUCTURED_API_KEY")?)
//!         .model_api_key(std::env::var("OPENAI_API_KEY")?)
//!         .storage_url(std::env::var("SUPABASE_URL")?)
//!         .storage_key(std::env::var("SUPABASE_PRIVATE_KEY")?)
//!         .build()?;
//!     let request = IngestRequest::new("https://arxiv.org/pdf/1706.03762.pdf", "Attention")
//!         .delete_pages(vec![1]);
//!     let output = ingest(&request, &config).await?;
//!     println!("{} notes", output.record.notes.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper-notes` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IngestConfig, IngestConfigBuilder};
pub use error::{PaperNotesError, StoreError};
pub use ingest::{build_store, ingest, IngestError, IngestRequest, Pipeline};
pub use output::{IngestOutput, IngestStats, NoteRecord, PaperRecord, SearchHit, TextSegment};
pub use pipeline::persist::PaperStore;
pub use progress::{IngestProgressCallback, IngestStage, NoopProgressCallback, ProgressCallback};
