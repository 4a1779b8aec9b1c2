//! Pipeline stages for paper ingestion.
//!
//! Each submodule owns one step and exposes it behind a trait, so the
//! orchestrator in [`crate::ingest`] can be driven by real backends or by
//! in-memory fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ prune ──▶ extract ──▶ notes ──▶ persist
//! (fetch)   (pdfium)  (partition) (tool call) (rows + vectors)
//! ```
//!
//! 1. [`input`]: check the URL shape and download the PDF bytes
//! 2. [`prune`]: drop 1-based pages; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`extract`]: stage the PDF in a scratch file and partition it into
//!    ordered text segments
//! 4. [`notes`]: force the `formatNotes` tool and validate its arguments
//! 5. [`persist`]: write the paper row and segment embeddings concurrently

pub mod extract;
pub mod input;
pub mod notes;
pub mod persist;
pub mod prune;
