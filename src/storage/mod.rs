//! Concrete persistence backends.
//!
//! The pipeline only depends on the traits in [`crate::pipeline::persist`];
//! this module provides the Supabase implementation used by the CLI.

pub mod supabase;

pub use supabase::{SupabaseClient, SupabasePaperTable, SupabaseVectorStore};
