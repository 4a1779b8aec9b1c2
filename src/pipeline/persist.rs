//! Dual-write persistence: one relational row plus one vector entry per segment.
//!
//! The two writes are independent futures joined by [`tokio::join!`]. They
//! are not transactional with respect to each other: either may commit while
//! the other fails, and [`PaperStore::persist`] reports both outcomes in one
//! [`PaperNotesError::PersistenceFailed`]. There is no idempotency key;
//! persisting the same paper twice creates a second row and a second set of
//! vector entries.

use crate::config::IngestConfig;
use crate::error::{PaperNotesError, StoreError};
use crate::output::{PaperRecord, SearchHit, TextSegment};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Table holding one row per ingested paper.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Insert `record` as a single row. Either the whole row lands or nothing does.
    async fn insert_paper(&self, record: &PaperRecord) -> Result<(), StoreError>;
}

/// Similarity-searchable collection of segment embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and store every segment; returns the number of entries written.
    async fn upsert_segments(&self, segments: &[TextSegment]) -> Result<usize, StoreError>;

    /// Nearest-neighbour search for `query`, best match first.
    async fn similarity_search(&self, query: &str, k: usize)
        -> Result<Vec<SearchHit>, StoreError>;
}

/// Text → embedding vectors.
#[async_trait]
pub trait SegmentEmbedder: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError>;
}

/// [`SegmentEmbedder`] over an `edgequake-llm` embedding provider.
pub struct LlmEmbedder {
    provider: Arc<dyn edgequake_llm::EmbeddingProvider>,
}

impl LlmEmbedder {
    pub fn new(provider: Arc<dyn edgequake_llm::EmbeddingProvider>) -> Self {
        Self { provider }
    }

    /// OpenAI embeddings keyed by `config.model_api_key`.
    pub fn from_config(config: &IngestConfig) -> Result<Self, PaperNotesError> {
        match config.model_api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {
                Ok(Self::new(Arc::new(edgequake_llm::OpenAIProvider::new(key))))
            }
            _ => Err(PaperNotesError::MissingCredential {
                key: "model_api_key",
                hint: "Embeddings need OPENAI_API_KEY or --model-api-key.".into(),
            }),
        }
    }
}

#[async_trait]
impl SegmentEmbedder for LlmEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self
            .provider
            .embed(texts)
            .await
            .map_err(|e| StoreError::persistence("embeddings", e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(StoreError::persistence(
                "embeddings",
                format!(
                    "provider returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                ),
            ));
        }
        Ok(vectors)
    }
}

/// The two persistence targets for a paper.
#[derive(Clone)]
pub struct PaperStore {
    relational: Arc<dyn RelationalStore>,
    vectors: Arc<dyn VectorStore>,
}

impl PaperStore {
    pub fn new(relational: Arc<dyn RelationalStore>, vectors: Arc<dyn VectorStore>) -> Self {
        Self {
            relational,
            vectors,
        }
    }

    /// The vector side, for similarity queries.
    pub fn vectors(&self) -> &Arc<dyn VectorStore> {
        &self.vectors
    }

    /// Write `record` and `segments` concurrently and wait for both.
    ///
    /// Returns the number of vector entries written.
    ///
    /// # Errors
    /// [`PaperNotesError::PersistenceFailed`] when either write fails. The
    /// side that is `None` inside the error committed.
    pub async fn persist(
        &self,
        record: &PaperRecord,
        segments: &[TextSegment],
    ) -> Result<usize, PaperNotesError> {
        info!(
            "Persisting '{}': 1 row, {} vector entries",
            record.name,
            segments.len()
        );

        let (relational, vector) = tokio::join!(
            self.relational.insert_paper(record),
            self.vectors.upsert_segments(segments)
        );

        match (relational, vector) {
            (Ok(()), Ok(written)) => Ok(written),
            (relational, vector) => {
                let relational = relational.err();
                let vector = vector.err();
                if let Some(ref e) = relational {
                    warn!("Relational insert failed: {}", e);
                }
                if let Some(ref e) = vector {
                    warn!("Vector upsert failed: {}", e);
                }
                Err(PaperNotesError::PersistenceFailed { relational, vector })
            }
        }
    }
}
