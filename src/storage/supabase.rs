//! Supabase (PostgREST) backends for [`RelationalStore`] and [`VectorStore`].
//!
//! Expected schema:
//!
//! ```sql
//! create table arxiv_papers (
//!   id bigserial primary key,
//!   paper text,
//!   arxiv_url text,
//!   notes jsonb,
//!   name text
//! );
//!
//! create table arxiv_embeddings (
//!   id bigserial primary key,
//!   content text,
//!   metadata jsonb,
//!   embedding vector(1536)
//! );
//! -- plus a `match_documents(query_embedding, match_count, filter)` function
//! ```

use crate::config::IngestConfig;
use crate::error::{PaperNotesError, StoreError};
use crate::output::{PaperRecord, SearchHit, SegmentMetadata, TextSegment};
use crate::pipeline::persist::{RelationalStore, SegmentEmbedder, VectorStore};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Authenticated PostgREST client shared by both tables.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, key: &str, timeout_secs: u64) -> Result<Self, PaperNotesError> {
        let header = |value: String| {
            HeaderValue::from_str(&value).map_err(|_| {
                PaperNotesError::InvalidConfig("storage_key is not a valid header value".into())
            })
        };
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header(key.trim().to_string())?);
        headers.insert(AUTHORIZATION, header(format!("Bearer {}", key.trim()))?);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| PaperNotesError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, PaperNotesError> {
        let url = config
            .storage_url
            .as_deref()
            .ok_or_else(|| PaperNotesError::MissingCredential {
                key: "storage_url",
                hint: "Set SUPABASE_URL or pass --storage-url.".into(),
            })?;
        let key = config
            .storage_key
            .as_deref()
            .ok_or_else(|| PaperNotesError::MissingCredential {
                key: "storage_key",
                hint: "Set SUPABASE_PRIVATE_KEY or pass --storage-key.".into(),
            })?;
        Self::new(url, key, config.request_timeout_secs)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    /// POST `rows` to `table` without asking for the inserted rows back.
    async fn insert<T: Serialize + ?Sized>(&self, table: &str, rows: &T) -> Result<(), StoreError> {
        let response = self
            .http
            .post(self.rest_url(table))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(|e| StoreError::persistence(table, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_rest_error(table, status.as_u16(), &body))
    }
}

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct RestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Decide whether a failed write was rejected by the schema or failed in transit.
///
/// Data exceptions (`22xxx`), constraint violations (`23xxx`), unknown
/// columns (`42703`, `PGRST204`) and malformed bodies (`PGRST102`) mean the
/// row shape does not fit the table.
pub fn classify_rest_error(table: &str, status: u16, body: &str) -> StoreError {
    let parsed: RestError = serde_json::from_str(body).unwrap_or_default();
    let detail = match (&parsed.code, &parsed.message) {
        (Some(code), Some(message)) => format!("HTTP {status} [{code}] {message}"),
        _ => format!("HTTP {status}: {body}"),
    };

    let schema_rejection = parsed.code.as_deref().is_some_and(|code| {
        code.starts_with("22")
            || code.starts_with("23")
            || matches!(code, "42703" | "PGRST204" | "PGRST102")
    });

    if schema_rejection {
        StoreError::validation(table, detail)
    } else {
        StoreError::persistence(table, detail)
    }
}

/// One row per paper in `arxiv_papers` (or the configured table).
pub struct SupabasePaperTable {
    client: SupabaseClient,
    table: String,
}

impl SupabasePaperTable {
    pub fn new(client: SupabaseClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl RelationalStore for SupabasePaperTable {
    async fn insert_paper(&self, record: &PaperRecord) -> Result<(), StoreError> {
        self.client
            .insert(&self.table, std::slice::from_ref(record))
            .await?;
        debug!("Inserted paper row into {}", self.table);
        Ok(())
    }
}

#[derive(Serialize)]
struct EmbeddingRow<'a> {
    content: &'a str,
    metadata: &'a SegmentMetadata,
    embedding: &'a [f32],
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
    filter: serde_json::Value,
}

/// Texts per embeddings request; OpenAI accepts at most 2048 inputs.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 512;

/// Segment embeddings in `arxiv_embeddings`, searchable through `match_documents`.
pub struct SupabaseVectorStore {
    client: SupabaseClient,
    table: String,
    match_function: String,
    embedder: Arc<dyn SegmentEmbedder>,
    embedding_batch_size: usize,
}

impl SupabaseVectorStore {
    pub fn new(
        client: SupabaseClient,
        table: impl Into<String>,
        match_function: impl Into<String>,
        embedder: Arc<dyn SegmentEmbedder>,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            match_function: match_function.into(),
            embedder,
            embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        }
    }

    /// Cap the number of texts sent in one embeddings request.
    pub fn with_embedding_batch_size(mut self, size: usize) -> Self {
        self.embedding_batch_size = size.max(1);
        self
    }
}

#[async_trait]
impl VectorStore for SupabaseVectorStore {
    async fn upsert_segments(&self, segments: &[TextSegment]) -> Result<usize, StoreError> {
        if segments.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embedding_batch_size) {
            embeddings.extend(self.embedder.embed(batch).await?);
        }
        debug!(
            "Embedded {} segments in {} request(s)",
            texts.len(),
            texts.len().div_ceil(self.embedding_batch_size)
        );
        if embeddings.len() != segments.len() {
            return Err(StoreError::persistence(
                &self.table,
                format!(
                    "{} embeddings for {} segments",
                    embeddings.len(),
                    segments.len()
                ),
            ));
        }

        let rows: Vec<EmbeddingRow<'_>> = segments
            .iter()
            .zip(&embeddings)
            .map(|(segment, embedding)| EmbeddingRow {
                content: &segment.text,
                metadata: &segment.metadata,
                embedding,
            })
            .collect();

        // One request keeps the batch atomic on the PostgREST side.
        self.client.insert(&self.table, &rows).await?;
        debug!("Inserted {} rows into {}", rows.len(), self.table);
        Ok(rows.len())
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let mut embedded = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = embedded.pop().ok_or_else(|| {
            StoreError::persistence(&self.match_function, "no embedding returned for query")
        })?;

        let request = MatchRequest {
            query_embedding: &query_embedding,
            match_count: k,
            filter: serde_json::json!({}),
        };
        let rpc = format!("rpc/{}", self.match_function);
        let response = self
            .client
            .http
            .post(self.client.rest_url(&rpc))
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::persistence(&self.match_function, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_rest_error(
                &self.match_function,
                status.as_u16(),
                &body,
            ));
        }
        response.json::<Vec<SearchHit>>().await.map_err(|e| {
            StoreError::persistence(&self.match_function, format!("bad response: {e}"))
        })
    }
}
