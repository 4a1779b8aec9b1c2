//! Document extraction: PDF bytes → ordered text segments.
//!
//! ## Scratch file
//!
//! The decomposition service receives the PDF as a file upload, so the bytes
//! are staged in a [`tempfile::NamedTempFile`] for the duration of the call.
//! The guard deletes the file when it goes out of scope, which covers the
//! success path, every error path, and a caller dropping the future mid-call.

use crate::config::IngestConfig;
use crate::error::PaperNotesError;
use crate::output::{SegmentMetadata, TextSegment};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Converts a PDF into text segments in reading order.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, pdf: &[u8]) -> Result<Vec<TextSegment>, PaperNotesError>;
}

/// [`DocumentExtractor`] backed by the Unstructured partition API.
pub struct UnstructuredExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    strategy: String,
    scratch_dir: Option<PathBuf>,
}

impl UnstructuredExtractor {
    /// Create an extractor. A missing `api_key` is only reported when
    /// [`DocumentExtractor::extract`] is called, before any request is sent.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        strategy: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, PaperNotesError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PaperNotesError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            strategy: strategy.into(),
            scratch_dir: None,
        })
    }

    pub fn from_config(config: &IngestConfig) -> Result<Self, PaperNotesError> {
        let mut extractor = Self::new(
            config.extraction_url.clone(),
            config.extraction_api_key.clone(),
            config.extraction_strategy.clone(),
            config.request_timeout_secs,
        )?;
        extractor.scratch_dir = config.scratch_dir.clone();
        Ok(extractor)
    }

    /// Stage scratch files in `dir` instead of the system temp directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    fn stage(&self, pdf: &[u8]) -> Result<NamedTempFile, PaperNotesError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("paper-").suffix(".pdf");
        let mut file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| PaperNotesError::Internal(format!("tempfile: {e}")))?;
        file.write_all(pdf)
            .and_then(|_| file.flush())
            .map_err(|e| PaperNotesError::Internal(format!("tempfile write: {e}")))?;
        Ok(file)
    }

    async fn partition(
        &self,
        api_key: &str,
        path: &Path,
    ) -> Result<Vec<TextSegment>, PaperNotesError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PaperNotesError::Internal(format!("read scratch file: {e}")))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "paper.pdf".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/pdf")
            .map_err(|e| PaperNotesError::Internal(format!("multipart: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("files", part)
            .text("strategy", self.strategy.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .header("unstructured-api-key", api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| PaperNotesError::ExtractionFailed {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(PaperNotesError::ExtractionFailed {
                detail: format!("HTTP {status}: {body}"),
            });
        }

        let elements: Vec<PartitionElement> =
            response
                .json()
                .await
                .map_err(|e| PaperNotesError::ExtractionFailed {
                    detail: format!("unexpected response body: {e}"),
                })?;

        Ok(elements_to_segments(elements))
    }
}

#[async_trait]
impl DocumentExtractor for UnstructuredExtractor {
    async fn extract(&self, pdf: &[u8]) -> Result<Vec<TextSegment>, PaperNotesError> {
        let api_key = match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key,
            _ => {
                return Err(PaperNotesError::MissingCredential {
                    key: "extraction_api_key",
                    hint: "Set UNSTRUCTURED_API_KEY or pass --extraction-api-key.".into(),
                })
            }
        };

        let scratch = self.stage(pdf)?;
        debug!("Staged PDF at {}", scratch.path().display());
        info!("Extracting segments via {} ({})", self.endpoint, self.strategy);

        let result = self.partition(api_key, scratch.path()).await;
        drop(scratch);

        match &result {
            Ok(segments) => info!("Extracted {} segments", segments.len()),
            Err(e) => warn!("Extraction failed: {}", e),
        }
        result
    }
}

/// One element of the partition API response.
#[derive(Debug, Deserialize)]
struct PartitionElement {
    #[serde(rename = "type", default)]
    category: Option<String>,
    #[serde(default)]
    element_id: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

fn elements_to_segments(elements: Vec<PartitionElement>) -> Vec<TextSegment> {
    elements
        .into_iter()
        .filter(|el| !el.text.trim().is_empty())
        .map(|el| {
            let mut metadata = segment_metadata(el.metadata);
            metadata.category = el.category.or(metadata.category);
            metadata.element_id = el.element_id.or(metadata.element_id);
            TextSegment::new(el.text, metadata)
        })
        .collect()
}

/// Lift the known fields out of the element metadata one by one.
///
/// A field with an unexpected type stays in `extra` as-is, so one odd value
/// never costs the rest of the provenance.
fn segment_metadata(mut raw: Map<String, Value>) -> SegmentMetadata {
    let page_number = take_field(&mut raw, "page_number");
    let category = take_field(&mut raw, "category");
    let element_id = take_field(&mut raw, "element_id");
    let filename = take_field(&mut raw, "filename");
    SegmentMetadata {
        page_number,
        category,
        element_id,
        filename,
        extra: raw,
    }
}

fn take_field<T: DeserializeOwned>(raw: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = raw.remove(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Keeping unparsed metadata field '{}' ({}): {}", key, e, value);
            raw.insert(key.to_string(), value);
            None
        }
    }
}
