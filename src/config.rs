//! Configuration for a paper ingestion run.
//!
//! Every credential and endpoint the pipeline needs lives in one explicit
//! [`IngestConfig`] value, built via [`IngestConfigBuilder`] and validated
//! once before any side effect begins. Components receive the pieces they
//! need at construction time; nothing below the CLI reads the process
//! environment.

use crate::error::PaperNotesError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default Unstructured partition endpoint.
pub const DEFAULT_EXTRACTION_URL: &str = "https://api.unstructured.io/general/v0/general";

/// Sampling temperature for note generation. Fixed: notes must be reproducible.
pub const NOTES_TEMPERATURE: f32 = 0.0;

/// Configuration for ingesting one paper.
///
/// # Example
/// ```rust
/// use paper_notes::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .extraction_api_key("unstructured-key")
///     .model_api_key("sk-test")
///     .storage_url("https://project.supabase.co")
///     .storage_key("service-role-key")
///     .build()
///     .unwrap();
/// assert_eq!(config.papers_table, "arxiv_papers");
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// API key for the document decomposition service. Required.
    pub extraction_api_key: Option<String>,

    /// API key for the chat/embedding model provider. Required.
    pub model_api_key: Option<String>,

    /// Base URL of the storage backend (Supabase project URL). Required.
    pub storage_url: Option<String>,

    /// Service key for the storage backend. Required.
    pub storage_key: Option<String>,

    /// Partition endpoint of the decomposition service.
    pub extraction_url: String,

    /// Processing strategy sent to the decomposition service. Default: `hi_res`.
    ///
    /// `hi_res` runs layout detection, which keeps tables and captions as
    /// their own segments. `fast` only reads the text layer.
    pub extraction_strategy: String,

    /// Chat model used for note generation. Default: `gpt-4.1`.
    pub model: String,

    /// Maximum tokens the model may generate for the notes. Default: 4096.
    pub max_tokens: usize,

    /// Pre-constructed LLM provider. Takes precedence over `model_api_key`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Relational table receiving one row per paper.
    pub papers_table: String,

    /// Vector table receiving one row per segment.
    pub embeddings_table: String,

    /// Similarity-search function exposed by the vector table.
    pub match_function: String,

    /// Download timeout for the paper URL in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for extraction and storage requests in seconds. Default: 300.
    ///
    /// `hi_res` extraction of a 30-page paper routinely takes over a minute.
    pub request_timeout_secs: u64,

    /// Directory for the extractor's scratch file. Default: system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extraction_api_key: None,
            model_api_key: None,
            storage_url: None,
            storage_key: None,
            extraction_url: DEFAULT_EXTRACTION_URL.to_string(),
            extraction_strategy: "hi_res".to_string(),
            model: "gpt-4.1".to_string(),
            max_tokens: 4096,
            provider: None,
            papers_table: "arxiv_papers".to_string(),
            embeddings_table: "arxiv_embeddings".to_string(),
            match_function: "match_documents".to_string(),
            download_timeout_secs: 120,
            request_timeout_secs: 300,
            scratch_dir: None,
        }
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("extraction_api_key", &redact(&self.extraction_api_key))
            .field("model_api_key", &redact(&self.model_api_key))
            .field("storage_url", &self.storage_url)
            .field("storage_key", &redact(&self.storage_key))
            .field("extraction_url", &self.extraction_url)
            .field("extraction_strategy", &self.extraction_strategy)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("papers_table", &self.papers_table)
            .field("embeddings_table", &self.embeddings_table)
            .field("match_function", &self.match_function)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("scratch_dir", &self.scratch_dir)
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check that every required key is present and well-formed.
    ///
    /// Keys are checked in a fixed order so the first missing one is always
    /// the one reported.
    pub fn validate(&self) -> Result<(), PaperNotesError> {
        require(
            &self.extraction_api_key,
            "extraction_api_key",
            "Set UNSTRUCTURED_API_KEY or pass --extraction-api-key.",
        )?;
        if self.provider.is_none() {
            require(
                &self.model_api_key,
                "model_api_key",
                "Set OPENAI_API_KEY or pass --model-api-key.",
            )?;
        }
        let storage_url = require(
            &self.storage_url,
            "storage_url",
            "Set SUPABASE_URL or pass --storage-url.",
        )?;
        require(
            &self.storage_key,
            "storage_key",
            "Set SUPABASE_PRIVATE_KEY or pass --storage-key.",
        )?;

        for (name, url) in [
            ("storage_url", storage_url),
            ("extraction_url", self.extraction_url.as_str()),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(PaperNotesError::InvalidConfig(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.max_tokens == 0 {
            return Err(PaperNotesError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

fn require<'a>(
    value: &'a Option<String>,
    key: &'static str,
    hint: &str,
) -> Result<&'a str, PaperNotesError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PaperNotesError::MissingCredential {
            key,
            hint: hint.to_string(),
        }),
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn extraction_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.extraction_api_key = Some(key.into());
        self
    }

    pub fn model_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.model_api_key = Some(key.into());
        self
    }

    pub fn storage_url(mut self, url: impl Into<String>) -> Self {
        self.config.storage_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.storage_key = Some(key.into());
        self
    }

    pub fn extraction_url(mut self, url: impl Into<String>) -> Self {
        self.config.extraction_url = url.into();
        self
    }

    pub fn extraction_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.extraction_strategy = strategy.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn papers_table(mut self, table: impl Into<String>) -> Self {
        self.config.papers_table = table.into();
        self
    }

    pub fn embeddings_table(mut self, table: impl Into<String>) -> Self {
        self.config.embeddings_table = table.into();
        self
    }

    pub fn match_function(mut self, name: impl Into<String>) -> Self {
        self.config.match_function = name.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating required keys.
    pub fn build(self) -> Result<IngestConfig, PaperNotesError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
