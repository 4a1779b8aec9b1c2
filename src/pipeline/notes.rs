//! Note generation: segments → schema-validated [`NoteRecord`]s.
//!
//! Two seams live here:
//!
//! * [`NoteGenerator`]: what the orchestrator calls. One capability: model
//!   call plus response validation.
//! * [`ToolModel`]: the raw "call this tool" backend that
//!   [`SchemaNoteGenerator`] drives. [`LlmToolModel`] implements it over any
//!   `edgequake-llm` provider.
//!
//! Validation is all-or-nothing. A response without the tool call, with a
//! different tool, or with arguments that do not deserialize into the
//! schema fails with [`PaperNotesError::SchemaViolation`]; no individual
//! note is salvaged from a malformed batch.

use crate::config::{IngestConfig, NOTES_TEMPERATURE};
use crate::error::PaperNotesError;
use crate::output::{join_segments, NoteRecord, TextSegment};
use crate::prompts::{
    notes_tool_parameters, notes_user_prompt, NOTES_SYSTEM_PROMPT, NOTES_TOOL_DESCRIPTION,
    NOTES_TOOL_NAME,
};
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, LLMProvider, LlmError, OpenAIProvider, ToolChoice,
    ToolDefinition,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Derives notes from a paper's segments.
#[async_trait]
pub trait NoteGenerator: Send + Sync {
    async fn generate_notes(
        &self,
        segments: &[TextSegment],
    ) -> Result<Vec<NoteRecord>, PaperNotesError>;
}

/// A tool the model must call.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    /// The `formatNotes` tool.
    pub fn notes() -> Self {
        Self {
            name: NOTES_TOOL_NAME.to_string(),
            description: NOTES_TOOL_DESCRIPTION.to_string(),
            parameters: notes_tool_parameters(),
        }
    }
}

/// The first tool call found in a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub name: String,
    /// Raw JSON arguments as returned by the model.
    pub arguments: String,
}

/// A chat model that can be forced to call one tool.
#[async_trait]
pub trait ToolModel: Send + Sync {
    /// Context window in tokens; `0` means unknown.
    fn context_window(&self) -> usize;

    /// Send one system + user exchange and return the tool call, if any.
    async fn call_tool(
        &self,
        system: &str,
        user: &str,
        tool: &ToolSpec,
        temperature: f32,
    ) -> Result<Option<ToolInvocation>, PaperNotesError>;
}

/// [`ToolModel`] over an `edgequake-llm` provider.
pub struct LlmToolModel {
    provider: Arc<dyn LLMProvider>,
    max_tokens: usize,
}

impl LlmToolModel {
    pub fn new(provider: Arc<dyn LLMProvider>, max_tokens: usize) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }

    /// Use `config.provider` when set, otherwise an OpenAI provider built
    /// from `config.model_api_key` and `config.model`.
    pub fn from_config(config: &IngestConfig) -> Result<Self, PaperNotesError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config.max_tokens))
    }
}

/// Resolve the chat provider from explicit configuration only.
pub fn resolve_provider(config: &IngestConfig) -> Result<Arc<dyn LLMProvider>, PaperNotesError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }
    match config.model_api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(Arc::new(
            OpenAIProvider::new(key).with_model(&config.model),
        )),
        _ => Err(PaperNotesError::MissingCredential {
            key: "model_api_key",
            hint: "Set OPENAI_API_KEY or pass --model-api-key.".into(),
        }),
    }
}

#[async_trait]
impl ToolModel for LlmToolModel {
    fn context_window(&self) -> usize {
        self.provider.max_context_length()
    }

    async fn call_tool(
        &self,
        system: &str,
        user: &str,
        tool: &ToolSpec,
        temperature: f32,
    ) -> Result<Option<ToolInvocation>, PaperNotesError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let tools = vec![ToolDefinition::function(
            &tool.name,
            &tool.description,
            tool.parameters.clone(),
        )];
        let options = CompletionOptions {
            temperature: Some(temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat_with_tools(
                &messages,
                &tools,
                Some(ToolChoice::function(&tool.name)),
                Some(&options),
            )
            .await
            .map_err(|e| classify_model_error(&e, estimate_tokens(user), self.context_window()))?;

        debug!(
            "Model returned {} tool call(s), {} prompt / {} completion tokens",
            response.tool_calls.len(),
            response.prompt_tokens,
            response.completion_tokens
        );

        Ok(response.tool_calls.into_iter().next().map(|call| ToolInvocation {
            name: call.function.name,
            arguments: call.function.arguments,
        }))
    }
}

/// Map a provider error onto the error taxonomy.
///
/// A typed token-limit error carries the provider's own numbers. Providers
/// that only report the overflow in the message text fall back to our
/// estimate.
fn classify_model_error(
    error: &LlmError,
    estimated_tokens: usize,
    limit: usize,
) -> PaperNotesError {
    if let LlmError::TokenLimitExceeded { max, got } = error {
        return PaperNotesError::ContextTooLarge {
            estimated_tokens: *got,
            limit: *max,
        };
    }

    let message = error.to_string();
    let lower = message.to_ascii_lowercase();
    if lower.contains("context_length_exceeded")
        || lower.contains("maximum context length")
        || lower.contains("context window")
    {
        PaperNotesError::ContextTooLarge {
            estimated_tokens,
            limit,
        }
    } else {
        PaperNotesError::ModelFailed { message }
    }
}

/// Rough token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// [`NoteGenerator`] that forces the `formatNotes` tool and validates its arguments.
pub struct SchemaNoteGenerator {
    model: Arc<dyn ToolModel>,
    tool: ToolSpec,
}

impl SchemaNoteGenerator {
    pub fn new(model: Arc<dyn ToolModel>) -> Self {
        Self {
            model,
            tool: ToolSpec::notes(),
        }
    }
}

#[async_trait]
impl NoteGenerator for SchemaNoteGenerator {
    async fn generate_notes(
        &self,
        segments: &[TextSegment],
    ) -> Result<Vec<NoteRecord>, PaperNotesError> {
        let paper = join_segments(segments);
        let user = notes_user_prompt(&paper);

        let estimated = estimate_tokens(NOTES_SYSTEM_PROMPT) + estimate_tokens(&user);
        let limit = self.model.context_window();
        if limit > 0 && estimated > limit {
            warn!("Paper needs ~{} tokens, model allows {}", estimated, limit);
            return Err(PaperNotesError::ContextTooLarge {
                estimated_tokens: estimated,
                limit,
            });
        }

        info!(
            "Generating notes from {} segments (~{} tokens)",
            segments.len(),
            estimated
        );
        let invocation = self
            .model
            .call_tool(NOTES_SYSTEM_PROMPT, &user, &self.tool, NOTES_TEMPERATURE)
            .await?;

        let notes = parse_notes_invocation(invocation)?;
        info!("Model produced {} notes", notes.len());
        Ok(notes)
    }
}

#[derive(Debug, Deserialize)]
struct NotesArguments {
    notes: Vec<NoteRecord>,
}

/// Validate a tool call against the notes schema.
pub fn parse_notes_invocation(
    invocation: Option<ToolInvocation>,
) -> Result<Vec<NoteRecord>, PaperNotesError> {
    let invocation = invocation.ok_or_else(|| PaperNotesError::SchemaViolation {
        detail: format!("model did not call {NOTES_TOOL_NAME}"),
    })?;

    if invocation.name != NOTES_TOOL_NAME {
        return Err(PaperNotesError::SchemaViolation {
            detail: format!(
                "model called '{}' instead of {NOTES_TOOL_NAME}",
                invocation.name
            ),
        });
    }

    let args: NotesArguments = serde_json::from_str(&invocation.arguments).map_err(|e| {
        PaperNotesError::SchemaViolation {
            detail: format!("arguments do not match the notes schema: {e}"),
        }
    })?;
    Ok(args.notes)
}
