//! The text transform client: prompt construction, fixed generation
//! parameters, and usage accounting on top of an [`LlmProvider`].

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    ChatMessage, CompletionRequest, ConfigurationError, LlmProvider, ModelId, PriceTable,
    TransformError, Usage, UsageCost,
};

/// Text placed before the caller's instructions.
pub const INSTRUCTION_PREAMBLE: &str = "Instructions: ";

/// Text placed between the instructions and the document body.
pub const CONTENT_SEPARATOR: &str = "\n\nContent to process:\n";

/// Default upper bound on generated tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Default sampling temperature: varied but controlled output.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Builds the single user message sent for a transform.
///
/// The document is appended as-is. There is no chunking or truncation; the
/// caller must keep it within the model's input limit.
pub fn build_prompt(content: &str, instructions: &str) -> String {
    let mut prompt = String::with_capacity(
        INSTRUCTION_PREAMBLE.len() + instructions.len() + CONTENT_SEPARATOR.len() + content.len(),
    );
    prompt.push_str(INSTRUCTION_PREAMBLE);
    prompt.push_str(instructions);
    prompt.push_str(CONTENT_SEPARATOR);
    prompt.push_str(content);
    prompt
}

// ---------------------------------------------------------------------------
// Generation parameters
// ---------------------------------------------------------------------------

/// Fixed parameters attached to every transform request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    model: ModelId,
    max_tokens: u32,
    temperature: f32,
}

impl GenerationParams {
    /// Validates and creates a parameter set.
    ///
    /// `max_tokens` must be positive and `temperature` within `[0.0, 1.0]`.
    pub fn new(
        model: ModelId,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Self, ConfigurationError> {
        if max_tokens == 0 {
            return Err(ConfigurationError::Invalid {
                key: "llm.max_tokens".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigurationError::Invalid {
                key: "llm.temperature".into(),
                reason: format!("{temperature} is outside [0.0, 1.0]"),
            });
        }
        Ok(Self {
            model,
            max_tokens,
            temperature,
        })
    }

    /// Model identifier.
    pub fn model(&self) -> &ModelId {
        &self.model
    }

    /// Upper bound on generated tokens.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: ModelId::claude_3_sonnet(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

// ---------------------------------------------------------------------------
// Transformer
// ---------------------------------------------------------------------------

/// Result of one transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    /// First text segment of the response, or `""` if there was none.
    pub text: String,
    /// Token counters reported by the service.
    pub usage: Usage,
    /// Estimated cost of `usage`.
    pub cost: UsageCost,
}

/// Rewrites a document according to natural-language instructions.
#[derive(Clone)]
pub struct TextTransformer {
    provider: Arc<dyn LlmProvider>,
    params: GenerationParams,
    prices: PriceTable,
}

impl std::fmt::Debug for TextTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTransformer")
            .field("params", &self.params)
            .field("prices", &self.prices)
            .finish_non_exhaustive()
    }
}

impl TextTransformer {
    /// Creates a transformer over `provider`.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        params: GenerationParams,
        prices: PriceTable,
    ) -> Self {
        Self {
            provider,
            params,
            prices,
        }
    }

    /// Sends `content` with `instructions` and returns the rewritten text.
    ///
    /// An empty `text` means the service produced no text segment; it is not
    /// an error. Service failures are [`TransformError::Unavailable`] and are
    /// not retried.
    #[instrument(skip_all, fields(model = %self.params.model, content_len = content.len()))]
    pub async fn transform(
        &self,
        content: &str,
        instructions: &str,
    ) -> Result<TransformOutput, TransformError> {
        let request = CompletionRequest {
            model: self.params.model.clone(),
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            messages: vec![ChatMessage::user(build_prompt(content, instructions))],
        };

        let response = self.provider.complete(request).await.map_err(|e| {
            warn!(error = %e, "text transform failed");
            e
        })?;

        let text = match response.first_text() {
            Some(text) => text.to_string(),
            None => {
                debug!(
                    segments = response.segments.len(),
                    "response has no text segment"
                );
                String::new()
            }
        };

        let usage = response.usage;
        let cost = self.prices.cost_of(usage);
        info!(
            input_tokens = usage.input_tokens.as_u64(),
            output_tokens = usage.output_tokens.as_u64(),
            input_cost = %cost.input,
            output_cost = %cost.output,
            total_cost = %cost.total,
            "transform usage"
        );

        Ok(TransformOutput { text, usage, cost })
    }
}
