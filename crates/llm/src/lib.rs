//! docsync LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] trait for Anthropic's Messages API.
//! Additional providers are added as new `impl` blocks in this crate without
//! any changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing
//! and status mapping live here. The [`pipeline`] crate sees only
//! [`pipeline::LlmProvider`]. Nothing here retries: a failed call is reported
//! once as [`pipeline::TransformError::Unavailable`].

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    ChatMessage, CompletionRequest, CompletionResponse, ConfigurationError, ContentSegment,
    LlmProvider, TokenCount, TransformError, Usage,
};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Public Anthropic endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const USER_AGENT: &str = concat!("docsync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Construction options for [`AnthropicProvider`].
#[derive(Debug, Clone)]
pub struct AnthropicOptions {
    /// Key sent as `x-api-key`.
    pub api_key: String,
    /// API root; override for proxies or tests.
    pub api_base: String,
    /// Per-request timeout; `None` leaves generation latency unbounded.
    pub timeout: Option<Duration>,
}

impl AnthropicOptions {
    /// Options for the public API with no timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    message: String,
}

impl From<MessagesResponse> for CompletionResponse {
    fn from(response: MessagesResponse) -> Self {
        let segments = response
            .content
            .into_iter()
            .map(|block| match block.text {
                Some(text) if block.kind == "text" => ContentSegment::Text(text),
                _ => ContentSegment::Other(block.kind),
            })
            .collect();
        Self {
            segments,
            usage: Usage {
                input_tokens: TokenCount::new(response.usage.input_tokens),
                output_tokens: TokenCount::new(response.usage.output_tokens),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// [`LlmProvider`] backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: Client,
    messages_url: String,
}

impl AnthropicProvider {
    /// Builds the HTTP client. Fails if the key is not a valid header value.
    pub fn new(options: AnthropicOptions) -> Result<Self, ConfigurationError> {
        let mut key = HeaderValue::from_str(&options.api_key).map_err(|_| {
            ConfigurationError::Invalid {
                key: "ANTHROPIC_API_KEY".into(),
                reason: "contains characters not allowed in an HTTP header".into(),
            }
        })?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ConfigurationError::Invalid {
            key: "llm".into(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            messages_url: format!("{}/v1/messages", options.api_base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    #[instrument(skip_all, fields(model = %request.model, max_tokens = request.max_tokens))]
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, TransformError> {
        let body = MessagesRequest {
            model: request.model.as_str(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: &request.messages,
        };

        let response = self
            .client
            .post(self.messages_url.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| TransformError::Unavailable {
                message: format!("request to Anthropic failed: {e}"),
                status: None,
                retry_after: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
            let detail = if envelope.error.message.is_empty() {
                String::new()
            } else {
                format!(": {} ({})", envelope.error.message, envelope.error.kind)
            };
            return Err(TransformError::Unavailable {
                message: format!("Anthropic returned {status}{detail}"),
                status: Some(status.as_u16()),
                retry_after,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            TransformError::Unavailable {
                message: format!("unexpected Anthropic response: {e}"),
                status: Some(status.as_u16()),
                retry_after: None,
            }
        })?;

        debug!(
            blocks = parsed.content.len(),
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "completion received"
        );
        Ok(parsed.into())
    }
}
