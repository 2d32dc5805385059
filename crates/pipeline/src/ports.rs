//! Port traits implemented by the infrastructure crates.
//!
//! The pipeline depends only on these traits. The `github` crate supplies a
//! [`ContentRepository`] and the `llm` crate an [`LlmProvider`]; tests supply
//! fakes and `mockall` mocks.
//!
//! Both traits are dyn-compatible (via `async_trait`) so the composition root
//! can hold them as `Arc<dyn Trait>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::{
    ContentPath, ModelId, RepoConfig, StoreError, StoredResource, TransformError, Usage,
    VersionToken,
};

// ---------------------------------------------------------------------------
// Content store port
// ---------------------------------------------------------------------------

/// A create-or-update request as sent to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    /// Target path.
    pub path: ContentPath,
    /// Full UTF-8 body to store.
    pub content: String,
    /// Version precondition. `None` asks the store to create the file.
    pub sha: Option<VersionToken>,
    /// Commit message recorded by the store.
    pub message: String,
}

/// Raw access to a versioned file store.
///
/// Implementations translate transport failures into [`StoreError`]:
///
/// - a missing resource is [`StoreError::NotFound`],
/// - a directory (or any non-file) is [`StoreError::InvalidResourceKind`],
/// - a rejected version precondition is [`StoreError::VersionConflict`],
/// - everything else is [`StoreError::Unavailable`].
///
/// No policy lives here; default content and version discovery belong to
/// [`crate::ContentStore`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Fetches the file at `path`.
    async fn get(
        &self,
        repo: &RepoConfig,
        path: &ContentPath,
    ) -> Result<StoredResource, StoreError>;

    /// Creates or updates the file described by `request`, returning the new
    /// version token.
    ///
    /// When `request.sha` is set the store must reject the write with
    /// [`StoreError::VersionConflict`] if the file's current token differs.
    async fn put(&self, repo: &RepoConfig, request: PutRequest)
        -> Result<VersionToken, StoreError>;
}

// ---------------------------------------------------------------------------
// Text-generation port
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller.
    User,
    /// The model.
    Assistant,
}

/// One message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Plain-text body.
    pub content: String,
}

impl ChatMessage {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model to run.
    pub model: ModelId,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
}

/// One typed segment of a completion response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSegment {
    /// Generated text.
    Text(String),
    /// Any non-text segment (tool use, thinking, ...). Carries the reported type.
    Other(String),
}

/// A completion response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Segments in the order the service returned them.
    pub segments: Vec<ContentSegment>,
    /// Token counters reported by the service.
    pub usage: Usage,
}

impl CompletionResponse {
    /// Returns the first text segment, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.segments.iter().find_map(|segment| match segment {
            ContentSegment::Text(text) => Some(text.as_str()),
            ContentSegment::Other(_) => None,
        })
    }
}

/// A text-generation service.
///
/// Implementations map every transport or service failure to
/// [`TransformError::Unavailable`] and never retry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Submits `request` and returns the service's response.
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, TransformError>;
}
