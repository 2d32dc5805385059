//! Core domain for docsync.
//!
//! docsync fetches one document from a versioned content store, rewrites it
//! with a text-generation service according to natural-language instructions,
//! and writes the result back under optimistic-concurrency control.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; the `github` and `llm` crates define *how* to
//! supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ContentPath`, `VersionToken`, etc.) |
//! | [`types`] | Value types (`RepoConfig`, `DefaultContent`, `TokenCost`, etc.) |
//! | [`errors`] | Error taxonomy and advisory retry policy |
//! | [`ports`] | `ContentRepository` and `LlmProvider` traits |
//! | [`store`] | Default-content and version-token policy |
//! | [`transform`] | Prompt construction and usage accounting |
//! | [`executor`] | The read-transform-write pipeline |

pub mod errors;
pub mod executor;
pub mod identifiers;
pub mod ports;
pub mod store;
pub mod transform;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{ConfigurationError, PipelineError, RetryPolicy, StoreError, TransformError};
pub use executor::{RunReport, SyncPipeline};
pub use identifiers::{
    BranchName, ContentPath, ModelId, PipelineRunId, RepositoryName, RepositoryOwner,
    VersionToken,
};
pub use ports::{
    ChatMessage, CompletionRequest, CompletionResponse, ContentRepository, ContentSegment,
    LlmProvider, PutRequest, Role,
};
pub use store::{ContentStore, ReadContent, DEFAULT_AGENT_NAME};
pub use transform::{
    build_prompt, GenerationParams, TextTransformer, TransformOutput, CONTENT_SEPARATOR,
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, INSTRUCTION_PREAMBLE,
};
pub use types::{
    ContentUpdate, DefaultContent, PriceTable, RepoConfig, StoredResource, Timestamp, TokenCost,
    TokenCount, Usage, UsageCost, WriteMode, WriteOutcome,
};
