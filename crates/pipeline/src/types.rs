//! Shared value types for the docsync domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (costs are non-negative, the default
//! content table is keyed by validated paths) and participate in domain
//! computations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContentPath, RepositoryName, RepositoryOwner, VersionToken};

// ---------------------------------------------------------------------------
// Store namespace and documents
// ---------------------------------------------------------------------------

/// Identifies the repository a pipeline reads from and writes to.
///
/// Created once at process start and read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Account or organisation owning the repository.
    pub owner: RepositoryOwner,
    /// Repository name.
    pub repo: RepositoryName,
}

impl RepoConfig {
    /// Creates a [`RepoConfig`].
    pub fn new(owner: RepositoryOwner, repo: RepositoryName) -> Self {
        Self { owner, repo }
    }
}

impl std::fmt::Display for RepoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

// ---------------------------------------------------------------------------

/// A pending write of `content` to `path`.
///
/// `sha` is set only when the writer wants the write conditioned on a version
/// it already knows. When it is `None` the store client looks the current
/// version up itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUpdate {
    /// Target path.
    pub path: ContentPath,
    /// Full UTF-8 body to store.
    pub content: String,
    /// Version the write is conditioned on, if known.
    pub sha: Option<VersionToken>,
}

impl ContentUpdate {
    /// Creates an update with no known version token.
    pub fn new(path: ContentPath, content: impl Into<String>) -> Self {
        Self {
            path,
            content: content.into(),
            sha: None,
        }
    }

    /// Conditions the update on a known version token.
    pub fn with_sha(mut self, sha: VersionToken) -> Self {
        self.sha = Some(sha);
        self
    }
}

/// A file as it currently exists in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResource {
    /// Path of the file.
    pub path: ContentPath,
    /// Decoded UTF-8 body.
    pub content: String,
    /// Current version token.
    pub sha: VersionToken,
}

/// Whether a write created a new file or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// No version token was supplied; the file did not exist.
    Created,
    /// The write was conditioned on the previous version token.
    Updated,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Path that was written.
    pub path: ContentPath,
    /// Version token the store issued for the new content.
    pub sha: VersionToken,
    /// Create or update.
    pub mode: WriteMode,
}

// ---------------------------------------------------------------------------
// Default content
// ---------------------------------------------------------------------------

/// Fallback document bodies keyed by path.
///
/// Consulted only when a resource is missing or holds nothing but whitespace.
/// Paths without an entry fall back to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultContent {
    entries: BTreeMap<ContentPath, String>,
}

impl DefaultContent {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the default body for `path`.
    pub fn insert(&mut self, path: ContentPath, body: impl Into<String>) {
        self.entries.insert(path, body.into());
    }

    /// Builder-style [`DefaultContent::insert`].
    pub fn with(mut self, path: ContentPath, body: impl Into<String>) -> Self {
        self.insert(path, body);
        self
    }

    /// Returns the registered body for `path`, or `""` if there is none.
    pub fn for_path(&self, path: &ContentPath) -> &str {
        self.entries.get(path).map(String::as_str).unwrap_or("")
    }

    /// Returns `true` if `path` has a registered default.
    pub fn contains(&self, path: &ContentPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no defaults are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ContentPath, String)> for DefaultContent {
    fn from_iter<I: IntoIterator<Item = (ContentPath, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Token and cost types
// ---------------------------------------------------------------------------

/// Number of tokens consumed in a text-generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Wraps a token count reported by the service.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Raw count.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for TokenCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

// ---------------------------------------------------------------------------

/// Monetary cost of token usage, expressed in US dollars.
///
/// Callers are responsible for rounding to suitable display precision.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TokenCost(f64);

impl TokenCost {
    /// Wraps a USD amount.
    ///
    /// Negative and non-finite amounts are rejected.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Zero dollars.
    pub fn zero() -> Self {
        Self(0.0)
    }

    /// Amount in USD.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl Default for TokenCost {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for TokenCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.6}", self.0)
    }
}

impl std::ops::Add for TokenCost {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

// ---------------------------------------------------------------------------

/// Per-1000-token prices (USD) for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    /// Price of 1000 prompt tokens.
    pub input_per_1k: f64,
    /// Price of 1000 generated tokens.
    pub output_per_1k: f64,
}

impl PriceTable {
    /// Claude 3 Sonnet list prices.
    pub const CLAUDE_3_SONNET: Self = Self {
        input_per_1k: 0.003,
        output_per_1k: 0.015,
    };

    /// Returns `None` if either price is negative or not finite.
    #[must_use]
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Option<Self> {
        let valid = |p: f64| p.is_finite() && p >= 0.0;
        if valid(input_per_1k) && valid(output_per_1k) {
            Some(Self {
                input_per_1k,
                output_per_1k,
            })
        } else {
            None
        }
    }

    /// Prices `usage` against this table.
    pub fn cost_of(&self, usage: Usage) -> UsageCost {
        let price = |tokens: TokenCount, per_1k: f64| {
            TokenCost::new(tokens.as_u64() as f64 / 1000.0 * per_1k).unwrap_or_default()
        };
        let input = price(usage.input_tokens, self.input_per_1k);
        let output = price(usage.output_tokens, self.output_per_1k);
        UsageCost {
            input,
            output,
            total: input + output,
        }
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::CLAUDE_3_SONNET
    }
}

/// Token counters reported by the text-generation service for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    pub input_tokens: TokenCount,
    /// Generated tokens.
    pub output_tokens: TokenCount,
}

impl Usage {
    /// Prompt plus generated tokens.
    pub fn total(self) -> TokenCount {
        self.input_tokens + self.output_tokens
    }
}

/// Estimated cost of one call, split by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCost {
    /// Cost of prompt tokens.
    pub input: TokenCost,
    /// Cost of generated tokens.
    pub output: TokenCost,
    /// Sum of both.
    pub total: TokenCost,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Wall-clock instant in UTC, used to stamp pipeline runs.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> ContentPath {
        ContentPath::new(p).unwrap()
    }

    #[test]
    fn default_content_falls_back_to_empty_string() {
        let defaults = DefaultContent::new().with(path("docs/core/principles.md"), "# Principles");
        assert_eq!(defaults.for_path(&path("docs/core/principles.md")), "# Principles");
        assert_eq!(defaults.for_path(&path("docs/other.md")), "");
        assert!(!defaults.contains(&path("docs/other.md")));
    }

    #[test]
    fn cost_is_priced_per_thousand_tokens() {
        let usage = Usage {
            input_tokens: TokenCount::new(2000),
            output_tokens: TokenCount::new(500),
        };
        let cost = PriceTable::CLAUDE_3_SONNET.cost_of(usage);
        assert!((cost.input.as_f64() - 0.006).abs() < 1e-12);
        assert!((cost.output.as_f64() - 0.0075).abs() < 1e-12);
        assert!((cost.total.as_f64() - 0.0135).abs() < 1e-12);
        assert_eq!(usage.total(), TokenCount::new(2500));
    }

    #[test]
    fn zero_usage_costs_nothing() {
        let cost = PriceTable::default().cost_of(Usage::default());
        assert_eq!(cost.total, TokenCost::zero());
    }

    #[test]
    fn price_table_rejects_negative_prices() {
        assert!(PriceTable::new(-0.1, 0.015).is_none());
        assert!(PriceTable::new(0.003, f64::NAN).is_none());
        assert!(PriceTable::new(0.0, 0.0).is_some());
    }

    #[test]
    fn token_cost_display_uses_six_decimals() {
        assert_eq!(TokenCost::new(0.0135).unwrap().to_string(), "$0.013500");
    }

    #[test]
    fn repo_config_displays_as_owner_slash_repo() {
        let config = RepoConfig::new(
            RepositoryOwner::new("noetic97").unwrap(),
            RepositoryName::new("3d-futures").unwrap(),
        );
        assert_eq!(config.to_string(), "noetic97/3d-futures");
    }
}
