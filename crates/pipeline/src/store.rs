//! The content store client: default-content and version-token policy on top
//! of a raw [`ContentRepository`].
//!
//! Reads never fail because a document is missing or blank; they fall back to
//! the [`DefaultContent`] registered for the path. Writes without a known
//! version token discover it first, so every update is conditioned on the
//! version that was current at lookup time. That conditional write is the only
//! protection against lost updates between concurrent writers.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    ContentPath, ContentRepository, ContentUpdate, DefaultContent, PutRequest, RepoConfig,
    StoreError, VersionToken, WriteMode, WriteOutcome,
};

/// Name recorded in commit messages when none is configured.
pub const DEFAULT_AGENT_NAME: &str = "docsync";

/// What a read produced, including whether the default was substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadContent {
    /// The document body (stored or default).
    pub content: String,
    /// Version token of the stored file, if one exists.
    pub sha: Option<VersionToken>,
    /// `true` when the body came from the default table.
    pub used_default: bool,
}

/// Reads and writes single documents with default-content and
/// conditional-write semantics.
#[derive(Clone)]
pub struct ContentStore {
    repository: Arc<dyn ContentRepository>,
    defaults: DefaultContent,
    agent_name: String,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("defaults", &self.defaults.len())
            .field("agent_name", &self.agent_name)
            .finish_non_exhaustive()
    }
}

impl ContentStore {
    /// Creates a store client over `repository` using `defaults` for missing
    /// or blank documents.
    pub fn new(repository: Arc<dyn ContentRepository>, defaults: DefaultContent) -> Self {
        Self {
            repository,
            defaults,
            agent_name: DEFAULT_AGENT_NAME.to_string(),
        }
    }

    /// Replaces the name recorded in commit messages (`"Update <path> via <name>"`).
    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    /// Returns the body of the document at `path`.
    ///
    /// Missing and whitespace-only documents yield the registered default
    /// (or `""`). A directory at `path` is [`StoreError::InvalidResourceKind`].
    pub async fn read(
        &self,
        config: &RepoConfig,
        path: &ContentPath,
    ) -> Result<String, StoreError> {
        self.read_resource(config, path).await.map(|read| read.content)
    }

    /// Like [`ContentStore::read`] but also reports the observed version
    /// token and whether the default was used.
    #[instrument(skip_all, fields(repo = %config, path = %path))]
    pub async fn read_resource(
        &self,
        config: &RepoConfig,
        path: &ContentPath,
    ) -> Result<ReadContent, StoreError> {
        match self.repository.get(config, path).await {
            Ok(resource) if resource.content.trim().is_empty() => {
                info!(
                    has_default = self.defaults.contains(path),
                    "document is blank, using default content"
                );
                Ok(ReadContent {
                    content: self.defaults.for_path(path).to_string(),
                    sha: Some(resource.sha),
                    used_default: true,
                })
            }
            Ok(resource) => {
                debug!(sha = %resource.sha, bytes = resource.content.len(), "document read");
                Ok(ReadContent {
                    content: resource.content,
                    sha: Some(resource.sha),
                    used_default: false,
                })
            }
            Err(StoreError::NotFound { .. }) => {
                info!(
                    has_default = self.defaults.contains(path),
                    "document not found, using default content"
                );
                Ok(ReadContent {
                    content: self.defaults.for_path(path).to_string(),
                    sha: None,
                    used_default: true,
                })
            }
            Err(e) => {
                warn!(error = %e, "failed to read document");
                Err(e)
            }
        }
    }

    /// Writes `update` with a single create-or-update call.
    ///
    /// Without `update.sha` the current version token is looked up first; a
    /// missing document means create semantics. A rejected precondition is
    /// surfaced as [`StoreError::VersionConflict`] and is not retried.
    #[instrument(skip_all, fields(repo = %config, path = %update.path))]
    pub async fn write(
        &self,
        config: &RepoConfig,
        update: ContentUpdate,
    ) -> Result<WriteOutcome, StoreError> {
        let ContentUpdate { path, content, sha } = update;

        let sha = match sha {
            Some(sha) => Some(sha),
            None => self.current_sha(config, &path).await?,
        };

        let mode = if sha.is_some() {
            WriteMode::Updated
        } else {
            WriteMode::Created
        };
        let message = match mode {
            WriteMode::Created => format!("Create {path} via {}", self.agent_name),
            WriteMode::Updated => format!("Update {path} via {}", self.agent_name),
        };

        let request = PutRequest {
            path: path.clone(),
            content,
            sha,
            message,
        };

        match self.repository.put(config, request).await {
            Ok(new_sha) => {
                info!(%mode, sha = %new_sha, "document written");
                Ok(WriteOutcome {
                    path,
                    sha: new_sha,
                    mode,
                })
            }
            // A 404 on write means the repository or branch is gone, not the file.
            Err(StoreError::NotFound { path }) => {
                warn!("write target repository not found");
                Err(StoreError::unavailable(format!(
                    "repository {config} not reachable while writing {path}"
                )))
            }
            Err(e) => {
                warn!(error = %e, "failed to write document");
                Err(e)
            }
        }
    }

    async fn current_sha(
        &self,
        config: &RepoConfig,
        path: &ContentPath,
    ) -> Result<Option<VersionToken>, StoreError> {
        match self.repository.get(config, path).await {
            Ok(resource) => {
                debug!(sha = %resource.sha, "found current version");
                Ok(Some(resource.sha))
            }
            Err(StoreError::NotFound { .. }) => {
                debug!("no current version, creating");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
