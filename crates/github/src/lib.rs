//! docsync GitHub infrastructure adapter.
//!
//! Implements [`pipeline::ContentRepository`] over the GitHub REST
//! [contents API](https://docs.github.com/en/rest/repos/contents):
//!
//! - `GET /repos/{owner}/{repo}/contents/{path}` to read a file and its blob SHA,
//! - `PUT /repos/{owner}/{repo}/contents/{path}` to create or update it, with
//!   the blob SHA as the optimistic-concurrency precondition.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Base64
//! transfer encoding, URL construction, authentication headers and the mapping
//! of HTTP statuses onto [`pipeline::StoreError`] live here; the default
//! content and version discovery policies live in [`pipeline::ContentStore`].

mod wire;

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    BranchName, ConfigurationError, ContentPath, ContentRepository, PutRequest, RepoConfig,
    StoreError, StoredResource, VersionToken,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use wire::{ApiErrorBody, ContentEntry, ContentsResponse, EntryBody, PutBody, PutResponse};

/// Public GitHub REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const USER_AGENT: &str = concat!("docsync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Construction options for [`GithubContents`].
#[derive(Debug, Clone)]
pub struct GithubOptions {
    /// Token sent as `Authorization: Bearer`.
    pub token: String,
    /// API root; override for GitHub Enterprise or tests.
    pub api_base: String,
    /// Branch to read from and commit to; `None` uses the default branch.
    pub branch: Option<BranchName>,
    /// Per-request timeout; `None` disables it.
    pub timeout: Option<Duration>,
}

impl GithubOptions {
    /// Options for the public API with the default timeout.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            branch: None,
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// GitHub-backed [`ContentRepository`].
#[derive(Debug, Clone)]
pub struct GithubContents {
    client: Client,
    api_base: Url,
    branch: Option<BranchName>,
}

impl GithubContents {
    /// Builds the HTTP client. Fails if the token is not a valid header value
    /// or `api_base` is not an absolute URL.
    pub fn new(options: GithubOptions) -> Result<Self, ConfigurationError> {
        let api_base = Url::parse(&options.api_base).map_err(|e| ConfigurationError::Invalid {
            key: "github.api_base".into(),
            reason: e.to_string(),
        })?;
        if api_base.cannot_be_a_base() {
            return Err(ConfigurationError::Invalid {
                key: "github.api_base".into(),
                reason: format!("'{api_base}' cannot be used as a base URL"),
            });
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", options.token)).map_err(|_| {
            ConfigurationError::Invalid {
                key: "GITHUB_TOKEN".into(),
                reason: "contains characters not allowed in an HTTP header".into(),
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ConfigurationError::Invalid {
            key: "github".into(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            api_base,
            branch: options.branch,
        })
    }

    /// `{api_base}/repos/{owner}/{repo}/contents/{path...}` with every segment
    /// percent-encoded.
    fn contents_url(&self, repo: &RepoConfig, path: &ContentPath) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"])
                .extend(path.segments());
        }
        url
    }

    async fn fetch_raw(&self, url: Url, path: &ContentPath) -> Result<Vec<u8>, StoreError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, HeaderValue::from_static(RAW_MEDIA_TYPE));
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch.as_str())]);
        }
        let response = request.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response, path, None).await);
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ContentRepository for GithubContents {
    #[instrument(skip_all, fields(repo = %repo, path = %path))]
    async fn get(
        &self,
        repo: &RepoConfig,
        path: &ContentPath,
    ) -> Result<StoredResource, StoreError> {
        let url = self.contents_url(repo, path);
        let mut request = self.client.get(url.clone());
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch.as_str())]);
        }

        let response = request.send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response, path, None).await);
        }

        let parsed: ContentsResponse = response.json().await.map_err(|e| {
            StoreError::unavailable(format!("unexpected contents response for {path}: {e}"))
        })?;

        let entry: ContentEntry = match parsed {
            ContentsResponse::Listing(_) => {
                return Err(StoreError::InvalidResourceKind {
                    path: path.clone(),
                    kind: "dir".into(),
                })
            }
            ContentsResponse::Entry(entry) if entry.kind != "file" => {
                return Err(StoreError::InvalidResourceKind {
                    path: path.clone(),
                    kind: entry.kind,
                })
            }
            ContentsResponse::Entry(entry) => entry,
        };

        let sha = VersionToken::new(entry.sha.clone()).ok_or_else(|| {
            StoreError::unavailable(format!("contents response for {path} has an empty sha"))
        })?;

        let bytes = match entry.body().map_err(StoreError::unavailable)? {
            EntryBody::Inline(bytes) => bytes,
            EntryBody::Detached => {
                debug!("file too large to inline, fetching raw body");
                self.fetch_raw(url, path).await?
            }
        };

        let content = String::from_utf8(bytes).map_err(|_| StoreError::InvalidResourceKind {
            path: path.clone(),
            kind: "non-UTF-8 file".into(),
        })?;

        debug!(sha = %sha, bytes = content.len(), "fetched file");
        Ok(StoredResource {
            path: path.clone(),
            content,
            sha,
        })
    }

    #[instrument(
        skip_all,
        fields(repo = %repo, path = %request.path, conditional = request.sha.is_some())
    )]
    async fn put(
        &self,
        repo: &RepoConfig,
        request: PutRequest,
    ) -> Result<VersionToken, StoreError> {
        let url = self.contents_url(repo, &request.path);
        let body = PutBody::new(
            &request.message,
            &request.content,
            request.sha.as_ref().map(VersionToken::as_str),
            self.branch.as_ref().map(BranchName::as_str),
        );

        let response = self
            .client
            .put(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response, &request.path, request.sha.clone()).await);
        }

        let parsed: PutResponse = response.json().await.map_err(|e| {
            StoreError::unavailable(format!(
                "unexpected write response for {}: {e}",
                request.path
            ))
        })?;
        let sha = VersionToken::new(parsed.content.sha).ok_or_else(|| {
            StoreError::unavailable(format!("write response for {} has an empty sha", request.path))
        })?;

        debug!(sha = %sha, "file written");
        Ok(sha)
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable {
        message: format!("request to GitHub failed: {e}"),
        status: e.status().map(|s| s.as_u16()),
        retry_after: None,
    }
}

/// Maps a non-2xx response onto the store error taxonomy.
///
/// `409` is a SHA mismatch. `422` mentioning `sha` means the file was created
/// or changed after the version lookup (GitHub reports a missing precondition
/// for an existing file this way).
async fn status_error(
    response: Response,
    path: &ContentPath,
    expected: Option<VersionToken>,
) -> StoreError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body: ApiErrorBody = response.json().await.unwrap_or_default();

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound { path: path.clone() },
        StatusCode::CONFLICT => StoreError::VersionConflict {
            path: path.clone(),
            expected,
        },
        StatusCode::UNPROCESSABLE_ENTITY if body.message.to_lowercase().contains("sha") => {
            StoreError::VersionConflict {
                path: path.clone(),
                expected,
            }
        }
        _ => StoreError::Unavailable {
            message: if body.message.is_empty() {
                format!("GitHub returned {status} for {path}")
            } else {
                format!("GitHub returned {status} for {path}: {}", body.message)
            },
            status: Some(status.as_u16()),
            retry_after,
        },
    }
}
