//! End-to-end pipeline scenarios against an in-memory store that enforces
//! conditional writes the way the remote store does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pipeline::{
    CompletionRequest, CompletionResponse, ContentPath, ContentRepository, ContentSegment,
    ContentStore, DefaultContent, GenerationParams, LlmProvider, PipelineError, PriceTable,
    PutRequest, RepoConfig, RepositoryName, RepositoryOwner, StoreError, StoredResource,
    SyncPipeline, TextTransformer, TokenCount, TransformError, Usage, VersionToken, WriteMode,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

type Files = HashMap<ContentPath, (String, VersionToken)>;
type Hook = Box<dyn FnOnce(&mut Files) + Send>;

#[derive(Default)]
struct InMemoryRepository {
    files: Mutex<Files>,
    puts: Mutex<Vec<PutRequest>>,
    next_sha: Mutex<u32>,
    before_put: Mutex<Option<Hook>>,
}

impl InMemoryRepository {
    fn with_file(self, path: &ContentPath, content: &str, sha: &str) -> Self {
        self.files.lock().unwrap().insert(
            path.clone(),
            (content.to_string(), VersionToken::new(sha).unwrap()),
        );
        self
    }

    /// Runs `hook` against the stored files just before the next write is
    /// checked, simulating a concurrent writer.
    fn on_next_put(&self, hook: impl FnOnce(&mut Files) + Send + 'static) {
        *self.before_put.lock().unwrap() = Some(Box::new(hook));
    }

    fn file(&self, path: &ContentPath) -> Option<(String, VersionToken)> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn puts(&self) -> Vec<PutRequest> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn get(
        &self,
        _repo: &RepoConfig,
        path: &ContentPath,
    ) -> Result<StoredResource, StoreError> {
        match self.files.lock().unwrap().get(path) {
            Some((content, sha)) => Ok(StoredResource {
                path: path.clone(),
                content: content.clone(),
                sha: sha.clone(),
            }),
            None => Err(StoreError::NotFound { path: path.clone() }),
        }
    }

    async fn put(
        &self,
        _repo: &RepoConfig,
        request: PutRequest,
    ) -> Result<VersionToken, StoreError> {
        self.puts.lock().unwrap().push(request.clone());

        let mut files = self.files.lock().unwrap();
        if let Some(hook) = self.before_put.lock().unwrap().take() {
            hook(&mut *files);
        }

        let current = files.get(&request.path).map(|(_, sha)| sha.clone());
        if current != request.sha {
            return Err(StoreError::VersionConflict {
                path: request.path,
                expected: request.sha,
            });
        }

        let mut counter = self.next_sha.lock().unwrap();
        *counter += 1;
        let sha = VersionToken::new(format!("sha{counter}")).unwrap();
        files.insert(request.path, (request.content, sha.clone()));
        Ok(sha)
    }
}

#[derive(Default)]
struct RecordingProvider {
    requests: Mutex<Vec<CompletionRequest>>,
    reply: Option<String>,
}

impl RecordingProvider {
    fn replying(text: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: Some(text.to_string()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.messages[0].content.clone())
            .collect()
    }
}

#[async_trait]
impl LlmProvider for RecordingProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, TransformError> {
        self.requests.lock().unwrap().push(request);
        Ok(CompletionResponse {
            segments: self
                .reply
                .iter()
                .map(|text| ContentSegment::Text(text.clone()))
                .collect(),
            usage: Usage {
                input_tokens: TokenCount::new(120),
                output_tokens: TokenCount::new(80),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config() -> RepoConfig {
    RepoConfig::new(
        RepositoryOwner::new("noetic97").unwrap(),
        RepositoryName::new("3d-futures").unwrap(),
    )
}

fn path() -> ContentPath {
    ContentPath::new("docs/x.md").unwrap()
}

fn pipeline(
    repo: Arc<InMemoryRepository>,
    provider: Arc<RecordingProvider>,
    defaults: DefaultContent,
) -> SyncPipeline {
    SyncPipeline::new(
        ContentStore::new(repo, defaults),
        TextTransformer::new(provider, GenerationParams::default(), PriceTable::default()),
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_document_is_created_from_default_content() {
    let repo = Arc::new(InMemoryRepository::default());
    let provider = Arc::new(RecordingProvider::replying("# X, improved"));
    let defaults = DefaultContent::new().with(path(), "# X\n\nNeeds detail.");

    let report = pipeline(repo.clone(), provider.clone(), defaults)
        .run(&config(), &path(), "improve")
        .await
        .unwrap();

    assert_eq!(
        provider.prompts(),
        vec!["Instructions: improve\n\nContent to process:\n# X\n\nNeeds detail.".to_string()]
    );
    let puts = repo.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].sha, None);
    assert_eq!(puts[0].content, "# X, improved");
    assert_eq!(report.write.mode, WriteMode::Created);
    assert!(report.used_default);
    assert_eq!(repo.file(&path()).unwrap().0, "# X, improved");
}

#[tokio::test]
async fn existing_document_is_updated_against_its_version() {
    let repo = Arc::new(InMemoryRepository::default().with_file(&path(), "Hello", "abc123"));
    let provider = Arc::new(RecordingProvider::replying("Hello, improved"));

    let report = pipeline(repo.clone(), provider.clone(), DefaultContent::new())
        .run(&config(), &path(), "improve")
        .await
        .unwrap();

    assert!(provider.prompts()[0].ends_with("Content to process:\nHello"));
    let puts = repo.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].sha, VersionToken::new("abc123"));
    assert_eq!(report.write.mode, WriteMode::Updated);
    assert_eq!(repo.file(&path()).unwrap(), ("Hello, improved".to_string(), report.write.sha));
}

#[tokio::test]
async fn concurrent_writer_wins_and_run_reports_version_conflict() {
    let repo = Arc::new(InMemoryRepository::default().with_file(&path(), "Hello", "abc123"));
    let provider = Arc::new(RecordingProvider::replying("Hello, improved"));
    let concurrent_path = path();
    repo.on_next_put(move |files| {
        files.insert(
            concurrent_path,
            ("Concurrent edit".to_string(), VersionToken::new("xyz999").unwrap()),
        );
    });

    let err = pipeline(repo.clone(), provider, DefaultContent::new())
        .run(&config(), &path(), "improve")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PipelineError::Store(StoreError::VersionConflict {
            path: path(),
            expected: VersionToken::new("abc123"),
        })
    );
    assert_eq!(repo.puts().len(), 1, "conflict must not be retried");
    assert_eq!(
        repo.file(&path()).unwrap(),
        ("Concurrent edit".to_string(), VersionToken::new("xyz999").unwrap())
    );
}

#[tokio::test]
async fn document_created_concurrently_conflicts_with_create() {
    let repo = Arc::new(InMemoryRepository::default());
    let provider = Arc::new(RecordingProvider::replying("generated"));
    let concurrent_path = path();
    repo.on_next_put(move |files| {
        files.insert(
            concurrent_path,
            ("Someone else".to_string(), VersionToken::new("other1").unwrap()),
        );
    });

    let err = pipeline(repo.clone(), provider, DefaultContent::new())
        .run(&config(), &path(), "improve")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Store(StoreError::VersionConflict { expected: None, .. })
    ));
    assert_eq!(repo.file(&path()).unwrap().0, "Someone else");
}

#[tokio::test]
async fn blank_document_is_replaced_with_default_before_transform() {
    let repo = Arc::new(InMemoryRepository::default().with_file(&path(), "\n   \n", "blank1"));
    let provider = Arc::new(RecordingProvider::replying("filled in"));
    let defaults = DefaultContent::new().with(path(), "# Template");

    let report = pipeline(repo.clone(), provider.clone(), defaults)
        .run(&config(), &path(), "expand")
        .await
        .unwrap();

    assert!(provider.prompts()[0].ends_with("Content to process:\n# Template"));
    assert_eq!(repo.puts()[0].sha, VersionToken::new("blank1"));
    assert_eq!(report.write.mode, WriteMode::Updated);
}

#[tokio::test]
async fn no_text_from_service_writes_empty_document() {
    let repo = Arc::new(InMemoryRepository::default().with_file(&path(), "Hello", "abc123"));
    let provider = Arc::new(RecordingProvider::default());

    pipeline(repo.clone(), provider, DefaultContent::new())
        .run(&config(), &path(), "improve")
        .await
        .unwrap();

    assert_eq!(repo.file(&path()).unwrap().0, "");
}

#[tokio::test]
async fn run_reports_usage_and_cost() {
    let repo = Arc::new(InMemoryRepository::default());
    let provider = Arc::new(RecordingProvider::replying("ok"));

    let report = pipeline(repo, provider, DefaultContent::new())
        .run(&config(), &path(), "improve")
        .await
        .unwrap();

    assert_eq!(report.usage.input_tokens, TokenCount::new(120));
    assert_eq!(report.usage.output_tokens, TokenCount::new(80));
    // 120/1000 * 0.003 + 80/1000 * 0.015
    assert!((report.cost.total.as_f64() - 0.00156).abs() < 1e-12);
}
