//! Runtime configuration: TOML file, environment, and command-line flags.
//!
//! Precedence, lowest to highest: built-in defaults, the config file
//! (`--config`, or `docsync.toml` in the working directory when present), the
//! environment (after `.env` has been loaded), then flags. Secrets are only
//! ever read from the environment.
//!
//! [`Settings::resolve`] validates everything up front. Every missing required
//! key is reported in one [`ConfigurationError::Missing`], so nothing runs
//! with a partial configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pipeline::{
    BranchName, ConfigurationError, ContentPath, DefaultContent, GenerationParams, ModelId,
    PipelineError, PriceTable, RepoConfig, RepositoryName, RepositoryOwner, DEFAULT_AGENT_NAME,
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
use serde::Deserialize;

use crate::Cli;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "docsync.toml";

pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const OWNER: &str = "DOCSYNC_OWNER";
pub const REPO: &str = "DOCSYNC_REPO";
pub const PATH: &str = "DOCSYNC_PATH";
pub const INSTRUCTIONS: &str = "DOCSYNC_INSTRUCTIONS";

// ---------------------------------------------------------------------------
// Config file schema
// ---------------------------------------------------------------------------

/// Top-level config file, deserialized from TOML. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub repository: RepositorySection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub github: GithubSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub commit: CommitSection,
    /// `"path" = "body"` fallback documents.
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

/// `[repository]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositorySection {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
}

/// `[run]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub path: Option<String>,
    pub instructions: Option<String>,
}

/// `[github]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GithubSection {
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// `[llm]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSection {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
    pub pricing: Option<PricingSection>,
}

/// `[llm.pricing]` section, USD per 1000 tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingSection {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// `[commit]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitSection {
    pub agent_name: Option<String>,
}

impl FileConfig {
    /// Parses a config file body.
    pub fn from_toml_str(source: &str, origin: &Path) -> Result<Self, ConfigurationError> {
        toml::from_str(source).map_err(|e| ConfigurationError::Invalid {
            key: origin.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Loads `explicit` if given (it must exist), otherwise
    /// [`DEFAULT_CONFIG_FILE`] if present, otherwise an empty config.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigurationError> {
        let path: PathBuf = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let source = std::fs::read_to_string(&path).map_err(|e| ConfigurationError::Invalid {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source, &path)
    }
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

/// Fully validated settings for one process run.
#[derive(Clone)]
pub struct Settings {
    pub github_token: String,
    pub anthropic_api_key: String,
    pub repo: RepoConfig,
    pub branch: Option<BranchName>,
    pub path: ContentPath,
    pub instructions: String,
    pub github_api_base: String,
    pub github_timeout: Option<Duration>,
    pub llm_api_base: String,
    pub llm_timeout: Option<Duration>,
    pub params: GenerationParams,
    pub prices: PriceTable,
    pub agent_name: String,
    pub defaults: DefaultContent,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("github_token", &"<redacted>")
            .field("anthropic_api_key", &"<redacted>")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("defaults", &self.defaults.len())
            .finish_non_exhaustive()
    }
}

/// Treats empty values as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Merges flags, environment (`env`), and the config file, then validates.
    pub fn resolve(
        cli: &Cli,
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let lookup = |key: &str| non_empty(env(key));

        let github_token = lookup(GITHUB_TOKEN);
        let anthropic_api_key = lookup(ANTHROPIC_API_KEY);
        let owner = non_empty(cli.owner.clone())
            .or_else(|| lookup(OWNER))
            .or_else(|| non_empty(file.repository.owner.clone()));
        let repo = non_empty(cli.repo.clone())
            .or_else(|| lookup(REPO))
            .or_else(|| non_empty(file.repository.repo.clone()));
        let path = non_empty(cli.path.clone())
            .or_else(|| lookup(PATH))
            .or_else(|| non_empty(file.run.path.clone()));
        let instructions = non_empty(cli.instructions.clone())
            .or_else(|| lookup(INSTRUCTIONS))
            .or_else(|| non_empty(file.run.instructions.clone()));

        let missing: Vec<String> = [
            (GITHUB_TOKEN, github_token.is_none()),
            (ANTHROPIC_API_KEY, anthropic_api_key.is_none()),
            (OWNER, owner.is_none()),
            (REPO, repo.is_none()),
            (PATH, path.is_none()),
            (INSTRUCTIONS, instructions.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(key, _)| key.to_string())
        .collect();

        // Each value is `Some` once `missing` is empty.
        let (
            Some(github_token),
            Some(anthropic_api_key),
            Some(owner),
            Some(repo),
            Some(path),
            Some(instructions),
        ) = (github_token, anthropic_api_key, owner, repo, path, instructions)
        else {
            return Err(ConfigurationError::Missing { missing });
        };

        let owner = RepositoryOwner::new(owner.trim()).ok_or_else(|| invalid(OWNER, "empty"))?;
        let repo = RepositoryName::new(repo.trim()).ok_or_else(|| invalid(REPO, "empty"))?;
        let path = ContentPath::new(path.trim()).ok_or_else(|| {
            invalid(PATH, format!("'{path}' is not a slash-separated file path"))
        })?;

        let branch = non_empty(cli.branch.clone())
            .or_else(|| non_empty(file.repository.branch.clone()))
            .and_then(BranchName::new);

        let model = match non_empty(file.llm.model.clone()) {
            Some(model) => ModelId::new(model).ok_or_else(|| invalid("llm.model", "empty"))?,
            None => ModelId::claude_3_sonnet(),
        };
        let params = GenerationParams::new(
            model,
            file.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            file.llm.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        )?;

        let prices = match &file.llm.pricing {
            Some(p) => PriceTable::new(p.input_per_1k, p.output_per_1k)
                .ok_or_else(|| invalid("llm.pricing", "prices must be finite and non-negative"))?,
            None => PriceTable::default(),
        };

        let github_timeout = timeout(
            "github.timeout_secs",
            Some(file.github.timeout_secs.unwrap_or(github::DEFAULT_TIMEOUT_SECS)),
        )?;
        let llm_timeout = timeout("llm.timeout_secs", file.llm.timeout_secs)?;

        let mut defaults = DefaultContent::new();
        for (key, body) in file.defaults {
            let default_path = ContentPath::new(key.clone()).ok_or_else(|| {
                invalid(format!("defaults.{key}"), "not a slash-separated file path")
            })?;
            defaults.insert(default_path, body);
        }

        Ok(Self {
            github_token,
            anthropic_api_key,
            repo: RepoConfig::new(owner, repo),
            branch,
            path,
            instructions,
            github_api_base: non_empty(file.github.api_base)
                .unwrap_or_else(|| github::DEFAULT_API_BASE.to_string()),
            github_timeout,
            llm_api_base: non_empty(file.llm.api_base)
                .unwrap_or_else(|| llm::DEFAULT_API_BASE.to_string()),
            llm_timeout,
            params,
            prices,
            agent_name: non_empty(file.commit.agent_name)
                .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
            defaults,
        })
    }
}

/// Loads the config file and resolves settings from it, the environment
/// (`env`), and `cli`.
pub fn load(
    cli: &Cli,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, PipelineError> {
    let file = FileConfig::discover(cli.config.as_deref())?;
    Ok(Settings::resolve(cli, file, env)?)
}

/// A zero timeout would fail every request.
fn timeout(key: &str, secs: Option<u64>) -> Result<Option<Duration>, ConfigurationError> {
    match secs {
        Some(0) => Err(invalid(key, "must be greater than zero")),
        other => Ok(other.map(Duration::from_secs)),
    }
}

fn invalid(key: impl Into<String>, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::Invalid {
        key: key.into(),
        reason: reason.into(),
    }
}
