//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example,
//! a [`RepositoryOwner`] with a [`VersionToken`] even though both are strings
//! under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Non-empty string newtypes: `new` (None on empty), `as_str`, `Display`.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Wraps `value`; empty strings are rejected.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Borrowed value.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single pipeline execution run (one fetch-transform-write cycle).
///
/// Generated fresh for every `run` call and recorded on its tracing span so all
/// activity from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineRunId(Uuid);

impl PipelineRunId {
    /// Fresh v4 id for a new run.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PipelineRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: string-backed (store namespace and service names)
// ---------------------------------------------------------------------------

string_id! {
    /// The account or organisation that owns a repository (the `owner` in `owner/repo`).
    RepositoryOwner
}

string_id! {
    /// The repository name within its owner's namespace (the `repo` in `owner/repo`).
    RepositoryName
}

string_id! {
    /// Opaque revision token the content store issues for a stored file.
    ///
    /// For GitHub this is the blob SHA. It is only ever compared for equality by
    /// the store itself; docsync never interprets it.
    VersionToken
}

string_id! {
    /// Model identifier passed verbatim to the text-generation service.
    ModelId
}

impl ModelId {
    /// The model documents are transformed with unless configured otherwise.
    pub fn claude_3_sonnet() -> Self {
        Self("claude-3-sonnet-20240229".to_string())
    }
}

string_id! {
    /// A Git branch name (e.g. `"main"`).
    BranchName
}

// ---------------------------------------------------------------------------
// ContentPath
// ---------------------------------------------------------------------------

/// A slash-separated logical location of a document inside a repository
/// (e.g. `"docs/core/principles.md"`).
///
/// Rejects empty paths, leading or trailing `/`, and empty, `.` or `..`
/// segments, so a path always names exactly one entry below the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentPath(String);

impl ContentPath {
    /// Creates a [`ContentPath`], returning `None` if the path is malformed.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        let valid = !v.is_empty()
            && v.split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        if valid {
            Some(Self(v))
        } else {
            None
        }
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the path's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl TryFrom<String> for ContentPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value.clone()).ok_or_else(|| format!("invalid content path: {value:?}"))
    }
}

impl From<ContentPath> for String {
    fn from(path: ContentPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for ContentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
