//! JSON shapes of the GitHub contents API and their decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// `GET /repos/{owner}/{repo}/contents/{path}` body.
///
/// A file (or symlink/submodule) is an object; a directory is an array of
/// entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentsResponse {
    Listing(Vec<serde_json::Value>),
    Entry(ContentEntry),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// How a file entry's body has to be obtained.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EntryBody {
    /// The body was inlined and decoded.
    Inline(Vec<u8>),
    /// The file is too large to inline (`encoding: "none"`); fetch it raw.
    Detached,
}

impl ContentEntry {
    /// Decodes the inlined body. GitHub wraps base64 at 60 columns, so
    /// whitespace is stripped before decoding.
    pub fn body(&self) -> Result<EntryBody, String> {
        match (self.encoding.as_deref(), self.content.as_deref()) {
            (Some("base64"), Some(encoded)) => {
                let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD
                    .decode(compact)
                    .map(EntryBody::Inline)
                    .map_err(|e| format!("invalid base64 content: {e}"))
            }
            (Some("none"), _) | (None, None) => Ok(EntryBody::Detached),
            (Some(other), _) => Err(format!("unsupported content encoding '{other}'")),
            (None, Some(_)) => Err("content returned without an encoding".to_string()),
        }
    }
}

/// `PUT /repos/{owner}/{repo}/contents/{path}` body.
#[derive(Debug, Serialize)]
pub(crate) struct PutBody<'a> {
    pub message: &'a str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<&'a str>,
}

impl<'a> PutBody<'a> {
    pub fn new(
        message: &'a str,
        content: &str,
        sha: Option<&'a str>,
        branch: Option<&'a str>,
    ) -> Self {
        Self {
            message,
            content: STANDARD.encode(content.as_bytes()),
            sha,
            branch,
        }
    }
}

/// Successful `PUT` response; only the new blob SHA is used.
#[derive(Debug, Deserialize)]
pub(crate) struct PutResponse {
    pub content: PutResponseContent,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PutResponseContent {
    pub sha: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: Option<&str>, encoding: Option<&str>) -> ContentEntry {
        ContentEntry {
            kind: "file".into(),
            sha: "abc123".into(),
            content: content.map(str::to_string),
            encoding: encoding.map(str::to_string),
        }
    }

    #[test]
    fn decodes_wrapped_base64() {
        // "Hello, world!\n" split across lines the way the API returns it.
        let body = entry(Some("SGVsbG8s\nIHdvcmxk\nIQo=\n"), Some("base64")).body();
        assert_eq!(body, Ok(EntryBody::Inline(b"Hello, world!\n".to_vec())));
    }

    #[test]
    fn large_files_are_detached() {
        assert_eq!(entry(Some(""), Some("none")).body(), Ok(EntryBody::Detached));
    }

    #[test]
    fn rejects_unknown_encoding() {
        assert!(entry(Some("x"), Some("utf-16")).body().is_err());
    }

    #[test]
    fn listing_deserializes_as_directory() {
        let parsed: ContentsResponse =
            serde_json::from_str(r#"[{"type":"file","name":"a.md"}]"#).unwrap();
        assert!(matches!(parsed, ContentsResponse::Listing(_)));
    }

    #[test]
    fn put_body_omits_absent_sha_and_branch() {
        let body = PutBody::new("Create docs/x.md via docsync", "hi", None, None);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "Create docs/x.md via docsync", "content": "aGk="})
        );
    }
}
