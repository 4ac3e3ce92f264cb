//! Post documents and per-id fetch outcomes.
//!
//! Every transaction id handed to the content fetcher yields exactly one
//! [`ContentResult`]: either the parsed [`Document`] behind that id or a
//! [`ContentError`] describing why it couldn't be fetched. Both variants are
//! written to the content log, so the log always carries one line per
//! requested id.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A post document fetched from the content gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Transaction id the document was fetched for.
    pub id: String,

    /// Post title.
    pub title: String,

    /// Post body (markdown, as published).
    pub body: String,

    /// Publication timestamp (unix seconds, author-claimed).
    pub timestamp: i64,

    /// Content digest claimed by the publishing app.
    pub digest: String,

    /// Address of the contributing author.
    pub contributor: String,

    /// Auxiliary NFT metadata attached by the publishing app, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
}

impl Document {
    /// Parse a gateway response body into a document.
    ///
    /// The gateway returns arbitrary JSON; a document needs at least
    /// `content.title`, `content.body`, `content.timestamp`, `digest` and
    /// `authorship.contributor`. Anything missing is an error for this id,
    /// not a crash.
    pub fn from_response(id: &str, value: &Value) -> Result<Self> {
        let content = value.get("content").ok_or(Error::MissingField("content"))?;

        let title = str_field(content, "title", "content.title")?;
        let body = str_field(content, "body", "content.body")?;
        let timestamp = parse_timestamp(
            content
                .get("timestamp")
                .ok_or(Error::MissingField("content.timestamp"))?,
        )?;

        let digest = str_field(value, "digest", "digest")?;

        let contributor = value
            .get("authorship")
            .and_then(|a| a.get("contributor"))
            .and_then(Value::as_str)
            .ok_or(Error::MissingField("authorship.contributor"))?
            .to_string();

        // The publishing app attaches an `nft` object to minted posts.
        let extra = value
            .get("nft")
            .and_then(Value::as_object)
            .filter(|m| !m.is_empty())
            .cloned();

        Ok(Self {
            id: id.to_string(),
            title,
            body,
            timestamp,
            digest,
            contributor,
            extra,
        })
    }
}

fn str_field(value: &Value, key: &str, qualified: &'static str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(Error::MissingField(qualified))
}

/// The gateway serves timestamps as either a number or a numeric string,
/// depending on the client that published the post.
fn parse_timestamp(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| Error::InvalidField {
            field: "content.timestamp",
            reason: format!("out of range: {n}"),
        }),
        Value::String(s) => s.trim().parse().map_err(|_| Error::InvalidField {
            field: "content.timestamp",
            reason: format!("not a number: {s:?}"),
        }),
        other => Err(Error::InvalidField {
            field: "content.timestamp",
            reason: format!("unexpected type: {other}"),
        }),
    }
}

/// A failed content fetch for one id, recorded as data in the content log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentError {
    /// Transaction id the fetch was for.
    pub id: String,

    /// What went wrong.
    pub error: ErrorDetail,
}

/// Failure detail for a [`ContentError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// HTTP status, when the gateway answered at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Human-readable failure description.
    pub message: String,
}

impl ContentError {
    /// Build a fetch error for `id`.
    pub fn new(id: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: ErrorDetail {
                status,
                message: message.into(),
            },
        }
    }

    /// A per-request timeout for `id`.
    pub fn timeout(id: impl Into<String>) -> Self {
        Self::new(id, None, "timeout")
    }
}

/// Outcome of fetching content for one transaction id.
///
/// Serialized untagged: a fetched document is a plain document line, a
/// failure is `{"id": ..., "error": {...}}`, matching what consumers of the
/// content log expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentResult {
    /// The document was fetched and parsed.
    Fetched(Document),

    /// The fetch failed; the error is data, not a propagated failure.
    Failed(ContentError),
}

impl ContentResult {
    /// The transaction id this result belongs to.
    pub fn id(&self) -> &str {
        match self {
            Self::Fetched(doc) => &doc.id,
            Self::Failed(err) => &err.id,
        }
    }

    /// The document, if the fetch succeeded.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Fetched(doc) => Some(doc),
            Self::Failed(_) => None,
        }
    }

    /// Whether this result records a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
