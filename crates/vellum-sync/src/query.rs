//! Paged GraphQL query client for the remote transaction index.
//!
//! The index exposes a relay-style connection: each page carries edges of
//! `(cursor, transaction)` plus a has-next flag, sorted ascending by block
//! height. The client is read-only and never retries — retry policy belongs
//! to the caller, which simply re-runs the cycle with the cursor it last
//! committed.

use crate::engine::PageSource;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};
use vellum_core::{DEFAULT_MIN_BLOCK, Record, flatten_tags};

/// Paged transaction query, ascending by height so replay is resumable from
/// the last persisted block.
const TRANSACTIONS_QUERY: &str = r#"
query($cursor: String, $min_block: Int, $tags: [TagFilter!]!, $limit: Int!) {
  transactions(
    tags: $tags
    sort: HEIGHT_ASC
    first: $limit
    after: $cursor
    block: { min: $min_block }
  ) {
    edges {
      cursor
      node {
        id
        tags {
          name
          value
        }
        block {
          height
          timestamp
        }
      }
    }
    pageInfo {
      hasNextPage
    }
  }
}
"#;

/// Tip-of-chain height, for operator logging of sync lag.
const TIP_QUERY: &str = r#"
query {
  blocks(first: 1, sort: HEIGHT_DESC) {
    edges {
      node {
        height
      }
    }
  }
}
"#;

/// One tag filter of the paged query, e.g. `App-Name` in `["MirrorXYZ"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagFilter {
    /// Tag name to match.
    pub name: String,
    /// Accepted values for that tag.
    pub values: Vec<String>,
}

impl FromStr for TagFilter {
    type Err = Error;

    /// Parse `name=value` or `name=value1|value2`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, values) = s
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("tag filter {s:?} is not name=value")))?;
        let values: Vec<String> = values
            .split('|')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if name.trim().is_empty() || values.is_empty() {
            return Err(Error::Config(format!("tag filter {s:?} is not name=value")));
        }
        Ok(Self {
            name: name.trim().to_string(),
            values,
        })
    }
}

/// Configuration for the query client.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Index endpoint; the GraphQL route lives at `{endpoint}/graphql`.
    pub endpoint: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Tag filters selecting the tracked application's transactions.
    pub filter_tags: Vec<TagFilter>,

    /// Lowest block height ever requested, bounding historical replay on a
    /// first run.
    pub min_block_floor: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://arweave.net".to_string(),
            timeout: Duration::from_secs(30),
            filter_tags: Vec::new(),
            min_block_floor: DEFAULT_MIN_BLOCK,
        }
    }
}

/// One page of the transaction index.
#[derive(Debug, Clone)]
pub struct Page {
    /// Records with their resumption cursors, ascending by height.
    pub edges: Vec<PageEdge>,

    /// Whether the index has more pages after this one.
    pub has_next: bool,
}

/// One edge of a [`Page`].
#[derive(Debug, Clone)]
pub struct PageEdge {
    /// Opaque cursor resuming the query *after* this record.
    pub cursor: String,

    /// The record itself.
    pub record: Record,
}

impl Page {
    /// The cursor to persist once this page is consumed: the last edge's.
    pub fn next_cursor(&self) -> Option<&str> {
        self.edges.last().map(|e| e.cursor.as_str())
    }

    /// Consume the page into its records.
    pub fn into_records(self) -> Vec<Record> {
        self.edges.into_iter().map(|e| e.record).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: TransactionConnection,
}

#[derive(Debug, Deserialize)]
struct TransactionConnection {
    edges: Vec<RawEdge>,
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    cursor: String,
    node: RawNode,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    #[serde(default)]
    tags: Vec<RawTag>,
    block: Option<RawBlock>,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    height: u64,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct BlocksData {
    blocks: BlocksConnection,
}

#[derive(Debug, Deserialize)]
struct BlocksConnection {
    edges: Vec<BlockEdge>,
}

#[derive(Debug, Deserialize)]
struct BlockEdge {
    node: BlockNode,
}

#[derive(Debug, Deserialize)]
struct BlockNode {
    height: u64,
}

// ═══════════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════════

/// Client for the remote transaction index.
pub struct QueryClient {
    http: reqwest::Client,
    config: QueryConfig,
}

impl QueryClient {
    /// Create a client with the given configuration.
    pub fn new(config: QueryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// The configured min-block floor.
    pub fn min_block_floor(&self) -> u64 {
        self.config.min_block_floor
    }

    /// Execute one GraphQL query and unwrap the envelope.
    async fn execute<T>(&self, query: &'static str, variables: Value) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/graphql", self.config.endpoint.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "query endpoint returned {status}"
            )));
        }

        let envelope: GraphQlEnvelope<T> = resp.json().await?;
        if !envelope.errors.is_empty() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(Error::Transport(format!(
                "GraphQL errors: {}",
                messages.join("; ")
            )));
        }
        envelope
            .data
            .ok_or_else(|| Error::Transport("GraphQL response carried no data".to_string()))
    }

    /// Fetch one page of matching transactions.
    ///
    /// `min_block` of `None` falls back to the configured floor. The remote
    /// sorts ascending by height; the client does not re-sort.
    pub async fn fetch_page(
        &self,
        cursor: Option<&str>,
        min_block: Option<u64>,
        limit: usize,
    ) -> Result<Page> {
        let min_block = min_block.unwrap_or(self.config.min_block_floor);
        debug!(?cursor, min_block, limit, "fetching transaction page");

        let data: TransactionsData = self
            .execute(
                TRANSACTIONS_QUERY,
                json!({
                    "cursor": cursor,
                    "min_block": min_block,
                    "limit": limit,
                    "tags": self.config.filter_tags,
                }),
            )
            .await?;

        Ok(build_page(data.transactions))
    }

    /// Current tip height of the ledger, for logging sync lag.
    pub async fn current_block_height(&self) -> Result<u64> {
        let data: BlocksData = self.execute(TIP_QUERY, json!({})).await?;
        data.blocks
            .edges
            .first()
            .map(|e| e.node.height)
            .ok_or_else(|| Error::Transport("blocks query returned no edges".to_string()))
    }
}

impl PageSource for QueryClient {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        min_block: Option<u64>,
        limit: usize,
    ) -> Result<Page> {
        QueryClient::fetch_page(self, cursor, min_block, limit).await
    }
}

/// Convert a wire connection into a [`Page`] of records.
fn build_page(conn: TransactionConnection) -> Page {
    let mut edges = Vec::with_capacity(conn.edges.len());
    for edge in conn.edges {
        // Unconfirmed transactions carry no block; the min-block filter
        // normally keeps them out of the result set entirely.
        let Some(block) = edge.node.block else {
            warn!(id = %edge.node.id, "skipping transaction without block data");
            continue;
        };

        let attributes = flatten_tags(
            edge.node
                .tags
                .iter()
                .map(|t| (t.name.as_str(), t.value.as_str())),
        );

        edges.push(PageEdge {
            cursor: edge.cursor,
            record: Record {
                id: edge.node.id,
                block_height: block.height,
                block_timestamp: block.timestamp,
                attributes,
            },
        });
    }

    Page {
        edges,
        has_next: conn.page_info.has_next_page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_json() -> &'static str {
        r#"{
            "edges": [
                {
                    "cursor": "cur1",
                    "node": {
                        "id": "tx1",
                        "tags": [
                            {"name": "App-Name", "value": "MirrorXYZ"},
                            {"name": "Original-Content-Digest", "value": "abc"}
                        ],
                        "block": {"height": 935001, "timestamp": 1650000000}
                    }
                },
                {
                    "cursor": "cur2",
                    "node": {
                        "id": "tx2",
                        "tags": [],
                        "block": {"height": 935002, "timestamp": 1650000100}
                    }
                }
            ],
            "pageInfo": {"hasNextPage": true}
        }"#
    }

    #[test]
    fn test_build_page_from_connection() {
        let conn: TransactionConnection = serde_json::from_str(connection_json()).unwrap();
        let page = build_page(conn);

        assert_eq!(page.edges.len(), 2);
        assert!(page.has_next);
        assert_eq!(page.next_cursor(), Some("cur2"));

        let first = &page.edges[0].record;
        assert_eq!(first.id, "tx1");
        assert_eq!(first.block_height, 935001);
        assert_eq!(first.attributes["original-content-digest"], "abc");
        assert!(!first.attributes.contains_key("app-name"));
    }

    #[test]
    fn test_build_page_skips_blockless_edges() {
        let conn: TransactionConnection = serde_json::from_str(
            r#"{
                "edges": [
                    {"cursor": "c1", "node": {"id": "pending", "tags": [], "block": null}},
                    {"cursor": "c2", "node": {"id": "mined", "tags": [],
                        "block": {"height": 10, "timestamp": 1000}}}
                ],
                "pageInfo": {"hasNextPage": false}
            }"#,
        )
        .unwrap();

        let page = build_page(conn);
        assert_eq!(page.edges.len(), 1);
        assert_eq!(page.edges[0].record.id, "mined");
        // next_cursor is still the surviving last edge's cursor
        assert_eq!(page.next_cursor(), Some("c2"));
    }

    #[test]
    fn test_empty_page_has_no_cursor() {
        let page = Page {
            edges: Vec::new(),
            has_next: false,
        };
        assert!(page.next_cursor().is_none());
        assert!(page.into_records().is_empty());
    }

    #[test]
    fn test_envelope_with_errors() {
        let envelope: GraphQlEnvelope<TransactionsData> = serde_json::from_str(
            r#"{"errors": [{"message": "rate limited"}, {"message": "try later"}]}"#,
        )
        .unwrap();
        assert!(envelope.data.is_none());
        assert_eq!(envelope.errors.len(), 2);
        assert_eq!(envelope.errors[0].message, "rate limited");
    }

    #[test]
    fn test_tag_filter_parse() {
        let filter: TagFilter = "App-Name=MirrorXYZ".parse().unwrap();
        assert_eq!(filter.name, "App-Name");
        assert_eq!(filter.values, vec!["MirrorXYZ"]);

        let multi: TagFilter = "Content-Type=application/json|text/plain".parse().unwrap();
        assert_eq!(multi.values.len(), 2);
    }

    #[test]
    fn test_tag_filter_parse_rejects_garbage() {
        assert!("no-equals".parse::<TagFilter>().is_err());
        assert!("=value".parse::<TagFilter>().is_err());
        assert!("name=".parse::<TagFilter>().is_err());
    }

    #[test]
    fn test_tag_filter_serializes_for_query_variables() {
        let filter = TagFilter {
            name: "App-Name".to_string(),
            values: vec!["MirrorXYZ".to_string()],
        };
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"name": "App-Name", "values": ["MirrorXYZ"]})
        );
    }
}
