//! Vellum synchronization pipeline components.
//!
//! This crate incrementally mirrors an append-only permaweb transaction
//! index into local JSONL logs, fetching the post document behind each new
//! transaction.
//!
//! # Modules
//!
//! - [`query`] - Paged GraphQL client for the transaction index
//! - [`dedup`] - Trims fetched pages to genuinely new records
//! - [`fetch`] - Concurrent batch content fetcher with per-id isolation
//! - [`log`] - Append-only JSONL store with tail read and retention
//! - [`cursor`] - Durable pagination cursor storage
//! - [`engine`] - The fetch → dedup → fetch-content → persist loop
//! - [`feed`] / [`snapshot`] - Derived artifacts built from the logs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   QueryClient    │  paged GraphQL query, ascending by height
//! └────────┬─────────┘
//!          │ page
//!          ▼
//! ┌──────────────────┐
//! │   dedup::trim    │  boundary = last persisted record id
//! └────────┬─────────┘
//!          │ new records
//!          ▼
//! ┌──────────────────┐
//! │  ContentFetcher  │  concurrent GETs, one result per id
//! └────────┬─────────┘
//!          │ records + content results
//!          ▼
//! ┌──────────────────┐
//! │ AppendLog ×2 +   │  appends commit before the cursor advances
//! │ FileCursorStore  │
//! └──────────────────┘
//! ```
//!
//! The logs are the source of truth for resumption: the last persisted
//! record drives both the dedup boundary and the replay floor, so the
//! engine survives crashes, stale cursors, and re-runs without duplicating
//! a single record.

pub mod cursor;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod log;
pub mod query;
pub mod snapshot;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

pub use cursor::{CursorStore, FileCursorStore};
pub use engine::{ContentSource, PageSource, RunBudget, RunStats, SyncEngine};
pub use feed::FeedConfig;
pub use fetch::{ContentFetcher, FetcherConfig};
pub use log::AppendLog;
pub use query::{Page, PageEdge, QueryClient, QueryConfig, TagFilter};
pub use snapshot::StatsSnapshot;
