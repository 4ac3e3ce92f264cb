//! Stats snapshot: a small JSON summary of sync progress and recent volume.
//!
//! Best-effort observability for operators and dashboards. Snapshot failures
//! are logged and swallowed by the caller — they never block or fail the
//! core sync. Written atomically like the other derived artifacts.

use crate::error::Result;
use crate::log::AppendLog;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use vellum_core::{ContentResult, Record};

/// Snapshot of sync state written to disk after each catch-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// When the snapshot was taken (RFC 3339).
    pub updated_at: String,

    /// The most recently persisted ledger record, if any.
    pub last_record: Option<RecordPointer>,

    /// The most recently fetched document, if any.
    pub last_document: Option<DocumentPointer>,

    /// Distinct-value counts over documents published in the trailing 24h.
    pub window_24h: WindowCounts,
}

/// Pointer to a ledger record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPointer {
    pub id: String,
    pub block_height: u64,
    pub block_timestamp: i64,
}

/// Pointer to a fetched document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPointer {
    pub id: String,
    pub timestamp: i64,
}

/// Distinct counts over the trailing 24-hour publication window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowCounts {
    /// Distinct post ids.
    pub posts: usize,

    /// Distinct contributing authors.
    pub contributors: usize,

    /// Distinct titles (edits republish under the same title).
    pub titles: usize,

    /// Distinct bodies.
    pub bodies: usize,
}

/// Compute the snapshot from the logs and write it to `out`.
///
/// `now` is passed in rather than read from the clock so the window is
/// testable.
pub fn write_snapshot(
    records: &AppendLog<Record>,
    content: &AppendLog<ContentResult>,
    out: &Path,
    now: DateTime<Utc>,
) -> Result<StatsSnapshot> {
    let last_record = records.read_last()?.map(|r| RecordPointer {
        id: r.id,
        block_height: r.block_height,
        block_timestamp: r.block_timestamp,
    });

    let results = content.read_all()?;
    let last_document = results
        .iter()
        .rev()
        .find_map(ContentResult::as_document)
        .map(|d| DocumentPointer {
            id: d.id.clone(),
            timestamp: d.timestamp,
        });

    let window_start = (now - Duration::hours(24)).timestamp();
    let mut posts = HashSet::new();
    let mut contributors = HashSet::new();
    let mut titles = HashSet::new();
    let mut bodies = HashSet::new();
    for doc in results.iter().filter_map(ContentResult::as_document) {
        if doc.timestamp >= window_start && doc.timestamp <= now.timestamp() {
            posts.insert(doc.id.as_str());
            contributors.insert(doc.contributor.as_str());
            titles.insert(doc.title.as_str());
            bodies.insert(doc.body.as_str());
        }
    }

    let snapshot = StatsSnapshot {
        updated_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        last_record,
        last_document,
        window_24h: WindowCounts {
            posts: posts.len(),
            contributors: contributors.len(),
            titles: titles.len(),
            bodies: bodies.len(),
        },
    };

    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = out.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, serde_json::to_vec_pretty(&snapshot)?)?;
    fs::rename(&tmp_path, out)?;

    debug!(path = %out.display(), "stats snapshot written");
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vellum_core::{ContentError, Document};

    fn record(id: &str, height: u64) -> Record {
        Record {
            id: id.to_string(),
            block_height: height,
            block_timestamp: height as i64 * 100,
            attributes: Default::default(),
        }
    }

    fn document(id: &str, contributor: &str, timestamp: i64) -> Document {
        Document {
            id: id.to_string(),
            title: format!("title {id}"),
            body: format!("body {id}"),
            timestamp,
            digest: "digest".to_string(),
            contributor: contributor.to_string(),
            extra: None,
        }
    }

    #[test]
    fn test_snapshot_empty_logs() {
        let tmp = TempDir::new().unwrap();
        let records: AppendLog<Record> = AppendLog::new(tmp.path().join("records.jsonl"));
        let content: AppendLog<ContentResult> = AppendLog::new(tmp.path().join("content.jsonl"));
        let out = tmp.path().join("snapshot.json");

        let snapshot = write_snapshot(&records, &content, &out, Utc::now()).unwrap();

        assert!(snapshot.last_record.is_none());
        assert!(snapshot.last_document.is_none());
        assert_eq!(snapshot.window_24h.posts, 0);
        assert!(out.exists());
    }

    #[test]
    fn test_snapshot_counts_trailing_window_only() {
        let tmp = TempDir::new().unwrap();
        let records: AppendLog<Record> = AppendLog::new(tmp.path().join("records.jsonl"));
        let content: AppendLog<ContentResult> = AppendLog::new(tmp.path().join("content.jsonl"));

        records.append(&[record("t1", 1), record("t2", 2)]).unwrap();

        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let in_window = now.timestamp() - 3600;
        let out_of_window = now.timestamp() - 25 * 3600;

        content
            .append(&[
                ContentResult::Fetched(document("t1", "alice", out_of_window)),
                ContentResult::Fetched(document("t2", "alice", in_window)),
                ContentResult::Fetched(document("t3", "bob", in_window)),
                ContentResult::Failed(ContentError::timeout("t4")),
            ])
            .unwrap();

        let out = tmp.path().join("snapshot.json");
        let snapshot = write_snapshot(&records, &content, &out, now).unwrap();

        assert_eq!(snapshot.window_24h.posts, 2);
        assert_eq!(snapshot.window_24h.contributors, 2);
        assert_eq!(snapshot.window_24h.titles, 2);

        let last_record = snapshot.last_record.unwrap();
        assert_eq!(last_record.id, "t2");
        assert_eq!(last_record.block_height, 2);

        // Last *document* skips the trailing error line
        assert_eq!(snapshot.last_document.unwrap().id, "t3");
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let tmp = TempDir::new().unwrap();
        let records: AppendLog<Record> = AppendLog::new(tmp.path().join("records.jsonl"));
        let content: AppendLog<ContentResult> = AppendLog::new(tmp.path().join("content.jsonl"));
        records.append(&[record("t1", 935001)]).unwrap();

        let out = tmp.path().join("snapshot.json");
        write_snapshot(&records, &content, &out, Utc::now()).unwrap();

        let raw = fs::read_to_string(&out).unwrap();
        let back: StatsSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.last_record.unwrap().block_height, 935001);
        assert!(!tmp.path().join("snapshot.json.tmp").exists());
    }
}
