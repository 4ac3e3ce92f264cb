//! Atom feed generation from the content log.
//!
//! The feed is user-facing output, so unlike the stats snapshot its failures
//! are hard errors. The XML is assembled as a string with explicit escaping
//! and written atomically: staged in a sibling temp file, then renamed over
//! the destination so readers never observe a half-written feed.

use crate::error::{Error, Result};
use crate::log::AppendLog;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use vellum_core::{ContentResult, Document};

/// Configuration for feed generation.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Feed title.
    pub title: String,

    /// Base URL entries link to; an entry for id `t` links to `{site_url}/t`.
    pub site_url: String,

    /// Newest-first entry cap.
    pub max_entries: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: "vellum".to_string(),
            site_url: "https://arweave.net".to_string(),
            max_entries: 50,
        }
    }
}

/// Build the feed from the content log and write it to `out`.
///
/// Fetch-error lines in the log are skipped; only fetched documents become
/// entries. Returns the number of entries written.
pub fn write_feed(
    log: &AppendLog<ContentResult>,
    config: &FeedConfig,
    out: &Path,
) -> Result<usize> {
    let results = log
        .read_all()
        .map_err(|e| Error::Feed(format!("reading content log: {e}")))?;

    // Newest last in the log; the feed wants newest first.
    let documents: Vec<&Document> = results
        .iter()
        .filter_map(ContentResult::as_document)
        .rev()
        .take(config.max_entries)
        .collect();

    let xml = generate(&documents, config);

    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| Error::Feed(format!("creating feed dir: {e}")))?;
    }

    let mut tmp_name = out.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, &xml)
        .map_err(|e| Error::Feed(format!("writing {}: {e}", tmp_path.display())))?;
    fs::rename(&tmp_path, out)
        .map_err(|e| Error::Feed(format!("publishing {}: {e}", out.display())))?;

    info!(entries = documents.len(), path = %out.display(), "feed written");
    Ok(documents.len())
}

/// Render documents (already newest first) as an Atom feed.
fn generate(documents: &[&Document], config: &FeedConfig) -> String {
    let site = config.site_url.trim_end_matches('/');
    let updated = documents
        .first()
        .map(|d| rfc3339(d.timestamp))
        .unwrap_or_else(|| rfc3339(Utc::now().timestamp()));

    let mut xml = String::with_capacity(4096);
    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    xml.push_str(&format!("  <title>{}</title>\n", xml_escape(&config.title)));
    xml.push_str(&format!("  <id>{}/</id>\n", xml_escape(site)));
    xml.push_str(&format!("  <link href=\"{}\"/>\n", xml_escape(site)));
    xml.push_str(&format!("  <updated>{updated}</updated>\n"));

    for doc in documents {
        let link = format!("{site}/{}", doc.id);
        xml.push_str("  <entry>\n");
        xml.push_str(&format!("    <title>{}</title>\n", xml_escape(&doc.title)));
        xml.push_str(&format!("    <id>{}</id>\n", xml_escape(&link)));
        xml.push_str(&format!("    <link href=\"{}\"/>\n", xml_escape(&link)));
        xml.push_str(&format!(
            "    <updated>{}</updated>\n",
            rfc3339(doc.timestamp)
        ));
        xml.push_str(&format!(
            "    <author><name>{}</name></author>\n",
            xml_escape(&doc.contributor)
        ));
        xml.push_str(&format!(
            "    <content type=\"text\">{}</content>\n",
            xml_escape(&doc.body)
        ));
        xml.push_str("  </entry>\n");
    }

    xml.push_str("</feed>\n");
    xml
}

fn rfc3339(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vellum_core::ContentError;

    fn document(id: &str, title: &str, timestamp: i64) -> Document {
        Document {
            id: id.to_string(),
            title: title.to_string(),
            body: "body text".to_string(),
            timestamp,
            digest: "digest".to_string(),
            contributor: "0xabc".to_string(),
            extra: None,
        }
    }

    #[test]
    fn test_generate_escapes_and_orders() {
        let newer = document("t2", "Tags <& You>", 2000);
        let older = document("t1", "First", 1000);
        let docs = vec![&newer, &older];

        let xml = generate(&docs, &FeedConfig::default());

        assert!(xml.contains("Tags &lt;&amp; You&gt;"));
        let first = xml.find("t2").unwrap();
        let second = xml.find(">First<").unwrap();
        assert!(first < second, "newest entry should come first");
        assert!(xml.contains("1970-01-01T00:33:20Z"));
    }

    #[test]
    fn test_generate_empty_feed_is_valid() {
        let xml = generate(&[], &FeedConfig::default());
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<feed"));
        assert!(xml.ends_with("</feed>\n"));
        assert!(!xml.contains("<entry>"));
    }

    #[test]
    fn test_write_feed_skips_error_lines() {
        let tmp = TempDir::new().unwrap();
        let log: AppendLog<ContentResult> = AppendLog::new(tmp.path().join("content.jsonl"));
        log.append(&[
            ContentResult::Fetched(document("t1", "One", 1000)),
            ContentResult::Failed(ContentError::timeout("t2")),
            ContentResult::Fetched(document("t3", "Three", 3000)),
        ])
        .unwrap();

        let out = tmp.path().join("feed.xml");
        let entries = write_feed(&log, &FeedConfig::default(), &out).unwrap();

        assert_eq!(entries, 2);
        let xml = fs::read_to_string(&out).unwrap();
        assert!(xml.contains(">Three<"));
        assert!(xml.contains(">One<"));
        assert!(!xml.contains("t2"));
    }

    #[test]
    fn test_write_feed_caps_entries() {
        let tmp = TempDir::new().unwrap();
        let log: AppendLog<ContentResult> = AppendLog::new(tmp.path().join("content.jsonl"));
        let results: Vec<ContentResult> = (0..10)
            .map(|n| ContentResult::Fetched(document(&format!("t{n}"), &format!("P{n}"), n * 100)))
            .collect();
        log.append(&results).unwrap();

        let config = FeedConfig {
            max_entries: 3,
            ..Default::default()
        };
        let out = tmp.path().join("feed.xml");
        assert_eq!(write_feed(&log, &config, &out).unwrap(), 3);

        let xml = fs::read_to_string(&out).unwrap();
        assert!(xml.contains(">P9<"));
        assert!(xml.contains(">P7<"));
        assert!(!xml.contains(">P6<"));
    }

    #[test]
    fn test_write_feed_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let log: AppendLog<ContentResult> = AppendLog::new(tmp.path().join("content.jsonl"));
        log.append(&[ContentResult::Fetched(document("t1", "One", 1000))])
            .unwrap();

        let out = tmp.path().join("feed.xml");
        write_feed(&log, &FeedConfig::default(), &out).unwrap();

        assert!(out.exists());
        assert!(!tmp.path().join("feed.xml.tmp").exists());
    }

    #[test]
    fn test_write_feed_missing_log_writes_empty_feed() {
        let tmp = TempDir::new().unwrap();
        let log: AppendLog<ContentResult> = AppendLog::new(tmp.path().join("absent.jsonl"));

        let out = tmp.path().join("feed.xml");
        assert_eq!(write_feed(&log, &FeedConfig::default(), &out).unwrap(), 0);
        assert!(out.exists());
    }
}
