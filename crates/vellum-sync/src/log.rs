//! Append-only JSONL log with tail read and bounded retention.
//!
//! Both persisted streams (ledger records and content results) use this
//! store: one JSON document per line, append-only, single writer. The last
//! line is authoritative for resumption, so [`AppendLog::read_last`] seeks
//! from the end of the file instead of scanning it.
//!
//! Retention is a full rewrite of the file keeping only the newest lines,
//! staged in a sibling temp file and renamed over the original so a crash
//! mid-rewrite never leaves a half-written log behind.

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How much of the file tail to pull in per backwards read.
const TAIL_CHUNK: u64 = 8 * 1024;

/// An append-only newline-delimited JSON log.
///
/// Single-writer: concurrent processes appending to the same path are not
/// supported, and no file locking is attempted.
pub struct AppendLog<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> AppendLog<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a handle for the log at `path`. The file is created lazily on
    /// first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// The path this log writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append each item as one JSON line.
    ///
    /// Items are written in the order given and the file is flushed before
    /// returning. An empty slice is a no-op that doesn't touch the file.
    pub fn append(&self, items: &[T]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        for item in items {
            serde_json::to_writer(&mut writer, item)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        debug!("appended {} lines to {}", items.len(), self.path.display());
        Ok(())
    }

    /// Read and parse the final non-empty line of the log.
    ///
    /// Seeks from the end of the file, pulling in tail chunks until a full
    /// line is in memory. Returns `None` for a missing or empty log. A
    /// trailing line that doesn't parse (typically an unclean shutdown mid
    /// append) surfaces as [`Error::CorruptLog`]; no repair is attempted.
    pub fn read_last(&self) -> Result<Option<T>> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        let mut pos = len;
        let mut buf: Vec<u8> = Vec::new();

        let line = loop {
            // Trailing newlines and blank lines don't count as content.
            let content_end = buf
                .iter()
                .rposition(|b| !b.is_ascii_whitespace())
                .map(|i| i + 1)
                .unwrap_or(0);

            if content_end > 0
                && let Some(nl) = buf[..content_end].iter().rposition(|&b| b == b'\n')
            {
                break buf[nl + 1..content_end].to_vec();
            }
            if pos == 0 {
                break buf[..content_end].to_vec();
            }

            let read = TAIL_CHUNK.min(pos);
            pos -= read;
            file.seek(SeekFrom::Start(pos))?;
            let mut chunk = vec![0u8; read as usize];
            file.read_exact(&mut chunk)?;
            chunk.extend_from_slice(&buf);
            buf = chunk;
        };

        if line.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice(&line)
            .map(Some)
            .map_err(|source| Error::CorruptLog {
                path: self.path.clone(),
                source,
            })
    }

    /// Keep only the newest `keep` lines, preserving their order.
    ///
    /// Rewrites into a sibling temp file and renames it over the original,
    /// so an interrupted truncation leaves the previous log intact. Returns
    /// the number of lines dropped. A missing log, or one already within the
    /// bound, is left untouched.
    pub fn truncate_to_last(&self, keep: usize) -> Result<usize> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut lines: Vec<String> = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }

        let dropped = lines.len().saturating_sub(keep);
        if dropped == 0 {
            return Ok(0);
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for line in &lines[dropped..] {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(
            "truncated {}: dropped {} lines, kept {}",
            self.path.display(),
            dropped,
            lines.len() - dropped
        );
        Ok(dropped)
    }

    /// Read and parse every non-empty line, oldest first.
    ///
    /// Used by the derived artifacts (feed, stats snapshot), which need the
    /// full retained history. A malformed line anywhere surfaces as
    /// [`Error::CorruptLog`].
    pub fn read_all(&self) -> Result<Vec<T>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let item = serde_json::from_str(&line).map_err(|source| Error::CorruptLog {
                path: self.path.clone(),
                source,
            })?;
            items.push(item);
        }
        Ok(items)
    }
}
