//! The synchronization engine.
//!
//! Drives repeated cycles of fetch-page → dedup → fetch-content → persist
//! until the index reports no further pages or the caller's budget runs out.
//!
//! ```text
//! ┌─────────────┐    ┌────────────┐    ┌───────────────┐    ┌───────────┐
//! │ PageSource  │───▶│ dedup::trim│───▶│ ContentSource │───▶│ AppendLog │
//! │ (paged idx) │    │ (boundary) │    │ (batch fetch) │    │  ×2 + cur │
//! └─────────────┘    └────────────┘    └───────────────┘    └───────────┘
//! ```
//!
//! # Crash safety
//!
//! The cursor is committed only after both appends succeed. A crash anywhere
//! before that leaves the cursor at its previous value, so the next run
//! re-fetches the same page; the dedup boundary (the last *persisted* record,
//! itself only updated by a successful append) then trims away everything
//! that already landed. Crash-and-retry therefore never duplicates a record.
//!
//! # Budgets
//!
//! Iteration and time budgets belong to the caller and are passed per run.
//! Budget exhaustion is only checked between cycles: a cycle that has started
//! always finishes persisting before the engine returns.

use crate::cursor::CursorStore;
use crate::dedup;
use crate::error::Result;
use crate::log::AppendLog;
use crate::query::Page;
use metrics::{counter, gauge};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use vellum_core::{ContentResult, Record};

/// A paged, ascending-by-height view of the remote transaction index.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    /// Fetch the page after `cursor`, bounded below by `min_block` (falling
    /// back to the implementation's floor when `None`).
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        min_block: Option<u64>,
        limit: usize,
    ) -> Result<Page>;
}

/// A batch content fetcher with per-id failure isolation.
#[allow(async_fn_in_trait)]
pub trait ContentSource {
    /// Fetch content for every id. Must return exactly one result per input
    /// id, in input order.
    async fn fetch_batch(&self, ids: &[String]) -> Vec<ContentResult>;
}

/// Caller-supplied limits for one [`SyncEngine::run`] invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunBudget {
    /// Stop after this many completed cycles.
    pub max_cycles: Option<usize>,

    /// Stop once this much wall time has passed. Checked between cycles, so
    /// the last cycle may overshoot.
    pub time_budget: Option<Duration>,
}

impl RunBudget {
    fn exhausted(&self, cycles: usize, started: Instant) -> bool {
        if let Some(max) = self.max_cycles
            && cycles >= max
        {
            return true;
        }
        if let Some(limit) = self.time_budget
            && started.elapsed() >= limit
        {
            return true;
        }
        false
    }
}

/// Statistics from one [`SyncEngine::run`] invocation.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Completed cycles, including entirely-stale pages.
    pub cycles: usize,

    /// Pages that contained no new records after dedup.
    pub stale_pages: usize,

    /// Records appended to the record log.
    pub records_appended: usize,

    /// Documents successfully fetched.
    pub documents_fetched: usize,

    /// Per-id content fetch failures (recorded in the content log).
    pub fetch_errors: usize,

    /// Whether the run ended because the index reported no further pages,
    /// as opposed to budget exhaustion.
    pub caught_up: bool,
}

/// The synchronization engine. Single driver, one cycle at a time.
pub struct SyncEngine<Q, C, S> {
    query: Q,
    content: C,
    cursor: S,
    records: AppendLog<Record>,
    content_log: AppendLog<ContentResult>,
    page_limit: usize,
}

impl<Q, C, S> SyncEngine<Q, C, S>
where
    Q: PageSource,
    C: ContentSource,
    S: CursorStore,
{
    /// Assemble an engine from its collaborators.
    pub fn new(
        query: Q,
        content: C,
        cursor: S,
        records: AppendLog<Record>,
        content_log: AppendLog<ContentResult>,
        page_limit: usize,
    ) -> Self {
        Self {
            query,
            content,
            cursor,
            records,
            content_log,
            page_limit,
        }
    }

    /// The record log this engine appends to.
    pub fn record_log(&self) -> &AppendLog<Record> {
        &self.records
    }

    /// The content log this engine appends to.
    pub fn content_log(&self) -> &AppendLog<ContentResult> {
        &self.content_log
    }

    /// Run cycles until caught up or the budget is exhausted.
    ///
    /// A transport failure or corrupt log aborts the run with the cursor at
    /// its last committed value; re-running resumes from a consistent point.
    pub async fn run(&mut self, budget: RunBudget) -> Result<RunStats> {
        let started = Instant::now();
        let mut stats = RunStats::default();

        loop {
            // The last persisted record is authoritative for both the dedup
            // boundary and the replay floor, independent of cursor validity.
            let last = self.records.read_last()?;
            let min_block = last.as_ref().map(|r| r.block_height);
            let cursor = self.cursor.load()?;

            let page = self
                .query
                .fetch_page(cursor.as_deref(), min_block, self.page_limit)
                .await?;
            let has_next = page.has_next;
            let next_cursor = page.next_cursor().map(str::to_string);

            if page.edges.is_empty() {
                debug!("index returned an empty page; nothing to sync");
                stats.caught_up = true;
                break;
            }

            let boundary = last.as_ref().map(|r| r.id.as_str());
            let fresh = dedup::trim(page.into_records(), boundary);

            stats.cycles += 1;
            counter!("sync_cycles_total").increment(1);

            if fresh.is_empty() {
                // The page existed but everything in it is already
                // persisted. Advance past it; has_next may still be true.
                stats.stale_pages += 1;
                counter!("sync_pages_stale_total").increment(1);
                if let Some(c) = &next_cursor {
                    self.cursor.store(c)?;
                }
                debug!("page entirely stale; cursor advanced");

                if !has_next {
                    stats.caught_up = true;
                    break;
                }
                if budget.exhausted(stats.cycles, started) {
                    break;
                }
                continue;
            }

            let ids: Vec<String> = fresh.iter().map(|r| r.id.clone()).collect();
            let results = self.content.fetch_batch(&ids).await;
            let fetched = results.iter().filter(|r| !r.is_error()).count();
            let errors = results.len() - fetched;

            // Persist both streams, then commit the cursor. This ordering is
            // the crash-safety contract; see the module docs.
            self.records.append(&fresh)?;
            self.content_log.append(&results)?;
            if let Some(c) = &next_cursor {
                self.cursor.store(c)?;
            }

            if let Some(newest) = fresh.last() {
                gauge!("sync_last_block_height").set(newest.block_height as f64);
                info!(
                    appended = fresh.len(),
                    fetched,
                    errors,
                    block_height = newest.block_height,
                    "cycle persisted"
                );
            }
            counter!("sync_records_appended_total").increment(fresh.len() as u64);
            counter!("sync_documents_fetched_total").increment(fetched as u64);
            counter!("sync_content_errors_total").increment(errors as u64);

            stats.records_appended += fresh.len();
            stats.documents_fetched += fetched;
            stats.fetch_errors += errors;

            if !has_next {
                stats.caught_up = true;
                break;
            }
            if budget.exhausted(stats.cycles, started) {
                debug!("budget exhausted; stopping after completed cycle");
                break;
            }
        }

        Ok(stats)
    }
}
