//! Dedup window: trim a fetched page down to genuinely new records.
//!
//! The boundary is the id of the last persisted record. Because the cursor
//! only advances after a successful persist, a crash-and-retry re-fetches a
//! page whose prefix is already in the log; this trim is what makes that
//! retry append-free.

use tracing::debug;
use vellum_core::Record;

/// Drop everything up to and including the boundary record.
///
/// - `boundary` of `None` means nothing has been persisted yet; the page
///   passes through unchanged.
/// - If the boundary id appears in the page, records before and including it
///   are discarded.
/// - If the boundary id is *not* in the page, the page was already fully
///   consumed past it (or the remote dropped the record in a reorg) and every
///   record is assumed new. The reorg case can duplicate records; it is
///   logged, not papered over.
///
/// An empty result where the boundary was the final element means "no new
/// data yet", not completion — the caller advances the cursor and keeps
/// going.
pub fn trim(records: Vec<Record>, boundary: Option<&str>) -> Vec<Record> {
    let Some(boundary) = boundary else {
        return records;
    };

    match records.iter().position(|r| r.id == boundary) {
        Some(idx) => records.into_iter().skip(idx + 1).collect(),
        None => {
            debug!(
                boundary,
                page_len = records.len(),
                "boundary record not in page; treating every record as new"
            );
            records
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, height: u64) -> Record {
        Record {
            id: id.to_string(),
            block_height: height,
            block_timestamp: height as i64 * 100,
            attributes: Default::default(),
        }
    }

    fn page() -> Vec<Record> {
        vec![
            record("a", 1),
            record("b", 2),
            record("c", 3),
            record("d", 4),
        ]
    }

    #[test]
    fn test_no_boundary_passes_through() {
        let trimmed = trim(page(), None);
        assert_eq!(trimmed.len(), 4);
        assert_eq!(trimmed[0].id, "a");
    }

    #[test]
    fn test_boundary_mid_page() {
        let trimmed = trim(page(), Some("b"));
        let ids: Vec<&str> = trimmed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn test_boundary_is_first_element() {
        let trimmed = trim(page(), Some("a"));
        let ids: Vec<&str> = trimmed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_boundary_is_last_element_yields_empty() {
        let trimmed = trim(page(), Some("d"));
        assert!(trimmed.is_empty());
    }

    #[test]
    fn test_boundary_not_in_page_assumes_all_new() {
        let trimmed = trim(page(), Some("zzz"));
        assert_eq!(trimmed.len(), 4);
    }

    #[test]
    fn test_empty_page() {
        assert!(trim(Vec::new(), Some("a")).is_empty());
        assert!(trim(Vec::new(), None).is_empty());
    }
}
