//! Ledger record type and tag flattening.
//!
//! A [`Record`] is one entry of the remote transaction index: a globally
//! unique id plus the block it was mined into. The index attaches free-form
//! name/value tags to each transaction; [`flatten_tags`] turns those into the
//! record's `attributes` map, dropping transport noise that every
//! transaction of the tracked application carries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag names that carry no per-record information and are dropped when
/// flattening. `content-digest` is redundant with the fetched document's own
/// digest field.
const NOISE_TAGS: &[&str] = &["App-Name", "Content-Type", "content-digest"];

/// One entry of the remote transaction index.
///
/// Records are immutable once fetched and strictly non-decreasing in
/// `block_height` within and across pages (the index paginates ascending by
/// height). Identity is the `id` assigned by the remote index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Globally unique transaction id.
    pub id: String,

    /// Height of the block the transaction was mined into.
    pub block_height: u64,

    /// Unix timestamp of that block.
    pub block_timestamp: i64,

    /// Flattened application tags, lowercased, noise removed.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Flatten index tags into a record attribute map.
///
/// Tag names are lowercased so downstream consumers don't have to guess the
/// casing the publishing app used. Tags listed in [`NOISE_TAGS`] are dropped.
/// Later duplicates win, matching the index's own "last tag wins" display
/// behavior.
pub fn flatten_tags<'a, I>(tags: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut attributes = BTreeMap::new();
    for (name, value) in tags {
        if NOISE_TAGS.contains(&name) {
            continue;
        }
        attributes.insert(name.to_lowercase(), value.to_string());
    }
    attributes
}
