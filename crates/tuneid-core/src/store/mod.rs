//! Fingerprint and match-count storage
//!
//! The pipeline never owns its database. Callers inject a [`FingerprintStore`]
//! (and optionally a [`MatchCounter`]) into every ingest and search.

mod file;
mod memory;

pub use file::{JsonFileCounter, JsonFileStore};
pub use memory::{MemoryCounter, MemoryStore};

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::types::{Couple, FingerprintMap};
use crate::Result;

/// Address -> couples persistence
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Fetch the couples stored under each of `addresses`.
    ///
    /// Addresses with nothing stored are absent from the result.
    async fn get(&self, addresses: &HashSet<u32>) -> Result<HashMap<u32, Vec<Couple>>>;

    /// Append `fingerprints` to whatever is already stored at each address.
    async fn put(&self, fingerprints: &FingerprintMap) -> Result<()>;
}

/// Per-song "matched" event counter
#[async_trait]
pub trait MatchCounter: Send + Sync {
    /// Record one match of `song_id` and return the new count.
    async fn increment_and_get(&self, song_id: &str) -> Result<u64>;

    /// Current count for `song_id` (0 if never matched).
    async fn get(&self, song_id: &str) -> Result<u64>;
}

/// Merge `incoming` into `existing`, appending couples per address.
pub(crate) fn merge_into(existing: &mut FingerprintMap, incoming: &FingerprintMap) {
    for (&address, couples) in incoming {
        existing
            .entry(address)
            .or_default()
            .extend(couples.iter().cloned());
    }
}

/// Entries of `stored` whose address is in `addresses`.
pub(crate) fn select(stored: &FingerprintMap, addresses: &HashSet<u32>) -> HashMap<u32, Vec<Couple>> {
    addresses
        .iter()
        .filter_map(|address| {
            stored
                .get(address)
                .filter(|couples| !couples.is_empty())
                .map(|couples| (*address, couples.clone()))
        })
        .collect()
}
