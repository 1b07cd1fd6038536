//! In-process stores

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{merge_into, select, FingerprintStore, MatchCounter};
use crate::types::{Couple, FingerprintMap};
use crate::Result;

/// Fingerprint store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<FingerprintMap>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses with at least one couple.
    pub async fn address_count(&self) -> usize {
        self.map.read().await.len()
    }

    /// Total number of stored couples.
    pub async fn couple_count(&self) -> usize {
        self.map.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl FingerprintStore for MemoryStore {
    async fn get(&self, addresses: &HashSet<u32>) -> Result<HashMap<u32, Vec<Couple>>> {
        let map = self.map.read().await;
        Ok(select(&map, addresses))
    }

    async fn put(&self, fingerprints: &FingerprintMap) -> Result<()> {
        let mut map = self.map.write().await;
        merge_into(&mut map, fingerprints);
        Ok(())
    }
}

/// Match counter held in memory
#[derive(Debug, Default)]
pub struct MemoryCounter {
    counts: RwLock<HashMap<String, u64>>,
}

impl MemoryCounter {
    /// Create a counter with every song at zero.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchCounter for MemoryCounter {
    async fn increment_and_get(&self, song_id: &str) -> Result<u64> {
        let mut counts = self.counts.write().await;
        let count = counts.entry(song_id.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn get(&self, song_id: &str) -> Result<u64> {
        Ok(self.counts.read().await.get(song_id).copied().unwrap_or(0))
    }
}
