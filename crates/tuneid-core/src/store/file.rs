//! JSON file backed stores
//!
//! The fingerprint database is a single JSON object keyed by decimal address,
//! each value a list of `"<song_id>#<anchor_ms>"` strings. Every write replaces
//! the file through a temporary sibling and a rename.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{merge_into, select, FingerprintStore, MatchCounter};
use crate::types::{Couple, FingerprintMap};
use crate::{Error, Result};

/// Fingerprint store persisted as one JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store at `path`. The file is created on the first `put`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<FingerprintMap> {
        let Some(raw) = read_json::<BTreeMap<String, Vec<String>>>(&self.path).await? else {
            return Ok(FingerprintMap::new());
        };

        let mut map = FingerprintMap::with_capacity(raw.len());
        for (key, entries) in raw {
            let address = key
                .parse::<u32>()
                .map_err(|_| Error::store(format!("invalid address key {:?} in {}", key, self.path.display())))?;
            let couples = entries
                .iter()
                .map(|entry| entry.parse::<Couple>())
                .collect::<Result<Vec<_>>>()?;
            map.insert(address, couples);
        }
        Ok(map)
    }

    async fn save(&self, map: &FingerprintMap) -> Result<()> {
        let raw: BTreeMap<String, Vec<String>> = map
            .iter()
            .map(|(address, couples)| {
                (
                    address.to_string(),
                    couples.iter().map(Couple::to_string).collect(),
                )
            })
            .collect();
        write_json(&self.path, &raw).await
    }
}

#[async_trait]
impl FingerprintStore for JsonFileStore {
    async fn get(&self, addresses: &HashSet<u32>) -> Result<HashMap<u32, Vec<Couple>>> {
        let _guard = self.lock.lock().await;
        let map = self.load().await?;
        Ok(select(&map, addresses))
    }

    async fn put(&self, fingerprints: &FingerprintMap) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        merge_into(&mut map, fingerprints);
        self.save(&map).await?;

        debug!(
            "Wrote {} addresses to {} ({} total)",
            fingerprints.len(),
            self.path.display(),
            map.len()
        );
        Ok(())
    }
}

/// Match counter persisted as a JSON object of song id -> count
#[derive(Debug)]
pub struct JsonFileCounter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCounter {
    /// Open a counter at `path`. The file is created on the first increment.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, u64>> {
        Ok(read_json(&self.path).await?.unwrap_or_default())
    }
}

#[async_trait]
impl MatchCounter for JsonFileCounter {
    async fn increment_and_get(&self, song_id: &str) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let mut counts = self.load().await?;
        let count = counts.entry(song_id.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        write_json(&self.path, &counts).await?;
        Ok(count)
    }

    async fn get(&self, song_id: &str) -> Result<u64> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.get(song_id).copied().unwrap_or(0))
    }
}

/// Read and parse `path`, or `None` if it does not exist.
async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let data = serde_json::to_string(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
