//! Core types shared across the recognition pipeline.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of slots in a ranked search result.
pub const RANKED_SLOTS: usize = 10;

/// Fingerprint address -> couples produced at that address.
pub type FingerprintMap = HashMap<u32, Vec<Couple>>;

/// A spectral peak surviving extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Frame start time in seconds
    pub time: f64,
    /// Frequency bin index
    pub freq: u32,
}

impl Peak {
    /// Create a new peak.
    pub fn new(time: f64, freq: u32) -> Self {
        Self { time, freq }
    }
}

/// Payload stored at a fingerprint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Couple {
    /// Song that produced the address
    pub song_id: String,
    /// Anchor peak time in milliseconds
    pub anchor_time_ms: u32,
}

impl Couple {
    /// Create a new couple.
    pub fn new(song_id: impl Into<String>, anchor_time_ms: u32) -> Self {
        Self {
            song_id: song_id.into(),
            anchor_time_ms,
        }
    }
}

/// Persisted form is `<song_id>#<anchor_time_ms>`.
impl fmt::Display for Couple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.song_id, self.anchor_time_ms)
    }
}

impl FromStr for Couple {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Song ids may themselves contain '#', the time is always last.
        let (song_id, time) = s
            .rsplit_once('#')
            .ok_or_else(|| Error::MalformedCouple(s.to_string()))?;

        let anchor_time_ms = time
            .parse::<u32>()
            .map_err(|_| Error::MalformedCouple(s.to_string()))?;

        Ok(Couple::new(song_id, anchor_time_ms))
    }
}

/// Output of the fingerprint generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fingerprints {
    /// Address -> couples
    pub map: FingerprintMap,
    /// Number of address-producing (anchor, target) pairs
    pub zone_count: usize,
}

impl Fingerprints {
    /// Number of distinct addresses.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no address was produced.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Fixed-size ranked list of song ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedMatches {
    slots: [Option<String>; RANKED_SLOTS],
}

impl RankedMatches {
    /// Build a ranked list from song ids in rank order; extra ids are dropped.
    pub fn from_ranked<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut ranked = Self::default();
        for (slot, id) in ranked.slots.iter_mut().zip(ids) {
            *slot = Some(id);
        }
        ranked
    }

    /// Song id at the top slot.
    pub fn top(&self) -> Option<&str> {
        self.get(0)
    }

    /// Song id at `rank` (0-based).
    pub fn get(&self, rank: usize) -> Option<&str> {
        self.slots.get(rank).and_then(|s| s.as_deref())
    }

    /// All slots, filled or not.
    pub fn slots(&self) -> &[Option<String>; RANKED_SLOTS] {
        &self.slots
    }

    /// Filled slots in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().filter_map(|s| s.as_deref())
    }

    /// Number of filled slots.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True when no song was matched.
    pub fn is_empty(&self) -> bool {
        self.slots[0].is_none()
    }
}

/// One bin of a song's raw offset histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetBin {
    /// `db_anchor_ms - query_anchor_ms`
    pub offset_ms: i64,
    /// Number of match entries voting for this offset
    pub count: u32,
}

/// Scoring details for one candidate song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongScore {
    /// Candidate song
    pub song_id: String,
    /// Largest clustered histogram count
    pub max_count: u32,
    /// Mean clustered count
    pub mean: f64,
    /// Population standard deviation of clustered counts
    pub std_dev: f64,
    /// Best z-score over clustered bins
    pub z_score: f64,
    /// Whether `z_score` passed the confidence threshold
    pub confident: bool,
    /// `max_count / zone_count` of the query (0 when the query had no zones)
    pub coverage: f64,
    /// Raw offset histogram sorted by offset
    pub offsets: Vec<OffsetBin>,
}

/// Full result of scoring a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Ranked song ids
    pub ranked: RankedMatches,
    /// Per-candidate scores, in rank order
    pub scores: Vec<SongScore>,
}

/// Summary of one ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Ingested song
    pub song_id: String,
    /// Peaks extracted from the clip
    pub peak_count: usize,
    /// Distinct addresses written
    pub address_count: usize,
    /// Address-producing pairs
    pub zone_count: usize,
}

impl IngestReport {
    /// True when the clip produced nothing to store.
    pub fn is_empty(&self) -> bool {
        self.address_count == 0
    }
}

/// Summary of one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Ranked result and diagnostics
    pub report: MatchReport,
    /// Updated match count of the top song, when a counter is attached
    pub top_match_count: Option<u64>,
}

impl SearchOutcome {
    /// Ranked song ids.
    pub fn ranked(&self) -> &RankedMatches {
        &self.report.ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_couple_encoding() {
        let couple = Couple::new("song-7", 1234);
        assert_eq!(couple.to_string(), "song-7#1234");
        assert_eq!("song-7#1234".parse::<Couple>().unwrap(), couple);
    }

    #[test]
    fn test_couple_with_hash_in_song_id() {
        let couple: Couple = "live#2#99".parse().unwrap();
        assert_eq!(couple.song_id, "live#2");
        assert_eq!(couple.anchor_time_ms, 99);
    }

    #[test]
    fn test_malformed_couples() {
        assert!("no-separator".parse::<Couple>().is_err());
        assert!("song#-5".parse::<Couple>().is_err());
        assert!("song#abc".parse::<Couple>().is_err());
    }

    #[test]
    fn test_ranked_matches_slots() {
        let ranked = RankedMatches::from_ranked(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ranked.top(), Some("a"));
        assert_eq!(ranked.get(1), Some("b"));
        assert_eq!(ranked.get(2), None);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked.slots().len(), RANKED_SLOTS);
        assert!(!ranked.is_empty());
    }

    #[test]
    fn test_ranked_matches_truncates() {
        let ids = (0..15).map(|i| format!("song-{}", i));
        let ranked = RankedMatches::from_ranked(ids);
        assert_eq!(ranked.len(), RANKED_SLOTS);
        assert_eq!(ranked.get(9), Some("song-9"));
    }

    #[test]
    fn test_empty_ranked_matches() {
        let ranked = RankedMatches::default();
        assert!(ranked.is_empty());
        assert_eq!(ranked.top(), None);
        assert_eq!(ranked.iter().count(), 0);
    }
}
