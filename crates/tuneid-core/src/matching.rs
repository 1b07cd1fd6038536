//! Offset-histogram matching of query fingerprints against a store.
//!
//! A stored couple only takes part in scoring when its `(song, anchor)` pair
//! was hit at least `target_zone_size` times by the query, i.e. when enough of
//! one anchor's target zone matched. Each surviving couple votes for the time
//! offsets between its anchor and the query anchors at the same address. A
//! true match piles its votes onto one offset; the z-score of the clustered
//! histogram separates that spike from the background.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::config::RecognizerConfig;
use crate::store::FingerprintStore;
use crate::types::{Couple, FingerprintMap, Fingerprints, MatchReport, OffsetBin, RankedMatches, SongScore};
use crate::Result;

/// One voting stored couple: its anchor time and the query couples sharing its address.
struct MatchEntry<'a> {
    db_time_ms: u32,
    query_couples: &'a [Couple],
}

/// Look up every query address in `store` and score the candidates.
///
/// A failed lookup fails the whole search.
pub async fn find_matches(
    store: &dyn FingerprintStore,
    query: &Fingerprints,
    config: &RecognizerConfig,
) -> Result<MatchReport> {
    if query.is_empty() {
        return Ok(MatchReport::default());
    }

    let addresses: HashSet<u32> = query.map.keys().copied().collect();
    let fetched = store.get(&addresses).await?;

    debug!(
        "Fetched {} of {} query addresses from the store",
        fetched.len(),
        addresses.len()
    );

    Ok(score_matches(&query.map, &fetched, query.zone_count, config))
}

/// Score the couples fetched for a query.
///
/// `zone_count` is the query's number of address-producing pairs and only
/// feeds the reported coverage.
pub fn score_matches(
    query: &FingerprintMap,
    fetched: &HashMap<u32, Vec<Couple>>,
    zone_count: usize,
    config: &RecognizerConfig,
) -> MatchReport {
    let mut zone_hits: HashMap<(&str, u32), usize> = HashMap::new();
    for couple in fetched.values().flatten() {
        *zone_hits
            .entry((couple.song_id.as_str(), couple.anchor_time_ms))
            .or_insert(0) += 1;
    }

    let mut entries: HashMap<&str, Vec<MatchEntry<'_>>> = HashMap::new();
    for (address, couples) in fetched {
        let Some(query_couples) = query.get(address) else { continue };

        for couple in couples {
            let hits = zone_hits
                .get(&(couple.song_id.as_str(), couple.anchor_time_ms))
                .copied()
                .unwrap_or(0);
            if hits < config.target_zone_size {
                continue;
            }

            entries.entry(couple.song_id.as_str()).or_default().push(MatchEntry {
                db_time_ms: couple.anchor_time_ms,
                query_couples,
            });
        }
    }

    let scores = entries
        .into_iter()
        .filter_map(|(song_id, song_entries)| score_song(song_id, &song_entries, zone_count, config))
        .collect();

    rank(scores)
}

fn score_song(
    song_id: &str,
    entries: &[MatchEntry<'_>],
    zone_count: usize,
    config: &RecognizerConfig,
) -> Option<SongScore> {
    let offsets = offset_histogram(entries);
    if offsets.is_empty() {
        return None;
    }

    let clustered = cluster_counts(&offsets, config.offset_tolerance_ms);
    let stats = OffsetStats::from_counts(&clustered);
    let coverage = if zone_count > 0 {
        stats.max_count as f64 / zone_count as f64
    } else {
        0.0
    };

    debug!(
        "Song {}: {} entries, {} offsets, max {} mean {:.2} std {:.2} z {:.2}",
        song_id,
        entries.len(),
        offsets.len(),
        stats.max_count,
        stats.mean,
        stats.std_dev,
        stats.z_score
    );

    Some(SongScore {
        song_id: song_id.to_string(),
        max_count: stats.max_count,
        mean: stats.mean,
        std_dev: stats.std_dev,
        z_score: stats.z_score,
        confident: stats.z_score >= config.z_threshold,
        coverage,
        offsets,
    })
}

/// Count, per offset, the entries voting for it. Each entry votes at most once
/// per offset. The result is sorted by offset.
fn offset_histogram(entries: &[MatchEntry<'_>]) -> Vec<OffsetBin> {
    let mut histogram: BTreeMap<i64, u32> = BTreeMap::new();

    for entry in entries {
        let unique: BTreeSet<i64> = entry
            .query_couples
            .iter()
            .map(|q| entry.db_time_ms as i64 - q.anchor_time_ms as i64)
            .collect();
        for offset in unique {
            *histogram.entry(offset).or_insert(0) += 1;
        }
    }

    histogram
        .into_iter()
        .map(|(offset_ms, count)| OffsetBin { offset_ms, count })
        .collect()
}

/// For each offset, the total count of it and every later offset within `tolerance_ms`.
fn cluster_counts(offsets: &[OffsetBin], tolerance_ms: i64) -> Vec<u32> {
    (0..offsets.len())
        .map(|i| {
            offsets[i..]
                .iter()
                .take_while(|other| other.offset_ms - offsets[i].offset_ms <= tolerance_ms)
                .map(|other| other.count)
                .sum()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct OffsetStats {
    max_count: u32,
    mean: f64,
    std_dev: f64,
    z_score: f64,
}

impl OffsetStats {
    /// Population statistics of `counts`. A flat or empty histogram scores zero.
    fn from_counts(counts: &[u32]) -> Self {
        if counts.is_empty() {
            return Self {
                max_count: 0,
                mean: 0.0,
                std_dev: 0.0,
                z_score: 0.0,
            };
        }

        let n = counts.len() as f64;
        let max_count = counts.iter().copied().max().unwrap_or(0);
        let mean = counts.iter().map(|&c| c as f64).sum::<f64>() / n;
        let std_dev = (counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / n).sqrt();

        let z_score = if std_dev > 0.0 {
            counts
                .iter()
                .map(|&c| (c as f64 - mean) / std_dev)
                .fold(0.0, f64::max)
        } else {
            0.0
        };

        Self {
            max_count,
            mean,
            std_dev,
            z_score,
        }
    }
}

/// Confident songs by descending z, then the rest by descending max count.
/// Ties go to the lexicographically smaller song id.
fn rank(scores: Vec<SongScore>) -> MatchReport {
    let (mut confident, mut fallback): (Vec<_>, Vec<_>) = scores.into_iter().partition(|s| s.confident);

    confident.sort_by(|a, b| {
        b.z_score
            .total_cmp(&a.z_score)
            .then_with(|| a.song_id.cmp(&b.song_id))
    });
    fallback.sort_by(|a, b| {
        b.max_count
            .cmp(&a.max_count)
            .then_with(|| a.song_id.cmp(&b.song_id))
    });

    debug!(
        "{} confident and {} fallback candidates",
        confident.len(),
        fallback.len()
    );

    let scores: Vec<SongScore> = confident.into_iter().chain(fallback).collect();
    let ranked = RankedMatches::from_ranked(scores.iter().map(|s| s.song_id.clone()));

    MatchReport { ranked, scores }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::store::MemoryStore;
    use crate::types::Peak;

    fn config(target_zone_size: usize) -> RecognizerConfig {
        RecognizerConfig {
            target_zone_size,
            ..Default::default()
        }
    }

    fn couples(song: &str, times: &[u32]) -> Vec<Couple> {
        times.iter().map(|&t| Couple::new(song, t)).collect()
    }

    fn bins(pairs: &[(i64, u32)]) -> Vec<OffsetBin> {
        pairs
            .iter()
            .map(|&(offset_ms, count)| OffsetBin { offset_ms, count })
            .collect()
    }

    fn score(song: &str, max_count: u32, z_score: f64, confident: bool) -> SongScore {
        SongScore {
            song_id: song.to_string(),
            max_count,
            mean: 0.0,
            std_dev: 0.0,
            z_score,
            confident,
            coverage: 0.0,
            offsets: Vec::new(),
        }
    }

    /// Time-ordered peaks with pseudo-random bins.
    fn synthetic_peaks(count: usize, max_bin: u32, seed: u64) -> Vec<Peak> {
        let mut state = seed;
        (0..count)
            .map(|i| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                Peak::new(i as f64 * 0.0625, ((state >> 33) % max_bin as u64) as u32)
            })
            .collect()
    }

    #[test]
    fn test_nothing_fetched() {
        let mut query = FingerprintMap::new();
        query.insert(1, couples("query", &[0]));

        let report = score_matches(&query, &HashMap::new(), 10, &config(5));
        assert!(report.ranked.is_empty());
        assert!(report.scores.is_empty());
    }

    #[test]
    fn test_zones_below_size_are_ignored() {
        let mut query = FingerprintMap::new();
        let mut fetched = HashMap::new();
        for address in 0..3 {
            query.insert(address, couples("query", &[0]));
            fetched.insert(address, couples("song", &[1000]));
        }
        // "song"@1000 is hit three times.
        let report = score_matches(&query, &fetched, 3, &config(4));
        assert!(report.ranked.is_empty());

        let report = score_matches(&query, &fetched, 3, &config(3));
        assert_eq!(report.ranked.top(), Some("song"));
        assert_eq!(report.scores[0].offsets, bins(&[(1000, 3)]));
        assert_eq!(report.scores[0].coverage, 1.0);
    }

    #[test]
    fn test_offsets_are_signed_and_deduplicated_per_entry() {
        let mut query = FingerprintMap::new();
        // Two query anchors collide at address 1, one of them twice.
        query.insert(1, couples("query", &[300, 300, 1500]));
        let mut fetched = HashMap::new();
        fetched.insert(1, couples("song", &[1000]));

        let report = score_matches(&query, &fetched, 1, &config(1));
        assert_eq!(report.scores[0].offsets, bins(&[(-500, 1), (700, 1)]));
    }

    #[test]
    fn test_forward_clustering() {
        let offsets = bins(&[(1000, 3), (1050, 1), (1100, 2), (1200, 1)]);
        assert_eq!(cluster_counts(&offsets, 100), vec![6, 3, 3, 1]);
        assert_eq!(cluster_counts(&offsets, 0), vec![3, 1, 2, 1]);
        assert!(cluster_counts(&[], 100).is_empty());
    }

    #[test]
    fn test_stats() {
        let stats = OffsetStats::from_counts(&[10, 1, 1, 1, 1, 1, 1, 1, 1, 1]);
        assert_eq!(stats.max_count, 10);
        assert!((stats.mean - 1.9).abs() < 1e-12);
        assert!((stats.std_dev - 2.7).abs() < 1e-12);
        assert!((stats.z_score - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_histogram_has_zero_z() {
        for counts in [&[4u32][..], &[2, 2, 2][..], &[][..]] {
            let stats = OffsetStats::from_counts(counts);
            assert_eq!(stats.z_score, 0.0);
            assert!(!stats.mean.is_nan());
        }
    }

    #[test]
    fn test_ranking_order() {
        let report = rank(vec![
            score("fallback-low", 3, 1.0, false),
            score("confident-b", 9, 4.0, true),
            score("fallback-high", 8, 2.0, false),
            score("confident-top", 2, 7.5, true),
            score("confident-a", 5, 4.0, true),
            score("fallback-tie", 8, 0.5, false),
        ]);

        let ranked: Vec<&str> = report.ranked.iter().collect();
        assert_eq!(
            ranked,
            vec![
                "confident-top",
                "confident-a",
                "confident-b",
                "fallback-high",
                "fallback-tie",
                "fallback-low"
            ]
        );
        assert_eq!(report.scores.len(), 6);
        assert_eq!(report.ranked.get(6), None);
    }

    #[test]
    fn test_ranked_list_holds_ten() {
        let scores = (0..14).map(|i| score(&format!("s{:02}", i), i, 0.0, false)).collect();
        let report = rank(scores);
        assert_eq!(report.ranked.len(), 10);
        assert_eq!(report.ranked.top(), Some("s13"));
        assert_eq!(report.scores.len(), 14);
    }

    #[tokio::test]
    async fn test_identical_fingerprints_match_confidently() {
        let peaks = synthetic_peaks(400, 64, 0x2545_F491_4F6C_DD1D);
        let song = fingerprint(&peaks, "song", 5);

        let store = MemoryStore::new();
        store.put(&song.map).await.unwrap();

        let query = fingerprint(&peaks, "query", 5);
        let report = find_matches(&store, &query, &config(5)).await.unwrap();

        assert_eq!(report.ranked.top(), Some("song"));
        let best = &report.scores[0];
        assert!(best.confident);
        assert!(best.z_score >= 2.5, "z = {}", best.z_score);
        assert!(best.offsets.iter().any(|b| b.offset_ms == 0));
    }

    #[tokio::test]
    async fn test_true_song_beats_unrelated_song() {
        let peaks = synthetic_peaks(400, 64, 0x2545_F491_4F6C_DD1D);
        let other = synthetic_peaks(400, 512, 0x9E37_79B9_7F4A_7C15);

        let store = MemoryStore::new();
        store.put(&fingerprint(&peaks, "song", 5).map).await.unwrap();
        store.put(&fingerprint(&other, "other", 5).map).await.unwrap();

        let query = fingerprint(&peaks, "query", 5);
        let report = find_matches(&store, &query, &config(5)).await.unwrap();
        assert_eq!(report.ranked.top(), Some("song"));
    }

    #[tokio::test]
    async fn test_empty_query_skips_lookup() {
        let store = MemoryStore::new();
        let report = find_matches(&store, &Fingerprints::default(), &config(5)).await.unwrap();
        assert!(report.ranked.is_empty());
    }
}
