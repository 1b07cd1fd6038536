//! Combinatorial hashing of peak pairs.
//!
//! Every anchor peak is paired with itself and the `target_zone_size` peaks
//! that follow it. A pair is packed into a 32-bit address:
//!
//! ```text
//!  31        22 21        12 11           0
//! ┌────────────┬────────────┬──────────────┐
//! │ anchor bin │ target bin │   delta ms   │
//! └────────────┴────────────┴──────────────┘
//! ```
//!
//! The layout is persisted in stores and must not change.

use tracing::debug;

use crate::peaks::is_time_ordered;
use crate::types::{Couple, FingerprintMap, Fingerprints, Peak};

/// Largest value of a 10-bit frequency field.
pub const FREQ_FIELD_MAX: u32 = 0x3FF;

/// Largest value of the 12-bit delta field, in milliseconds.
pub const MAX_DELTA_MS: u32 = 0xFFF;

/// Pack an (anchor, target) pair into an address.
pub fn address(anchor: &Peak, target: &Peak) -> u32 {
    let delta_ms = delta_ms(anchor, target);
    ((anchor.freq & FREQ_FIELD_MAX) << 22) | ((target.freq & FREQ_FIELD_MAX) << 12) | (delta_ms & MAX_DELTA_MS)
}

/// Split an address into `(anchor_bin, target_bin, delta_ms)`.
pub fn unpack_address(address: u32) -> (u32, u32, u32) {
    (
        (address >> 22) & FREQ_FIELD_MAX,
        (address >> 12) & FREQ_FIELD_MAX,
        address & MAX_DELTA_MS,
    )
}

/// Time from anchor to target in whole milliseconds (truncated, never negative).
fn delta_ms(anchor: &Peak, target: &Peak) -> u32 {
    ((target.time - anchor.time) * 1000.0).max(0.0) as u32
}

/// Fingerprint a time-ordered peak sequence.
///
/// An anchor fires when at least `target_zone_size` members of its window lie
/// within the delta field; only those members produce addresses. Anchors too
/// close to the end of the sequence to own a full window are skipped.
///
/// # Panics
///
/// In debug builds, panics if `peaks` is not sorted by time, then frequency
/// bin (see [`sort_peaks`](crate::peaks::sort_peaks)). Release builds do not
/// check and produce meaningless deltas for unsorted input.
pub fn fingerprint(peaks: &[Peak], song_id: &str, target_zone_size: usize) -> Fingerprints {
    debug_assert!(is_time_ordered(peaks), "peaks must be sorted by time");

    let mut map = FingerprintMap::new();
    let mut zone_count = 0;

    for (i, anchor) in peaks.iter().enumerate() {
        if i + target_zone_size >= peaks.len() {
            break;
        }

        let window = &peaks[i..=i + target_zone_size];
        let in_range = window
            .iter()
            .filter(|target| delta_ms(anchor, target) <= MAX_DELTA_MS)
            .count();
        if in_range < target_zone_size {
            continue;
        }

        let anchor_time_ms = (anchor.time * 1000.0) as u32;
        for target in window.iter().filter(|t| delta_ms(anchor, t) <= MAX_DELTA_MS) {
            zone_count += 1;
            map.entry(address(anchor, target))
                .or_default()
                .push(Couple::new(song_id, anchor_time_ms));
        }
    }

    debug!(
        "Fingerprinted {} peaks into {} addresses ({} pairs)",
        peaks.len(),
        map.len(),
        zone_count
    );

    Fingerprints { map, zone_count }
}
