//! Spectral peak extraction.
//!
//! Each frame is reduced to one candidate per logarithmic band (the loudest
//! bin of the band). Candidates are then tested against a rectangular
//! neighbourhood of other frames and bands, and the survivors are thresholded
//! at `mean + std_dev` of their magnitudes.
//!
//! A neighbour only disqualifies a candidate when it differs from it in both
//! the frame and the band index. Louder cells in the same frame or the same
//! band never disqualify.
//!
//! Only bands sitting at the spectrogram's magnitude floor are left out of the
//! energy map. Every other cell counts, so scaling the input by a constant
//! shifts all magnitudes by the same number of dB and leaves the peaks as they
//! were.

use std::cmp::Ordering;

use tracing::debug;

use crate::config::RecognizerConfig;
use crate::spectrogram::{floor_db, Spectrogram};
use crate::types::Peak;

/// Half-open range of frequency bins `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBand {
    /// First bin of the band
    pub start: usize,
    /// One past the last bin of the band
    pub end: usize,
}

impl LogBand {
    /// True when the band holds no bins.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Split `[min_hz, max_hz]` into `num_bands` logarithmically spaced bands and
/// map them onto `bin_count` bins, with `max_hz` at the last bin.
pub fn log_bands(min_hz: f64, max_hz: f64, num_bands: usize, bin_count: usize) -> Vec<LogBand> {
    if num_bands == 0 || bin_count == 0 || !(min_hz > 0.0 && min_hz < max_hz) {
        return Vec::new();
    }

    let ratio = max_hz / min_hz;
    let to_bin = |i: usize| -> usize {
        let hz = min_hz * ratio.powf(i as f64 / num_bands as f64);
        ((hz / max_hz) * bin_count as f64).min(bin_count as f64) as usize
    };

    (0..num_bands)
        .map(|i| LogBand {
            start: to_bin(i),
            end: to_bin(i + 1),
        })
        .collect()
}

/// Loudest bin of one band in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BandCell {
    magnitude: f64,
    bin: usize,
}

/// Peak extractor over a fixed band layout.
#[derive(Debug, Clone)]
pub struct PeakExtractor {
    bands: Vec<LogBand>,
    time_radius: usize,
    freq_radius: usize,
}

impl PeakExtractor {
    /// Create an extractor over explicit bands.
    pub fn new(bands: Vec<LogBand>, time_radius: usize, freq_radius: usize) -> Self {
        Self {
            bands,
            time_radius,
            freq_radius,
        }
    }

    /// Extractor for the band layout and radii of `config`.
    pub fn from_config(config: &RecognizerConfig) -> Self {
        let bands = log_bands(
            config.min_band_hz,
            config.max_band_hz,
            config.num_bands,
            config.bin_count(),
        );
        Self::new(bands, config.time_radius, config.freq_radius)
    }

    /// Band layout in use.
    pub fn bands(&self) -> &[LogBand] {
        &self.bands
    }

    /// Extract peaks sorted by time, then frequency bin.
    pub fn extract(&self, spectrogram: &Spectrogram) -> Vec<Peak> {
        let energy = self.energy_map(spectrogram.frames());
        let num_frames = energy.len();
        let num_bands = self.bands.len();

        let mut accepted: Vec<(usize, BandCell)> = Vec::new();

        for n in 0..num_frames {
            for k in 0..num_bands {
                let Some(cell) = energy[n][k] else { continue };

                if self.is_local_max(&energy, n, k, cell.magnitude) {
                    accepted.push((n, cell));
                }
            }
        }

        if accepted.is_empty() {
            debug!("No local maxima in {} frames", num_frames);
            return Vec::new();
        }

        let count = accepted.len() as f64;
        let mean = accepted.iter().map(|(_, c)| c.magnitude).sum::<f64>() / count;
        let variance = accepted
            .iter()
            .map(|(_, c)| (c.magnitude - mean).powi(2))
            .sum::<f64>()
            / count;
        let threshold = mean + variance.sqrt();

        let times = spectrogram.times();
        let mut peaks: Vec<Peak> = accepted
            .iter()
            .filter(|(_, c)| c.magnitude >= threshold)
            .map(|&(n, c)| Peak::new(times[n], c.bin as u32))
            .collect();

        sort_peaks(&mut peaks);

        debug!(
            "Extracted {} peaks from {} local maxima (threshold {:.2} dB)",
            peaks.len(),
            accepted.len(),
            threshold
        );

        peaks
    }

    /// Loudest bin per band for every frame. A band whose bins all sit at the
    /// magnitude floor has no cell.
    fn energy_map(&self, frames: &[Vec<f64>]) -> Vec<Vec<Option<BandCell>>> {
        let silent = floor_db();
        frames
            .iter()
            .map(|frame| {
                self.bands
                    .iter()
                    .map(|band| {
                        let end = band.end.min(frame.len());
                        let mut best: Option<BandCell> = None;
                        for bin in band.start..end {
                            let magnitude = frame[bin];
                            let floor = best.map(|c| c.magnitude).unwrap_or(silent);
                            if magnitude > floor {
                                best = Some(BandCell { magnitude, bin });
                            }
                        }
                        best
                    })
                    .collect()
            })
            .collect()
    }

    fn is_local_max(&self, energy: &[Vec<Option<BandCell>>], n: usize, k: usize, magnitude: f64) -> bool {
        let last_frame = energy.len() - 1;
        let last_band = self.bands.len() - 1;

        let frames = n.saturating_sub(self.time_radius)..=(n + self.time_radius).min(last_frame);
        for i in frames {
            let bands = k.saturating_sub(self.freq_radius)..=(k + self.freq_radius).min(last_band);
            for j in bands {
                if i == n || j == k {
                    continue;
                }
                if let Some(other) = energy[i][j] {
                    if other.magnitude > magnitude {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// Extract peaks with the default 30-band 300-6000 Hz layout.
pub fn extract_peaks(spectrogram: &Spectrogram, time_radius: usize, freq_radius: usize) -> Vec<Peak> {
    let config = RecognizerConfig {
        time_radius,
        freq_radius,
        ..Default::default()
    };
    let bands = log_bands(
        config.min_band_hz,
        config.max_band_hz,
        config.num_bands,
        spectrogram.bin_count(),
    );
    PeakExtractor::new(bands, time_radius, freq_radius).extract(spectrogram)
}

/// Sort peaks by time, then frequency bin.
pub fn sort_peaks(peaks: &mut [Peak]) {
    peaks.sort_by(compare_peaks);
}

/// True when `peaks` is sorted by time, then frequency bin.
pub fn is_time_ordered(peaks: &[Peak]) -> bool {
    peaks
        .windows(2)
        .all(|w| compare_peaks(&w[0], &w[1]) != Ordering::Greater)
}

fn compare_peaks(a: &Peak, b: &Peak) -> Ordering {
    a.time.total_cmp(&b.time).then(a.freq.cmp(&b.freq))
}
