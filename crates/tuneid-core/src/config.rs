//! Configuration parameters for fingerprinting and matching

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::fingerprint::{FREQ_FIELD_MAX, MAX_DELTA_MS};
use crate::{Error, Result};

/// Recognizer configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    // Input
    /// Sample rate the decoder delivers (default: 48000)
    pub sample_rate: u32,

    // Preprocessing
    /// Low-pass cutoff applied before decimation in Hz (default: 6000.0)
    pub cutoff_hz: f64,

    /// Optional high-pass cutoff in Hz applied before the low-pass (default: off)
    pub high_pass_hz: Option<f64>,

    /// Block-average decimation ratio (default: 4)
    pub decimation_ratio: usize,

    // Spectrogram
    /// FFT window size, power of two (default: 2048)
    pub frame_size: usize,

    /// Hop between consecutive frames in samples (default: 64)
    pub hop_size: usize,

    // Peak extraction
    /// Number of logarithmic bands (default: 30)
    pub num_bands: usize,

    /// Lower edge of the band span in Hz (default: 300.0)
    pub min_band_hz: f64,

    /// Upper edge of the band span in Hz, mapped to the last bin (default: 6000.0)
    pub max_band_hz: f64,

    /// Local-maximum neighbourhood half-width in frames (default: 11)
    pub time_radius: usize,

    /// Local-maximum neighbourhood half-width in bands (default: 5)
    pub freq_radius: usize,

    // Fingerprinting and matching
    /// Target zone size; also the minimum hits for a valid zone (default: 5)
    pub target_zone_size: usize,

    /// Offset histogram clustering window in ms (default: 100)
    pub offset_tolerance_ms: i64,

    /// Minimum z-score for a confident match (default: 2.5)
    pub z_threshold: f64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            cutoff_hz: 6000.0,
            high_pass_hz: None,
            decimation_ratio: 4,
            frame_size: 2048,
            hop_size: 64,
            num_bands: 30,
            min_band_hz: 300.0,
            max_band_hz: 6000.0,
            time_radius: 11,
            freq_radius: 5,
            target_zone_size: 5,
            offset_tolerance_ms: 100,
            z_threshold: 2.5,
        }
    }
}

impl RecognizerConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of magnitude bins per spectrogram frame.
    pub fn bin_count(&self) -> usize {
        self.frame_size / 2
    }

    /// Sample rate after decimation.
    pub fn decimated_rate(&self) -> f64 {
        self.sample_rate as f64 / self.decimation_ratio as f64
    }

    /// Check every parameter, including the address field widths.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be positive".into()));
        }
        if !(self.cutoff_hz.is_finite() && self.cutoff_hz > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "cutoff_hz must be positive, got {}",
                self.cutoff_hz
            )));
        }
        if let Some(hp) = self.high_pass_hz {
            if !(hp.is_finite() && hp > 0.0 && hp < self.cutoff_hz) {
                return Err(Error::InvalidConfig(format!(
                    "high_pass_hz must lie in (0, cutoff_hz), got {}",
                    hp
                )));
            }
        }
        if self.decimation_ratio == 0 {
            return Err(Error::InvalidConfig("decimation_ratio must be positive".into()));
        }
        if self.frame_size < 2 || !self.frame_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "frame_size must be a power of two >= 2, got {}",
                self.frame_size
            )));
        }
        if self.bin_count() > FREQ_FIELD_MAX as usize + 1 {
            return Err(Error::InvalidConfig(format!(
                "frame_size {} yields {} bins, addresses hold at most {}",
                self.frame_size,
                self.bin_count(),
                FREQ_FIELD_MAX + 1
            )));
        }
        if self.hop_size == 0 {
            return Err(Error::InvalidConfig("hop_size must be positive".into()));
        }
        let hop_ms = self.hop_size as f64 * 1000.0 / self.decimated_rate();
        if hop_ms > MAX_DELTA_MS as f64 {
            return Err(Error::InvalidConfig(format!(
                "hop of {:.1} ms exceeds the {} ms address delta field",
                hop_ms, MAX_DELTA_MS
            )));
        }
        if self.num_bands == 0 {
            return Err(Error::InvalidConfig("num_bands must be positive".into()));
        }
        if !(self.min_band_hz > 0.0 && self.min_band_hz < self.max_band_hz) {
            return Err(Error::InvalidConfig(format!(
                "band span {}..{} Hz is empty",
                self.min_band_hz, self.max_band_hz
            )));
        }
        if self.target_zone_size == 0 {
            return Err(Error::InvalidConfig("target_zone_size must be positive".into()));
        }
        if self.offset_tolerance_ms < 0 {
            return Err(Error::InvalidConfig("offset_tolerance_ms must not be negative".into()));
        }
        if !self.z_threshold.is_finite() {
            return Err(Error::InvalidConfig("z_threshold must be finite".into()));
        }
        Ok(())
    }
}
