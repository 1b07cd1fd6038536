//! Short-time spectral analysis.
//!
//! Turns a decimated mono signal into a time x frequency matrix of dB
//! magnitudes. Frames are windowed with a Hamming window and transformed
//! independently, so they are computed in parallel and placed by index.

use std::f64::consts::PI;

use rayon::prelude::*;
use tracing::debug;

use crate::config::RecognizerConfig;
use crate::fft::fft;
use crate::preprocess::{filter_and_decimate, high_pass_filter};
use crate::{Error, Result};

/// Magnitude floor applied before the dB conversion.
pub const MAGNITUDE_FLOOR: f64 = 1e-10;

/// Convert a linear magnitude to dB, clamped at [`MAGNITUDE_FLOOR`].
pub fn magnitude_db(magnitude: f64) -> f64 {
    20.0 * magnitude.max(MAGNITUDE_FLOOR).log10()
}

/// dB value of a bin with no energy (`-200` dB).
pub fn floor_db() -> f64 {
    magnitude_db(MAGNITUDE_FLOOR)
}

/// Time x frequency magnitude matrix in dB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrogram {
    frames: Vec<Vec<f64>>,
    times: Vec<f64>,
}

impl Spectrogram {
    /// Build a spectrogram from frames and their start times.
    ///
    /// Every frame must have the same length and there must be one time per frame.
    pub fn new(frames: Vec<Vec<f64>>, times: Vec<f64>) -> Result<Self> {
        if frames.len() != times.len() {
            return Err(Error::InvalidParameter(format!(
                "{} frames but {} frame times",
                frames.len(),
                times.len()
            )));
        }
        if let Some(first) = frames.first() {
            if frames.iter().any(|f| f.len() != first.len()) {
                return Err(Error::InvalidParameter("frames differ in length".into()));
            }
        }
        Ok(Self { frames, times })
    }

    /// Magnitude frames (dB).
    pub fn frames(&self) -> &[Vec<f64>] {
        &self.frames
    }

    /// Start time of each frame in seconds.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when the signal was shorter than one frame.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Bins per frame.
    pub fn bin_count(&self) -> usize {
        self.frames.first().map(|f| f.len()).unwrap_or(0)
    }
}

/// Windowed FFT engine with a fixed frame and hop size.
pub struct SpectrogramEngine {
    frame_size: usize,
    hop_size: usize,
    window: Vec<f64>,
}

impl SpectrogramEngine {
    /// Create an engine. `frame_size` must be a power of two.
    pub fn new(frame_size: usize, hop_size: usize) -> Result<Self> {
        if frame_size < 2 || !frame_size.is_power_of_two() {
            return Err(Error::InvalidParameter(format!(
                "frame size must be a power of two >= 2, got {}",
                frame_size
            )));
        }
        if hop_size == 0 {
            return Err(Error::InvalidParameter("hop size must be positive".into()));
        }

        Ok(Self {
            frame_size,
            hop_size,
            window: hamming_window(frame_size),
        })
    }

    /// Engine for the frame and hop sizes of `config`.
    pub fn from_config(config: &RecognizerConfig) -> Result<Self> {
        Self::new(config.frame_size, config.hop_size)
    }

    /// Number of full frames that fit in `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        len.saturating_sub(self.frame_size) / self.hop_size
    }

    /// Compute the dB spectrogram of already decimated samples.
    pub fn compute(&self, samples: &[f64], sample_rate: f64) -> Result<Spectrogram> {
        let num_frames = self.frame_count(samples.len());
        let half = self.frame_size / 2;

        let frames = (0..num_frames)
            .into_par_iter()
            .map(|frame_idx| -> Result<Vec<f64>> {
                let start = frame_idx * self.hop_size;
                let windowed: Vec<f64> = samples[start..start + self.frame_size]
                    .iter()
                    .zip(self.window.iter())
                    .map(|(&s, &w)| s * w)
                    .collect();

                let spectrum = fft(&windowed)?;

                Ok(spectrum[..half]
                    .iter()
                    .map(|c| magnitude_db(c.norm()))
                    .collect())
            })
            .collect::<Result<Vec<_>>>()?;

        let times = (0..num_frames)
            .map(|i| (i * self.hop_size) as f64 / sample_rate)
            .collect();

        Ok(Spectrogram { frames, times })
    }
}

/// Filter, decimate and analyse raw samples with the parameters of `config`.
pub fn spectrogram(samples: &[f64], sample_rate: u32, config: &RecognizerConfig) -> Result<Spectrogram> {
    let rate = sample_rate as f64;

    let high_passed;
    let input = match config.high_pass_hz {
        Some(cutoff) => {
            high_passed = high_pass_filter(samples, rate, cutoff);
            &high_passed[..]
        }
        None => samples,
    };

    let (decimated, decimated_rate) =
        filter_and_decimate(input, rate, config.cutoff_hz, config.decimation_ratio)
            .map_err(|e| Error::Downsample(e.to_string()))?;

    let engine = SpectrogramEngine::from_config(config)?;
    let spectrogram = engine.compute(&decimated, decimated_rate)?;

    debug!(
        "Computed spectrogram: {} frames x {} bins at {} Hz",
        spectrogram.len(),
        spectrogram.bin_count(),
        decimated_rate
    );

    Ok(spectrogram)
}

/// Hamming window of length `n`.
pub fn hamming_window(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_frame_count_and_times() {
        let engine = SpectrogramEngine::new(2048, 64).unwrap();
        let samples = vec![0.0; 2048 + 64 * 10 + 30];
        let spec = engine.compute(&samples, 12_000.0).unwrap();

        assert_eq!(spec.len(), 10);
        assert_eq!(spec.bin_count(), 1024);
        assert!(spec.frames().iter().all(|f| f.len() == 1024));
        assert_eq!(spec.times()[0], 0.0);
        assert!((spec.times()[3] - 192.0 / 12_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_signal_has_no_frames() {
        let engine = SpectrogramEngine::new(2048, 64).unwrap();
        let spec = engine.compute(&vec![0.1; 2000], 12_000.0).unwrap();
        assert!(spec.is_empty());
        assert_eq!(spec.bin_count(), 0);
    }

    #[test]
    fn test_silence_hits_floor() {
        let engine = SpectrogramEngine::new(256, 64).unwrap();
        let spec = engine.compute(&vec![0.0; 1024], 12_000.0).unwrap();
        assert!((floor_db() + 200.0).abs() < 1e-9);
        assert!(spec.frames().iter().flatten().all(|&m| m == floor_db()));
    }

    #[test]
    fn test_tone_peaks_at_expected_bin() {
        let rate = 12_000.0;
        let engine = SpectrogramEngine::new(2048, 512).unwrap();
        // Bin 100 is exactly 100 * 12000 / 2048 Hz.
        let freq = 100.0 * rate / 2048.0;
        let spec = engine.compute(&sine(freq, rate, 8192), rate).unwrap();

        for frame in spec.frames() {
            let (best, _) = frame
                .iter()
                .enumerate()
                .fold((0, f64::MIN), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
            assert_eq!(best, 100);
        }
    }

    #[test]
    fn test_hamming_window_shape() {
        let window = hamming_window(2048);
        assert!((window[0] - 0.08).abs() < 1e-12);
        assert!((window[2047] - 0.08).abs() < 1e-12);
        assert!(window.iter().all(|&w| (0.08 - 1e-12..=1.0).contains(&w)));
    }

    #[test]
    fn test_invalid_engine_parameters() {
        assert!(SpectrogramEngine::new(1000, 64).is_err());
        assert!(SpectrogramEngine::new(2048, 0).is_err());
    }

    #[test]
    fn test_pipeline_maps_decimation_errors() {
        let config = RecognizerConfig {
            decimation_ratio: 0,
            ..Default::default()
        };
        let err = spectrogram(&[0.0; 16], 48_000, &config).unwrap_err();
        assert!(matches!(err, Error::Downsample(_)));
    }

    #[test]
    fn test_pipeline_frame_times_use_decimated_rate() {
        let config = RecognizerConfig::default();
        let samples = sine(440.0, 48_000.0, 48_000);
        let spec = spectrogram(&samples, 48_000, &config).unwrap();

        // 12000 decimated samples -> (12000 - 2048) / 64 frames
        assert_eq!(spec.len(), 155);
        assert!((spec.times()[1] - 64.0 / 12_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_spectrogram_rejects_ragged_frames() {
        assert!(Spectrogram::new(vec![vec![0.0; 4], vec![0.0; 3]], vec![0.0, 0.1]).is_err());
        assert!(Spectrogram::new(vec![vec![0.0; 4]], vec![]).is_err());
    }
}
