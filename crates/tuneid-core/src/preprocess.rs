//! Anti-alias filtering and decimation.

use std::f64::consts::PI;

use crate::{Error, Result};

/// Low-pass filter the signal at `cutoff_hz`, then average blocks of `ratio` samples.
///
/// Returns the decimated samples and the new sample rate.
pub fn filter_and_decimate(
    samples: &[f64],
    sample_rate: f64,
    cutoff_hz: f64,
    ratio: usize,
) -> Result<(Vec<f64>, f64)> {
    if ratio == 0 {
        return Err(Error::InvalidParameter("ratio must be positive".into()));
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "sample rate must be positive, got {}",
            sample_rate
        )));
    }

    let filtered = low_pass_filter(samples, sample_rate, cutoff_hz);
    let decimated = decimate(&filtered, ratio)?;

    Ok((decimated, sample_rate / ratio as f64))
}

/// First-order IIR low-pass filter.
pub fn low_pass_filter(samples: &[f64], sample_rate: f64, cutoff_hz: f64) -> Vec<f64> {
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let dt = 1.0 / sample_rate;
    let alpha = dt / (rc + dt);

    let mut output = Vec::with_capacity(samples.len());
    let mut prev = 0.0;
    for &x in samples {
        // prev starts at zero, so y[0] = alpha * x[0]
        prev = alpha * x + (1.0 - alpha) * prev;
        output.push(prev);
    }
    output
}

/// First-order IIR high-pass filter.
pub fn high_pass_filter(samples: &[f64], sample_rate: f64, cutoff_hz: f64) -> Vec<f64> {
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    let dt = 1.0 / sample_rate;
    let alpha = rc / (rc + dt);

    let mut output = Vec::with_capacity(samples.len());
    let mut prev_in = 0.0;
    let mut prev_out = 0.0;
    for (i, &x) in samples.iter().enumerate() {
        let y = if i == 0 {
            alpha * x
        } else {
            alpha * (prev_out + x - prev_in)
        };
        output.push(y);
        prev_in = x;
        prev_out = y;
    }
    output
}

/// Average non-overlapping blocks of `ratio` samples. A trailing partial
/// block is averaged over its own length.
pub fn decimate(samples: &[f64], ratio: usize) -> Result<Vec<f64>> {
    if ratio == 0 {
        return Err(Error::InvalidParameter("ratio must be positive".into()));
    }

    Ok(samples
        .chunks(ratio)
        .map(|block| block.iter().sum::<f64>() / block.len() as f64)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_signal_survives_decimation() {
        let samples = vec![0.25; 4000];
        let (decimated, rate) = filter_and_decimate(&samples, 48_000.0, 6000.0, 4).unwrap();

        assert_eq!(decimated.len(), 1000);
        assert_eq!(rate, 12_000.0);

        // The filter starts from rest; skip the start-up transient.
        for &v in &decimated[10..] {
            assert!((v - 0.25).abs() < 1e-9, "got {}", v);
        }
    }

    #[test]
    fn test_trailing_partial_block() {
        let decimated = decimate(&[1.0, 1.0, 1.0, 1.0, 2.0, 4.0], 4).unwrap();
        assert_eq!(decimated, vec![1.0, 3.0]);
    }

    #[test]
    fn test_zero_ratio_rejected() {
        assert!(matches!(
            filter_and_decimate(&[0.0; 8], 48_000.0, 6000.0, 0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(decimate(&[1.0], 0).is_err());
    }

    #[test]
    fn test_bad_sample_rate_rejected() {
        assert!(filter_and_decimate(&[0.0; 8], 0.0, 6000.0, 4).is_err());
    }

    #[test]
    fn test_empty_input() {
        let (decimated, rate) = filter_and_decimate(&[], 44_100.0, 6000.0, 4).unwrap();
        assert!(decimated.is_empty());
        assert_eq!(rate, 11_025.0);
    }

    #[test]
    fn test_low_pass_first_sample() {
        let rc = 1.0 / (2.0 * PI * 6000.0);
        let dt = 1.0 / 48_000.0;
        let alpha = dt / (rc + dt);

        let filtered = low_pass_filter(&[1.0, 1.0], 48_000.0, 6000.0);
        assert!((filtered[0] - alpha).abs() < 1e-15);
        assert!((filtered[1] - (alpha + (1.0 - alpha) * alpha)).abs() < 1e-15);
    }

    #[test]
    fn test_low_pass_attenuates_high_frequency() {
        let rate = 48_000.0;
        let tone = |freq: f64| -> Vec<f64> {
            (0..4800)
                .map(|i| (2.0 * PI * freq * i as f64 / rate).sin())
                .collect()
        };
        let peak = |v: &[f64]| v[1000..].iter().fold(0.0f64, |m, x| m.max(x.abs()));

        let low = low_pass_filter(&tone(200.0), rate, 6000.0);
        let high = low_pass_filter(&tone(20_000.0), rate, 6000.0);
        assert!(peak(&low) > 0.95);
        assert!(peak(&high) < 0.5);
    }

    #[test]
    fn test_high_pass_removes_dc() {
        let filtered = high_pass_filter(&vec![0.8; 48_000], 48_000.0, 50.0);
        assert!(filtered.last().unwrap().abs() < 1e-6);
    }
}
