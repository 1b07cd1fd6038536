//! Radix-2 Cooley-Tukey FFT.
//!
//! A recursive decimation-in-time transform over owned buffers. Every call
//! allocates its own even/odd halves, so the transform is a pure function of
//! its input and gives identical output for identical input on every run.

use std::f64::consts::PI;

use num_complex::Complex64;

use crate::{Error, Result};

/// Forward FFT of a real-valued sequence whose length is a power of two.
pub fn fft(input: &[f64]) -> Result<Vec<Complex64>> {
    let buffer: Vec<Complex64> = input.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    fft_complex(buffer)
}

/// Forward FFT of a complex sequence whose length is a power of two.
///
/// Sequences of length 0 or 1 are returned unchanged.
pub fn fft_complex(buffer: Vec<Complex64>) -> Result<Vec<Complex64>> {
    check_len(buffer.len())?;
    Ok(recursive_fft(buffer))
}

/// Inverse FFT with `1/N` scaling, so `inverse_fft(fft(x)) == x`.
pub fn inverse_fft(spectrum: &[Complex64]) -> Result<Vec<Complex64>> {
    check_len(spectrum.len())?;

    // ifft(X) = conj(fft(conj(X))) / N
    let conjugated: Vec<Complex64> = spectrum.iter().map(|c| c.conj()).collect();
    let n = spectrum.len() as f64;

    Ok(recursive_fft(conjugated)
        .into_iter()
        .map(|c| c.conj() / n)
        .collect())
}

fn check_len(n: usize) -> Result<()> {
    if n > 1 && !n.is_power_of_two() {
        return Err(Error::InvalidParameter(format!(
            "FFT length must be a power of two, got {}",
            n
        )));
    }
    Ok(())
}

fn recursive_fft(buffer: Vec<Complex64>) -> Vec<Complex64> {
    let n = buffer.len();
    if n <= 1 {
        return buffer;
    }

    let half = n / 2;
    let mut even = Vec::with_capacity(half);
    let mut odd = Vec::with_capacity(half);
    for pair in buffer.chunks_exact(2) {
        even.push(pair[0]);
        odd.push(pair[1]);
    }

    let even = recursive_fft(even);
    let odd = recursive_fft(odd);

    let mut output = vec![Complex64::new(0.0, 0.0); n];
    for k in 0..half {
        let angle = -2.0 * PI * k as f64 / n as f64;
        let twiddle = Complex64::new(angle.cos(), angle.sin()) * odd[k];
        output[k] = even[k] + twiddle;
        output[k + half] = even[k] - twiddle;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;

    fn test_signal(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                (2.0 * PI * 3.0 * t).sin() + 0.5 * (2.0 * PI * 17.0 * t).cos() + 0.1 * (i % 7) as f64
            })
            .collect()
    }

    #[test]
    fn test_parseval() {
        for &n in &[2usize, 8, 64, 1024] {
            let signal = test_signal(n);
            let spectrum = fft(&signal).unwrap();

            let time_energy: f64 = signal.iter().map(|x| x * x).sum();
            let freq_energy: f64 = spectrum.iter().map(|c| c.norm_sqr()).sum::<f64>() / n as f64;

            assert!(
                (time_energy - freq_energy).abs() < 1e-9 * time_energy.max(1.0),
                "n={} time={} freq={}",
                n,
                time_energy,
                freq_energy
            );
        }
    }

    #[test]
    fn test_zero_input() {
        let spectrum = fft(&[0.0; 256]).unwrap();
        assert!(spectrum.iter().all(|c| c.re == 0.0 && c.im == 0.0));
    }

    #[test]
    fn test_round_trip() {
        let signal = test_signal(512);
        let spectrum = fft(&signal).unwrap();
        let restored = inverse_fft(&spectrum).unwrap();

        for (x, y) in signal.iter().zip(restored.iter()) {
            assert!((x - y.re).abs() < 1e-10);
            assert!(y.im.abs() < 1e-10);
        }
    }

    #[test]
    fn test_matches_rustfft() {
        let signal = test_signal(2048);
        let ours = fft(&signal).unwrap();

        let mut planner = FftPlanner::<f64>::new();
        let reference = planner.plan_fft_forward(signal.len());
        let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        reference.process(&mut buffer);

        for (a, b) in ours.iter().zip(buffer.iter()) {
            assert!((a - b).norm() < 1e-8, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_impulse_is_flat() {
        let mut impulse = vec![0.0; 16];
        impulse[0] = 1.0;
        let spectrum = fft(&impulse).unwrap();
        assert!(spectrum.iter().all(|c| (c.re - 1.0).abs() < 1e-12 && c.im.abs() < 1e-12));
    }

    #[test]
    fn test_trivial_lengths() {
        assert!(fft(&[]).unwrap().is_empty());
        let single = fft(&[4.5]).unwrap();
        assert_eq!(single, vec![Complex64::new(4.5, 0.0)]);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(matches!(fft(&[1.0; 12]), Err(Error::InvalidParameter(_))));
        assert!(inverse_fft(&[Complex64::new(1.0, 0.0); 3]).is_err());
    }

    #[test]
    fn test_deterministic() {
        let signal = test_signal(1024);
        assert_eq!(fft(&signal).unwrap(), fft(&signal).unwrap());
    }
}
