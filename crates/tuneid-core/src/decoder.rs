//! Audio decoding into mono PCM

use crate::Result;

/// Turns raw audio bytes into mono samples in `[-1, 1]`.
pub trait AudioDecoder: Send + Sync {
    /// Decode `bytes` into mono samples at `target_sample_rate`.
    fn decode_to_mono_pcm(&self, bytes: &[u8], target_sample_rate: u32) -> Result<Vec<f64>>;
}

#[cfg(feature = "wav")]
pub use wav::WavDecoder;

#[cfg(feature = "wav")]
mod wav {
    use std::io::Cursor;

    use hound::{SampleFormat, WavReader};
    use tracing::debug;

    use super::AudioDecoder;
    use crate::{Error, Result};

    /// RIFF/WAVE decoder. Channels are averaged; the file's sample rate must
    /// equal the requested one.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct WavDecoder;

    impl WavDecoder {
        /// Create a decoder.
        pub fn new() -> Self {
            Self
        }
    }

    impl AudioDecoder for WavDecoder {
        fn decode_to_mono_pcm(&self, bytes: &[u8], target_sample_rate: u32) -> Result<Vec<f64>> {
            let mut reader = WavReader::new(Cursor::new(bytes)).map_err(|e| Error::Decode(e.to_string()))?;
            let spec = reader.spec();

            if spec.sample_rate != target_sample_rate {
                return Err(Error::Decode(format!(
                    "sample rate {} Hz does not match the expected {} Hz",
                    spec.sample_rate, target_sample_rate
                )));
            }
            if spec.channels == 0 {
                return Err(Error::Decode("WAV header declares zero channels".into()));
            }

            let interleaved: Vec<f64> = match spec.sample_format {
                SampleFormat::Float => reader
                    .samples::<f32>()
                    .map(|s| s.map(f64::from))
                    .collect::<std::result::Result<Vec<f64>, hound::Error>>(),
                SampleFormat::Int => {
                    let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f64;
                    reader
                        .samples::<i32>()
                        .map(|s| s.map(|v| v as f64 / scale))
                        .collect::<std::result::Result<Vec<f64>, hound::Error>>()
                }
            }
            .map_err(|e| Error::Decode(e.to_string()))?;

            let channels = spec.channels as usize;
            let mono: Vec<f64> = interleaved
                .chunks_exact(channels)
                .map(|frame| (frame.iter().sum::<f64>() / channels as f64).clamp(-1.0, 1.0))
                .collect();

            debug!(
                "Decoded {} frames ({} ch, {}-bit {:?}) at {} Hz",
                mono.len(),
                spec.channels,
                spec.bits_per_sample,
                spec.sample_format,
                spec.sample_rate
            );

            Ok(mono)
        }
    }

}
