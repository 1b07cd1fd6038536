//! tuneid Core - Acoustic Fingerprinting Library
//!
//! This crate identifies songs from short audio clips:
//! - **Preprocessing**: low-pass filtering and block-average decimation
//! - **Spectrogram**: Hamming-windowed radix-2 FFT frames in dB
//! - **Peaks**: per-band local maxima over a time x band neighbourhood
//! - **Fingerprints**: 32-bit anchor/target/delta addresses
//! - **Matching**: offset histograms scored by z-score
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │  PCM samples │───▶│  Preprocess  │───▶│ Spectrogram  │───▶│    Peaks     │
//! └──────────────┘    └──────────────┘    └──────────────┘    └──────┬───────┘
//!                                                                    │
//!                                                                    ▼
//!                     ┌──────────────┐                        ┌──────────────┐
//!                     │ Fingerprint  │◀───── ingest/search ───│ Fingerprints │
//!                     │    Store     │                        └──────┬───────┘
//!                     └──────┬───────┘                               │ search
//!                            │ couples                               ▼
//!                            └──────────────────────────────▶┌──────────────┐
//!                                                            │   Matching   │
//!                                                            └──────┬───────┘
//!                                                                   ▼
//!                                                            ranked song ids
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tuneid_core::{MemoryStore, Recognizer, RecognizerConfig};
//!
//! #[tokio::main]
//! async fn main() -> tuneid_core::Result<()> {
//!     let recognizer = Recognizer::new(RecognizerConfig::default(), Arc::new(MemoryStore::new()))?;
//!
//!     let song: Vec<f64> = vec![0.0; 48_000 * 5];
//!     recognizer.ingest("song-1", &song, 48_000).await?;
//!
//!     let outcome = recognizer.search(&song[..48_000 * 3], 48_000).await?;
//!     println!("Best match: {:?}", outcome.ranked().top());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod fft;
pub mod fingerprint;
pub mod matching;
pub mod peaks;
pub mod preprocess;
pub mod recognizer;
pub mod spectrogram;
pub mod store;
pub mod types;

pub use config::RecognizerConfig;
pub use decoder::AudioDecoder;
#[cfg(feature = "wav")]
pub use decoder::WavDecoder;
pub use error::{Error, Result};
pub use fingerprint::{address, fingerprint};
pub use matching::{find_matches, score_matches};
pub use peaks::{extract_peaks, PeakExtractor};
pub use recognizer::{ingest, search, Recognizer};
pub use spectrogram::{spectrogram, Spectrogram, SpectrogramEngine};
pub use store::{FingerprintStore, JsonFileCounter, JsonFileStore, MatchCounter, MemoryCounter, MemoryStore};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
