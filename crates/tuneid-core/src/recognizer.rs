//! Recognizer - ingest and search entry points
//!
//! Runs preprocessing, spectrogram, peak extraction and fingerprinting, then
//! either appends the fingerprints to the store (ingest) or matches them
//! against it (search).

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    config::RecognizerConfig,
    decoder::AudioDecoder,
    fingerprint::fingerprint,
    matching::find_matches,
    peaks::PeakExtractor,
    spectrogram::spectrogram,
    store::{FingerprintStore, MatchCounter},
    types::*,
    Result,
};

/// Song id attached to query fingerprints; never stored.
const QUERY_SONG_ID: &str = "query";

/// Recognizer bound to one store and configuration
#[derive(Clone)]
pub struct Recognizer {
    /// Validated configuration
    config: RecognizerConfig,
    /// Fingerprint database
    store: Arc<dyn FingerprintStore>,
    /// Optional match counter, bumped for the top result of each search
    counter: Option<Arc<dyn MatchCounter>>,
}

impl Recognizer {
    /// Create a recognizer. Fails if `config` does not validate.
    pub fn new(config: RecognizerConfig, store: Arc<dyn FingerprintStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            counter: None,
        })
    }

    /// Attach a match counter.
    pub fn with_counter(mut self, counter: Arc<dyn MatchCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    /// Peaks and fingerprints of a clip, without touching the store.
    pub fn analyze(&self, song_id: &str, samples: &[f64], sample_rate: u32) -> Result<(Vec<Peak>, Fingerprints)> {
        analyze(&self.config, song_id, samples, sample_rate)
    }

    /// Fingerprint a clip and append it to the store under `song_id`.
    pub async fn ingest(&self, song_id: &str, samples: &[f64], sample_rate: u32) -> Result<IngestReport> {
        ingest(self.store.as_ref(), &self.config, song_id, samples, sample_rate).await
    }

    /// Fingerprint a clip and rank the stored songs against it.
    pub async fn search(&self, samples: &[f64], sample_rate: u32) -> Result<SearchOutcome> {
        search(
            self.store.as_ref(),
            self.counter.as_deref(),
            &self.config,
            samples,
            sample_rate,
        )
        .await
    }

    /// Decode `bytes` at the configured rate, then ingest.
    pub async fn ingest_encoded(
        &self,
        decoder: &dyn AudioDecoder,
        song_id: &str,
        bytes: &[u8],
    ) -> Result<IngestReport> {
        let samples = decoder.decode_to_mono_pcm(bytes, self.config.sample_rate)?;
        self.ingest(song_id, &samples, self.config.sample_rate).await
    }

    /// Decode `bytes` at the configured rate, then search.
    pub async fn search_encoded(&self, decoder: &dyn AudioDecoder, bytes: &[u8]) -> Result<SearchOutcome> {
        let samples = decoder.decode_to_mono_pcm(bytes, self.config.sample_rate)?;
        self.search(&samples, self.config.sample_rate).await
    }
}

/// Run the signal pipeline up to fingerprinting.
pub fn analyze(
    config: &RecognizerConfig,
    song_id: &str,
    samples: &[f64],
    sample_rate: u32,
) -> Result<(Vec<Peak>, Fingerprints)> {
    let spec = spectrogram(samples, sample_rate, config)?;
    let peaks = PeakExtractor::from_config(config).extract(&spec);
    let fingerprints = fingerprint(&peaks, song_id, config.target_zone_size);

    debug!(
        frames = spec.len(),
        peaks = peaks.len(),
        addresses = fingerprints.len(),
        zones = fingerprints.zone_count,
        "Analyzed clip"
    );

    Ok((peaks, fingerprints))
}

/// Fingerprint a clip and append it to `store` under `song_id`.
///
/// The store sees a single `put`, and only once the whole clip has been
/// fingerprinted. A clip without fingerprints writes nothing.
#[instrument(skip(store, config, samples), fields(num_samples = samples.len()))]
pub async fn ingest(
    store: &dyn FingerprintStore,
    config: &RecognizerConfig,
    song_id: &str,
    samples: &[f64],
    sample_rate: u32,
) -> Result<IngestReport> {
    config.validate()?;
    info!(song_id, sample_rate, "Ingesting clip");

    let (peaks, fingerprints) = analyze(config, song_id, samples, sample_rate)?;
    let report = IngestReport {
        song_id: song_id.to_string(),
        peak_count: peaks.len(),
        address_count: fingerprints.len(),
        zone_count: fingerprints.zone_count,
    };

    if fingerprints.is_empty() {
        warn!(song_id, peaks = peaks.len(), "Clip produced no fingerprints, nothing stored");
        return Ok(report);
    }

    store.put(&fingerprints.map).await?;

    info!(
        song_id,
        addresses = report.address_count,
        zones = report.zone_count,
        "Stored fingerprints"
    );
    Ok(report)
}

/// Fingerprint a clip and rank the songs in `store` against it.
///
/// When `counter` is given and a song ranks first, its match count is
/// incremented and reported.
#[instrument(skip(store, counter, config, samples), fields(num_samples = samples.len()))]
pub async fn search(
    store: &dyn FingerprintStore,
    counter: Option<&dyn MatchCounter>,
    config: &RecognizerConfig,
    samples: &[f64],
    sample_rate: u32,
) -> Result<SearchOutcome> {
    config.validate()?;
    info!(sample_rate, "Searching clip");

    let (peaks, query) = analyze(config, QUERY_SONG_ID, samples, sample_rate)?;
    if query.is_empty() {
        warn!(peaks = peaks.len(), "Query produced no fingerprints");
        return Ok(SearchOutcome::default());
    }

    let report = find_matches(store, &query, config).await?;

    let top_match_count = match (counter, report.ranked.top()) {
        (Some(counter), Some(top)) => Some(counter.increment_and_get(top).await?),
        _ => None,
    };

    match report.scores.first() {
        Some(best) => info!(
            song_id = %best.song_id,
            z = best.z_score,
            confident = best.confident,
            candidates = report.scores.len(),
            "Search complete"
        ),
        None => info!("Search complete, no candidates"),
    }

    Ok(SearchOutcome {
        report,
        top_match_count,
    })
}
