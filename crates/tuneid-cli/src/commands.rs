//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use tracing::debug;
use tuneid_core::{
    JsonFileCounter, JsonFileStore, MatchCounter, Recognizer, RecognizerConfig, WavDecoder,
};

use crate::output;

/// Settings shared by every command
pub struct Context {
    pub config: RecognizerConfig,
    pub db: PathBuf,
    pub counter: PathBuf,
    pub json: bool,
}

impl Context {
    /// Resolve the configuration file (if any) and validate it.
    pub fn load(config: Option<&Path>, db: PathBuf, counter: PathBuf, json: bool) -> anyhow::Result<Self> {
        let config = match config {
            Some(path) => RecognizerConfig::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RecognizerConfig::default(),
        };
        config.validate()?;

        Ok(Self {
            config,
            db,
            counter,
            json,
        })
    }

    fn recognizer(&self) -> anyhow::Result<Recognizer> {
        let store = Arc::new(JsonFileStore::new(&self.db));
        let counter = Arc::new(JsonFileCounter::new(&self.counter));
        Ok(Recognizer::new(self.config.clone(), store)?.with_counter(counter))
    }
}

/// Ingest a WAV file
pub async fn ingest(ctx: &Context, input: &Path, song_id: Option<String>) -> anyhow::Result<()> {
    let song_id = match song_id {
        Some(id) => id,
        None => input
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive a song id from {}", input.display()))?,
    };
    if song_id.is_empty() {
        bail!("song id must not be empty");
    }

    let bytes = read_input(input).await?;
    let report = ctx
        .recognizer()?
        .ingest_encoded(&WavDecoder::new(), &song_id, &bytes)
        .await
        .with_context(|| format!("failed to ingest {}", input.display()))?;

    output::ingest_report(&report, &ctx.db, ctx.json)
}

/// Search a WAV clip
pub async fn search(ctx: &Context, input: &Path) -> anyhow::Result<()> {
    let bytes = read_input(input).await?;
    let outcome = ctx
        .recognizer()?
        .search_encoded(&WavDecoder::new(), &bytes)
        .await
        .with_context(|| format!("failed to search {}", input.display()))?;

    output::search_outcome(&outcome, ctx.json)
}

/// Show a song's match count
pub async fn count(ctx: &Context, song_id: &str) -> anyhow::Result<()> {
    let counter = JsonFileCounter::new(&ctx.counter);
    let matches = counter
        .get(song_id)
        .await
        .with_context(|| format!("failed to read {}", ctx.counter.display()))?;

    output::match_count(song_id, matches, ctx.json)
}

/// Print the effective configuration
pub fn show_config(ctx: &Context) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    Ok(())
}

async fn read_input(input: &Path) -> anyhow::Result<Vec<u8>> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    debug!(path = %input.display(), bytes = bytes.len(), "Read input");
    Ok(bytes)
}
