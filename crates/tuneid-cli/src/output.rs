//! Output formatting for CLI

use std::path::Path;

use serde::Serialize;
use tabled::{Table, Tabled};
use tuneid_core::{IngestReport, SearchOutcome};

/// One row of the search result table
#[derive(Tabled)]
struct MatchRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Song")]
    song_id: String,
    #[tabled(rename = "Confident")]
    confident: &'static str,
    #[tabled(rename = "z")]
    z_score: String,
    #[tabled(rename = "Max count")]
    max_count: u32,
    #[tabled(rename = "Coverage")]
    coverage: String,
}

#[derive(Serialize)]
struct CountOutput<'a> {
    song_id: &'a str,
    matches: u64,
}

fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print an ingestion summary
pub fn ingest_report(report: &IngestReport, db: &Path, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(report);
    }

    if report.is_empty() {
        println!("No fingerprints extracted from '{}'; nothing stored.", report.song_id);
        return Ok(());
    }

    println!("Ingested '{}' into {}", report.song_id, db.display());
    println!("  Peaks:     {}", report.peak_count);
    println!("  Addresses: {}", report.address_count);
    println!("  Pairs:     {}", report.zone_count);
    Ok(())
}

/// Print a ranked search result
pub fn search_outcome(outcome: &SearchOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(outcome);
    }

    if outcome.ranked().is_empty() {
        println!("No match.");
        return Ok(());
    }

    let rows: Vec<MatchRow> = outcome
        .report
        .scores
        .iter()
        .take(outcome.ranked().len())
        .enumerate()
        .map(|(i, score)| MatchRow {
            rank: i + 1,
            song_id: score.song_id.clone(),
            confident: if score.confident { "yes" } else { "no" },
            z_score: format!("{:.2}", score.z_score),
            max_count: score.max_count,
            coverage: format!("{:.2}", score.coverage),
        })
        .collect();

    println!("{}", Table::new(rows));

    if let (Some(top), Some(count)) = (outcome.ranked().top(), outcome.top_match_count) {
        println!("\n'{}' has now been matched {} time(s).", top, count);
    }
    Ok(())
}

/// Print a song's match count
pub fn match_count(song_id: &str, matches: u64, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&CountOutput { song_id, matches });
    }
    println!("'{}' matched {} time(s)", song_id, matches);
    Ok(())
}
