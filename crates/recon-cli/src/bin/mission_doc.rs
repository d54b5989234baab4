//! CLI tool for segmented mission documents.
//!
//! Inspect a document (segment counts, cuts, visited targets, derived
//! totals) or round-trip it through the codec to verify it survives
//! export/import intact.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use recon_core::{export_to_json, import_from_str, SegmentStore};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect and round-trip segmented mission documents
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a per-segment summary of a mission document
    Inspect {
        /// Path to the mission document (JSON)
        file: PathBuf,
    },
    /// Import a document and re-export it, verifying the round-trip
    Roundtrip {
        /// Path to the input document
        input: PathBuf,
        /// Path for the re-exported document
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Inspect { file } => inspect(&file),
        Command::Roundtrip { input, output } => roundtrip(&input, &output),
    }
}

fn inspect(file: &PathBuf) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let mission = import_from_str(&text).context("importing mission document")?;

    println!("Mission: {} segment(s), {} target(s), {} airport(s)",
        mission.segments.len(),
        mission.base.targets.len(),
        mission.base.airports.len(),
    );

    let mut store = SegmentStore::new();
    store.restore(mission);

    for segment in &store.mission().segments {
        let cut = match &segment.cut {
            Some(c) => format!("cut at {:.1} ({} drone position(s))", c.distance, c.positions.len()),
            None => "no cut".to_string(),
        };
        println!(
            "  segment {}: {} drone route(s), {} active / {} visited target(s), {}",
            segment.index,
            segment.solution.routes.len(),
            segment.active_targets.len(),
            segment.visited_targets.len(),
            cut,
        );
        if !segment.lost_drones.is_empty() {
            println!("    lost drones: {}", segment.lost_drones.join(", "));
        }
        if !segment.added_drones.is_empty() {
            println!("    added drones: {}", segment.added_drones.join(", "));
        }
    }

    println!("Total distance: {:.1}", store.total_distance());
    for marker in store.cut_markers() {
        println!(
            "  {} at [{:.1}, {:.1}] (segment {}, distance {:.1})",
            marker.label,
            marker.position[0],
            marker.position[1],
            marker.segment_index,
            marker.distance,
        );
    }
    Ok(())
}

fn roundtrip(input: &PathBuf, output: &PathBuf) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let mission = import_from_str(&text).context("importing mission document")?;
    let segment_count = mission.segments.len();

    let exported = export_to_json(&mission);
    let reimported = recon_core::import_from_json(&exported)
        .context("re-importing exported document")?;
    if reimported.segments.len() != segment_count {
        bail!(
            "round-trip changed segment count: {} -> {}",
            segment_count,
            reimported.segments.len()
        );
    }
    for (a, b) in mission.segments.iter().zip(&reimported.segments) {
        if a.solution != b.solution {
            bail!("round-trip changed solution data in segment {}", a.index);
        }
        if a.cut != b.cut {
            bail!("round-trip changed cut data in segment {}", a.index);
        }
    }

    fs::write(output, serde_json::to_string_pretty(&exported)?)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Round-trip OK: {} segment(s) written to {}",
        segment_count,
        output.display()
    );
    Ok(())
}
