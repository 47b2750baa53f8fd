// src/main.rs
use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;

use geocoder_lib::{ArtifactSet, Geocoder};

/// Batch size per pipeline pass; also the progress-bar tick unit.
const BATCH_SIZE: usize = 64;
/// Below this many addresses the progress bar stays hidden.
const PROGRESS_THRESHOLD: usize = 100;

#[derive(Parser, Debug)]
#[command(
    name = "geocode",
    about = "Geocode Kuwaiti delivery addresses to coordinates with confidence scores"
)]
struct Args {
    /// Addresses to geocode. May be combined with --input.
    addresses: Vec<String>,

    /// File with one address per line.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Directory holding the trained model artifacts.
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut addresses = args.addresses;
    if let Some(path) = &args.input {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read address file {}", path.display()))?;
        addresses.extend(
            raw.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from),
        );
    }
    if addresses.is_empty() {
        bail!("No addresses given; pass them as arguments or via --input");
    }

    let artifacts = ArtifactSet::load(&args.models_dir)
        .with_context(|| format!("Failed to load artifacts from {}", args.models_dir.display()))?;
    let geocoder = Geocoder::new(artifacts)?;
    info!("Geocoding {} addresses", addresses.len());

    let pb = if addresses.len() >= PROGRESS_THRESHOLD {
        let pb = ProgressBar::new(addresses.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message("Geocoding addresses...");
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut results = Vec::with_capacity(addresses.len());
    for chunk in addresses.chunks(BATCH_SIZE) {
        results.extend(geocoder.geocode_batch(chunk));
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();
    info!(
        "Done: {} results, {} embeddings computed",
        results.len(),
        geocoder.embeddings_computed()
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{}", json);
    Ok(())
}
