use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use aether_ids::config::ScanConfig;

/// Extract monster and NPC id mappings from Unity asset files.
///
/// Reads `sharedassets0.assets`, `resources.assets` and `globalgamemanagers.assets` from
/// ASSETS_DIR and writes `monster-ids.json` / `npc-ids.json` into OUTPUT_DIR.
#[derive(Parser, Debug)]
#[command(name = "aether-ids", version)]
#[command(
    after_help = "Example:\n  aether-ids ~/.steam/steam/steamapps/common/Aethermancer/Aethermancer_Data ./data"
)]
struct Args {
    /// List the MonoBehaviour types in a single asset file instead of extracting
    #[arg(long, value_name = "ASSET_FILE", conflicts_with_all = ["assets_dir", "output_dir"])]
    explore: Option<PathBuf>,

    /// Game data directory (or the game install directory containing it)
    #[arg(required_unless_present = "explore")]
    assets_dir: Option<PathBuf>,

    /// Where the JSON files are written
    #[arg(default_value = "data")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ScanConfig::default();

    if let Some(asset_file) = args.explore {
        tracing::info!("Exploring {}...", asset_file.display());
        match aether_ids::explore_file(&asset_file) {
            Ok(exploration) => exploration.print(&config, std::io::stdout().lock())?,
            Err(e) => tracing::error!("Error loading {}: {e:#}", asset_file.display()),
        }
        return Ok(());
    }

    let assets_dir = args.assets_dir.context("ASSETS_DIR is required")?;
    let report = aether_ids::extract(&assets_dir, &args.output_dir, &config)?;
    for mapping in &report.mappings {
        println!("{}", mapping.summary());
    }

    Ok(())
}
