//! Pulls id to name tables out of a Unity game's serialized asset files.
//!
//! [`extract`] runs the configured [`HarvestRule`](config::HarvestRule)s over a fixed list of
//! containers and writes one JSON file per rule. [`explore`](explore::explore) lists the
//! script types of a single container, which is how new rules are found.

pub mod config;
pub mod env;
pub mod explore;
pub mod game_files;
pub mod handle;
pub mod harvest;
pub mod resolver;
pub mod source;
pub mod tree;
pub mod unity;

use std::path::Path;

use anyhow::{Context, Result};

pub use env::Environment;
pub use rabex;

use crate::config::ScanConfig;
use crate::explore::Exploration;
use crate::game_files::GameFiles;
use crate::harvest::HarvestReport;

/// Harvests the containers in `assets_dir` and writes the non-empty mappings to `output_dir`.
pub fn extract(assets_dir: &Path, output_dir: &Path, config: &ScanConfig) -> Result<HarvestReport> {
    let env = Environment::with_embedded_tpk(GameFiles::probe(assets_dir));
    let report = harvest::harvest(&env, config);
    report.write(output_dir)?;
    Ok(report)
}

/// Explores a single serialized file, or every serialized file inside an asset bundle.
/// The file's directory is used to resolve external references.
pub fn explore_file(asset_file: &Path) -> Result<Exploration> {
    let name = asset_file
        .file_name()
        .with_context(|| format!("'{}' is not a file path", asset_file.display()))?;
    let dir = match asset_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if game_files::is_bundle_file(asset_file)? {
        let files = GameFiles::packed(dir, asset_file)?;
        let entries = files.serialized_files();
        let env = Environment::with_embedded_tpk(files);

        let mut exploration = Exploration::default();
        for entry in &entries {
            tracing::info!("Exploring bundle entry {entry}...");
            exploration.visit(&env, entry)?;
        }
        return Ok(exploration);
    }

    let env = Environment::with_embedded_tpk(GameFiles::unpacked(dir));
    let name = name
        .to_str()
        .with_context(|| format!("'{}' is not valid UTF-8", asset_file.display()))?;
    explore::explore(&env, name)
}
