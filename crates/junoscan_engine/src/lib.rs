mod inventory;
mod params;
mod runner;

pub use inventory::{load_inventory, parse_inventory, ConfigurationError};
pub use params::{connection_parameters, merge, ConnectionParams};
pub use runner::{extract, field_paths, RunnerError, SessionRunner};

use junoscan_model::{RunSummary, StaticParameters, Variant};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Loads the inventory, then polls every host through `runner`. A bad
/// inventory fails before any device is contacted.
pub async fn scan<W: Write>(
    inventory_path: &Path,
    statics: &StaticParameters,
    runner: &SessionRunner,
    variant: Variant,
    out: &mut W,
) -> Result<RunSummary, ScanError> {
    let inventory = load_inventory(inventory_path)?;
    info!(
        target: "engine::scan",
        "loaded {} hosts from {}",
        inventory.hosts.len(),
        inventory_path.display()
    );
    let summary = runner
        .run(connection_parameters(&inventory, statics), variant, out)
        .await?;
    Ok(summary)
}
