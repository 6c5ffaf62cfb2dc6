use junoscan_model::Inventory;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("reading inventory {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing inventory {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

pub fn load_inventory(path: &Path) -> Result<Inventory, ConfigurationError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_inventory(&data, &path.display().to_string())
}

/// Only the two top-level keys and their shapes are checked; host entries
/// are taken as they are.
pub fn parse_inventory(data: &str, origin: &str) -> Result<Inventory, ConfigurationError> {
    serde_yaml::from_str(data).map_err(|source| ConfigurationError::Parse {
        origin: origin.to_string(),
        source,
    })
}
