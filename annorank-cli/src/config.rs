//! Config file loading and creation for the annorank CLI.
//!
//! Config lives at ~/.config/annorank/config.toml.
//! All fields are optional. CLI args override config values, config values
//! override the built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::bail;

#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnnorankConfig {
    pub regularization: Option<f64>,
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
    pub k_factor: Option<f64>,
    pub initial_rating: Option<f64>,
    pub seed: Option<u64>,
    pub combined: Option<bool>,
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# annorank configuration
# All values here can be overridden by CLI flags.

# Additive regularization for the spectral ranking fit.
# 0.0 fails on sparse or disconnected comparison graphs.
# regularization = 0.01

# Iteration cap and L1 convergence tolerance for the spectral ranking fit
# max_iterations = 100
# tolerance = 1e-8

# Elo step size and starting rating (annorank elo)
# k_factor = 30.0
# initial_rating = 1000.0

# Fixed seed for the pre-fit shuffle and Elo replay order.
# Leave unset for a fresh random order each run.
# seed = 42

# Also rank a \"Combined\" annotator pooling everyone's records
# combined = true
";

/// Returns the default config path: ~/.config/annorank/config.toml
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| bail("HOME environment variable not set"));
    PathBuf::from(home).join(".config").join("annorank").join("config.toml")
}

fn parse_config(content: &str) -> Result<AnnorankConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Load config from a file path. Returns default (all None) if file doesn't exist.
pub fn load_config(path: &Path) -> AnnorankConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content)
            .unwrap_or_else(|e| bail(format!("Failed to parse config at {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AnnorankConfig::default(),
        Err(e) => bail(format!("Failed to read config at {}: {e}", path.display())),
    }
}

/// Create the default config file. Errors if it already exists.
pub fn create_default_config() -> PathBuf {
    let path = config_path();

    if path.exists() {
        bail(format!("Config file already exists at {}", path.display()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| bail(format!("Failed to create directory {}: {e}", parent.display())));
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .unwrap_or_else(|e| bail(format!("Failed to write config to {}: {e}", path.display())));

    path
}
