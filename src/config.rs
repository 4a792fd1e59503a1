//! Repair configuration
//!
//! All knobs have defaults tuned for interactive use; a JSON file can
//! override any subset of them (missing fields keep their defaults).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Heuristic limits and switches for one repair run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Max raw-deflate probes after the raw and zlib attempts fail
    pub probe_budget: usize,
    /// Max leading bytes stripped while probing
    pub max_leading_skip: usize,
    /// Number of decreasing trailing cuts tried per leading offset
    pub trailing_steps: usize,
    /// Per-entry inflated size cap
    pub max_inflated_size: usize,
    /// Extracted text shorter than this (non-whitespace chars) becomes a placeholder
    pub min_readable_chars: usize,
    /// Generic tag-stripping keeps alphabetic words at least this long
    pub min_generic_word_len: usize,
    /// Process entries on the rayon pool
    pub parallel: bool,
    /// Compare CRC-32 of scan-path inflations against the local header
    pub verify_checksums: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            probe_budget: 256,
            max_leading_skip: 16,
            trailing_steps: 16,
            max_inflated_size: 256 * 1024 * 1024,
            min_readable_chars: 10,
            min_generic_word_len: 4,
            parallel: true,
            verify_checksums: true,
        }
    }
}

impl RepairConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &str) -> Result<Self, String> {
        info!("Loading repair config from: {}", path);

        let path = Path::new(path);
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()));
        }

        let json = fs::read_to_string(path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            format!("Failed to read file: {e}")
        })?;

        serde_json::from_str::<RepairConfig>(&json).map_err(|e| {
            warn!("Failed to parse config file: {}", e);
            format!("Failed to parse config: {e}")
        })
    }
}
