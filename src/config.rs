//! CLI configuration — output and logging defaults loaded from ~/.soap-score/config.yaml.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Command-line defaults loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Decimal places used when printing seconds and beats.
    #[serde(default = "CliConfig::default_precision")]
    pub precision: usize,
    /// Number of beats `beats` lists when no `--limit` is given.
    #[serde(default = "CliConfig::default_beat_limit")]
    pub beat_limit: usize,
    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "CliConfig::default_log_filter")]
    pub log_filter: String,
}

impl CliConfig {
    /// Load config from the standard path (~/.soap-score/config.yaml).
    /// Falls back to defaults if the file is missing or malformed.
    pub fn load() -> Self {
        dirs::home_dir()
            .map(|home| home.join(".soap-score").join("config.yaml"))
            .and_then(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load config from a specific file. Returns None if it can't be read or parsed.
    pub fn load_from(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_yaml::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "ignoring malformed config");
                None
            }
        }
    }

    fn default_precision() -> usize {
        3
    }

    fn default_beat_limit() -> usize {
        64
    }

    fn default_log_filter() -> String {
        "warn".to_string()
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            precision: Self::default_precision(),
            beat_limit: Self::default_beat_limit(),
            log_filter: Self::default_log_filter(),
        }
    }
}
