//! Optional TOML retention defaults.
//!
//! Loaded only from a path given explicitly on the command line; there is no
//! implicit config-directory lookup. Command-line flags always win over file
//! values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Retention defaults for a captures directory.
///
/// ```toml
/// keep_days = 14
/// keep_size = "2G"
/// secure = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Delete sessions older than this many days.
    #[serde(default)]
    pub keep_days: Option<u32>,
    /// Cumulative size budget for surviving sessions (e.g. `"500M"`, `"2G"`).
    /// Validated when the engine runs, not at load time.
    #[serde(default)]
    pub keep_size: Option<String>,
    /// Prefer `shred` over plain removal.
    #[serde(default)]
    pub secure: bool,
}

impl RetentionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read retention config {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("invalid retention config {}", path.display()))?;
        Ok(config)
    }
}
