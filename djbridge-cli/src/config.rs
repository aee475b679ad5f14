//! Conversion settings

use std::fs;
use std::path::Path;

use anyhow::Context;
use djbridge_core::{engine, rbxml};
use serde::{Deserialize, Serialize};

/// Options shared by every subcommand. Loaded from a JSON file when
/// `--config` is given, then overridden by flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: engine::ImportOptions,
    /// Rekordbox XML dates in UTC instead of local time
    pub use_utc: bool,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn xml_export(&self) -> rbxml::ExportOptions {
        rbxml::ExportOptions {
            use_utc: self.use_utc,
        }
    }

    pub fn xml_import(&self) -> rbxml::ImportOptions {
        rbxml::ImportOptions {
            use_utc: self.use_utc,
        }
    }
}
