//! Run configuration for the pipeline binaries.

use color_eyre::eyre::{Context as _, Result};
use std::path::{Path, PathBuf};
use traffic::EngineConfig;

/// Fixed, validated configuration loaded from a JSON file. Unknown
/// keys are rejected so a typo cannot silently fall back to a default.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Postgres connection string for the traffic warehouse.
    pub database_url: String,
    pub store: StoreConfig,
    /// Table the attributed match-traffic rows are loaded into.
    pub match_traffic_table: String,
    /// Engine thresholds; absent fields keep the production defaults.
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Where candidate artifacts live on disk.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    pub root: PathBuf,
    /// Folder `detect-candidates` writes to and `piracy-report` reads
    /// from, relative to `root`.
    pub inbox: String,
    /// Folder processed artifacts are moved to, relative to `root`.
    pub processed: String,
}

impl ReportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Cannot read config file {}", path.display()))?;
        let mut deserializer = serde_json::Deserializer::from_str(&raw);
        let config: Self = serde_path_to_error::deserialize(&mut deserializer)
            .wrap_err_with(|| format!("Invalid config file {}", path.display()))?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn log_summary(&self) {
        log::info!("store root: {}", self.store.root.display());
        log::info!("store inbox: {}", self.store.inbox);
        log::info!("store processed: {}", self.store.processed);
        log::info!("match traffic table: {}", self.match_traffic_table);
        log::info!(
            "engine: top_talker {}, rise {} over {} buckets min, window {}..{}",
            self.engine.top_talker_threshold,
            self.engine.rise_threshold,
            self.engine.min_exceed_count,
            self.engine.scan_start_offset_buckets,
            self.engine.scan_end_offset_buckets,
        );
    }
}
