// src/config/mod.rs
//! Scanner configuration: TOML file + environment overrides.
//!
//! Lookup order:
//! 1) $SCANNER_CONFIG_PATH
//! 2) config/scanner.toml
//! 3) built-in defaults
//!
//! Environment overrides applied afterwards: SCAN_INTERVAL_MINUTES,
//! OLLAMA_HOST, OLLAMA_PORT, OLLAMA_MODEL, TREND_DB_PATH.

pub mod oracle;
pub mod sources;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analyze::weights::ScoreWeights;

pub use oracle::OracleConfig;
pub use sources::{FeedConfig, FeedGroupConfig, RedditConfig, SourcesConfig, TikTokConfig};

pub const ENV_CONFIG_PATH: &str = "SCANNER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/scanner.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_minutes: u64,
    /// Grace period before the eager first cycle (lets the database come up).
    pub startup_delay_secs: u64,
    /// Cycle reports kept in memory.
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            startup_delay_secs: 5,
            history_capacity: 50,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdmissionConfig {
    pub window_hours: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { window_hours: 6 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringSection {
    pub batch_limit: usize,
    pub top_n: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    pub required_fields: Vec<String>,
    /// Replaces the built-in persona prompt when set.
    pub persona_path: Option<PathBuf>,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            batch_limit: 20,
            top_n: crate::analyze::scoring::DEFAULT_TOP_N,
            temperature: 0.3,
            max_tokens: 1000,
            required_fields: crate::analyze::judgment::default_required_fields(),
            persona_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub adapter_secs: u64,
    pub oracle_secs: u64,
    pub store_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            adapter_secs: 60,
            oracle_secs: 120,
            store_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn adapter(&self) -> Duration {
        Duration::from_secs(self.adapter_secs)
    }
    pub fn oracle(&self) -> Duration {
        Duration::from_secs(self.oracle_secs)
    }
    pub fn store(&self) -> Duration {
        Duration::from_secs(self.store_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WeightsConfig {
    /// Persisted overall score.
    pub overall: ScoreWeights,
    /// End-of-cycle report ranking.
    pub report: ScoreWeights,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/trends.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus exporter address, e.g. "0.0.0.0:9100". Off when unset.
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScannerConfig {
    pub scheduler: SchedulerConfig,
    pub admission: AdmissionConfig,
    pub scoring: ScoringSection,
    pub timeouts: TimeoutConfig,
    pub weights: WeightsConfig,
    pub oracle: OracleConfig,
    pub store: StoreConfig,
    pub sources: SourcesConfig,
    pub metrics: MetricsConfig,
}

impl ScannerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ScannerConfig = toml::from_str(s).context("parsing scanner config")?;
        Ok(cfg)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.interval_minutes == 0 {
            bail!("scheduler.interval_minutes must be > 0");
        }
        if self.admission.window_hours == 0 {
            bail!("admission.window_hours must be > 0");
        }
        if self.scoring.batch_limit == 0 || self.scoring.top_n == 0 {
            bail!("scoring.batch_limit and scoring.top_n must be > 0");
        }
        if !(0.0..=2.0).contains(&self.scoring.temperature) {
            bail!("scoring.temperature must be within 0.0..=2.0");
        }
        if self.timeouts.adapter_secs == 0
            || self.timeouts.oracle_secs == 0
            || self.timeouts.store_secs == 0
        {
            bail!("timeouts must be > 0");
        }
        self.weights.overall.validate("weights.overall")?;
        self.weights.report.validate("weights.report")?;
        Ok(())
    }

    /// Persona prompt: file contents when `persona_path` is set, else built-in.
    pub fn persona(&self) -> Result<String> {
        match &self.scoring.persona_path {
            Some(p) => fs::read_to_string(p)
                .with_context(|| format!("reading persona prompt from {}", p.display())),
            None => Ok(crate::analyze::prompts::DEFAULT_PERSONA.to_string()),
        }
    }

    fn apply_env(&mut self) {
        if let Some(m) = std::env::var("SCAN_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.scheduler.interval_minutes = m;
        }
        if let Ok(p) = std::env::var("TREND_DB_PATH") {
            if !p.trim().is_empty() {
                self.store.database_path = PathBuf::from(p.trim());
            }
        }
        self.oracle.apply_env();
    }
}

/// Load from an explicit path, apply env overrides, validate.
pub fn load_config_from(path: &Path) -> Result<ScannerConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading scanner config from {}", path.display()))?;
    let mut cfg = ScannerConfig::from_toml_str(&content)?;
    cfg.apply_env();
    cfg.validate()?;
    Ok(cfg)
}

/// Load using env var + fallbacks (see module docs).
pub fn load_config_default() -> Result<ScannerConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
    if default_p.exists() {
        return load_config_from(&default_p);
    }
    let mut cfg = ScannerConfig::default();
    cfg.apply_env();
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ScannerConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.scheduler.interval(), Duration::from_secs(30 * 60));
        assert_eq!(cfg.admission.window_hours, 6);
        assert_eq!(cfg.scoring.batch_limit, 20);
        assert_eq!(cfg.weights.overall, ScoreWeights::REFERENCE);
        assert_eq!(cfg.weights.report, ScoreWeights::REFERENCE);
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let cfg = ScannerConfig::from_toml_str(
            r#"
[scheduler]
interval_minutes = 5

[weights.report]
relevance = 0.2
monetization = 0.2
urgency = 0.2
competition = 0.2
content_gap = 0.2
"#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.scheduler.interval_minutes, 5);
        assert_eq!(cfg.scheduler.startup_delay_secs, 5);
        assert_eq!(cfg.weights.overall, ScoreWeights::REFERENCE);
        assert!((cfg.weights.report.relevance - 0.2).abs() < 1e-12);
    }

    #[test]
    fn bad_weights_fail_validation() {
        let cfg = ScannerConfig::from_toml_str(
            r#"
[weights.overall]
relevance = 0.5
monetization = 0.5
urgency = 0.5
competition = 0.0
content_gap = 0.0
"#,
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_interval_fails_validation() {
        let cfg = ScannerConfig::from_toml_str("[scheduler]\ninterval_minutes = 0").unwrap();
        assert!(cfg.validate().is_err());
    }
}
