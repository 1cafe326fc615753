//! Configuration loading for `redline`.
//!
//! `redline.toml` (or an override path from the binary) is parsed into
//! `ConfigFile` with every field optional. Missing files and parse errors
//! both fall back to defaults. `Config::resolve` turns the raw values into
//! typed `Settings`, clamping anything out of range and logging each clamp
//! under the `config` target. Unknown keys are ignored.

use anyhow::Result;
use core_model::SelectionRecovery;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const FILE_NAME: &str = "redline.toml";

const DEBOUNCE_RANGE: (u64, u64) = (50, 5_000);
const MIN_LENGTH_RANGE: (u64, u64) = (1, 1_000);
const REQUEST_TIMEOUT_RANGE: (u64, u64) = (100, 60_000);
const HEALTH_INTERVAL_RANGE: (u64, u64) = (1_000, 600_000);
const PROBE_TIMEOUT_RANGE: (u64, u64) = (100, 10_000);

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    #[serde(default = "AnalysisConfig::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "AnalysisConfig::default_language")]
    pub language: String,
    #[serde(default = "AnalysisConfig::default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "AnalysisConfig::default_min_length")]
    pub min_length: u64,
    #[serde(default = "AnalysisConfig::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            language: Self::default_language(),
            debounce_ms: Self::default_debounce_ms(),
            min_length: Self::default_min_length(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

impl AnalysisConfig {
    fn default_endpoint() -> String {
        "http://localhost:8081".to_string()
    }
    fn default_language() -> String {
        "auto".to_string()
    }
    const fn default_debounce_ms() -> u64 {
        450
    }
    const fn default_min_length() -> u64 {
        3
    }
    const fn default_request_timeout_ms() -> u64 {
        10_000
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    #[serde(default = "HealthConfig::default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "HealthConfig::default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: Self::default_interval_ms(),
            probe_timeout_ms: Self::default_probe_timeout_ms(),
        }
    }
}

impl HealthConfig {
    const fn default_interval_ms() -> u64 {
        30_000
    }
    const fn default_probe_timeout_ms() -> u64 {
        2_000
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct SelectionConfig {
    /// `"none"` or `"first"`; anything else resolves to `"none"`.
    #[serde(default)]
    pub recovery: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// File the settings were read from; `None` when defaults are in use.
    pub path: Option<PathBuf>,
    pub file: ConfigFile,
}

/// Validated values consumed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: String,
    pub language: String,
    pub debounce: Duration,
    pub min_length: usize,
    pub request_timeout: Duration,
    pub health_interval: Duration,
    pub probe_timeout: Duration,
    pub recovery: SelectionRecovery,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().resolve()
    }
}

/// Local `redline.toml` first, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("redline").join(FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config {
            path: Some(path),
            file,
        }),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Typed, range-checked view of the file.
    pub fn resolve(&self) -> Settings {
        let analysis = &self.file.analysis;
        let health = &self.file.health;

        let endpoint = analysis.endpoint.trim();
        let endpoint = if endpoint.is_empty() {
            info!(target: "config", "analysis_endpoint_empty");
            AnalysisConfig::default_endpoint()
        } else {
            endpoint.to_string()
        };
        let language = match analysis.language.trim() {
            "" => AnalysisConfig::default_language(),
            lang => lang.to_string(),
        };

        Settings {
            endpoint,
            language,
            debounce: millis(clamp("analysis.debounce_ms", analysis.debounce_ms, DEBOUNCE_RANGE)),
            min_length: clamp("analysis.min_length", analysis.min_length, MIN_LENGTH_RANGE) as usize,
            request_timeout: millis(clamp(
                "analysis.request_timeout_ms",
                analysis.request_timeout_ms,
                REQUEST_TIMEOUT_RANGE,
            )),
            health_interval: millis(clamp(
                "health.interval_ms",
                health.interval_ms,
                HEALTH_INTERVAL_RANGE,
            )),
            probe_timeout: millis(clamp(
                "health.probe_timeout_ms",
                health.probe_timeout_ms,
                PROBE_TIMEOUT_RANGE,
            )),
            recovery: self.recovery(),
        }
    }

    fn recovery(&self) -> SelectionRecovery {
        let Some(raw) = self.file.selection.recovery.as_deref() else {
            return SelectionRecovery::default();
        };
        raw.parse().unwrap_or_else(|_| {
            info!(target: "config", value = raw, "selection_recovery_unknown");
            SelectionRecovery::default()
        })
    }
}

fn clamp(key: &'static str, raw: u64, (min, max): (u64, u64)) -> u64 {
    let clamped = raw.clamp(min, max);
    if clamped != raw {
        info!(target: "config", key, raw, clamped, min, max, "config_value_clamped");
    }
    clamped
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
