//! Numeric thresholds shared by every pipeline stage.
//!
//! The on-disk form is a JSON object with upper-case keys. Loading is a
//! merge-and-save: missing keys take their defaults and are written back,
//! keys this crate does not know about are carried along untouched.

use anyhow::{Context, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    /// Fallback sampling frequency when neither the data nor the caller provide one.
    pub fs: f64,
    pub filter: FilterConfig,
    pub clinical_thresholds: ClinicalThresholds,
    pub peak_detection: PeakDetectionConfig,
    pub min_simulation_duration_sec: f64,
    /// Visible window for CTG playback.
    pub simulation_window_sec: f64,
    /// Visible window for ECG playback, zoomed in relative to CTG.
    pub ecg_window_sec: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fs: 500.0,
            filter: FilterConfig::default(),
            clinical_thresholds: ClinicalThresholds::default(),
            peak_detection: PeakDetectionConfig::default(),
            min_simulation_duration_sec: 300.0,
            simulation_window_sec: 30.0,
            ecg_window_sec: 5.0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FilterConfig {
    pub lowcut: f64,
    pub highcut: f64,
    pub order: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lowcut: 1.0,
            highcut: 50.0,
            order: 5,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ClinicalThresholds {
    pub accel_bpm: f64,
    pub accel_sec: f64,
    pub decel_bpm: f64,
    pub decel_sec: f64,
    pub baseline_low: f64,
    pub baseline_high: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ClinicalThresholds {
    fn default() -> Self {
        Self {
            accel_bpm: 15.0,
            accel_sec: 15.0,
            decel_bpm: 15.0,
            decel_sec: 15.0,
            baseline_low: 110.0,
            baseline_high: 160.0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PeakDetectionConfig {
    /// Refractory spacing between beats; 300 ms caps the rate near 200 bpm.
    pub min_dist_ms: f64,
    pub integration_window_ms: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PeakDetectionConfig {
    fn default() -> Self {
        Self {
            min_dist_ms: 300.0,
            integration_window_ms: 150.0,
            extra: Map::new(),
        }
    }
}

impl Config {
    /// Read `path`, filling in defaults. A missing file is created; a file
    /// missing some keys is rewritten with them added. An unparsable file is
    /// left alone and the defaults are returned.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let cfg = Config::default();
                cfg.save(path)?;
                info!("wrote default configuration to {}", path.display());
                return Ok(cfg);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let raw: Value = match serde_json::from_str(&text) {
            Ok(raw) => raw,
            Err(err) => {
                error!("failed to parse {}, using defaults: {err}", path.display());
                return Ok(Config::default());
            }
        };
        let cfg: Config = match serde_json::from_value(raw.clone()) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!("invalid configuration in {}, using defaults: {err}", path.display());
                return Ok(Config::default());
            }
        };
        let defaults = serde_json::to_value(Config::default())?;
        if has_missing_keys(&defaults, &raw) {
            cfg.save(path)?;
            info!("added missing configuration keys to {}", path.display());
        }
        Ok(cfg)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing configuration")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn has_missing_keys(defaults: &Value, current: &Value) -> bool {
    match (defaults, current) {
        (Value::Object(def), Value::Object(cur)) => def.iter().any(|(key, value)| {
            cur.get(key)
                .map_or(true, |existing| has_missing_keys(value, existing))
        }),
        _ => false,
    }
}

impl PeakDetectionConfig {
    pub fn min_dist_s(&self) -> f64 {
        self.min_dist_ms / 1000.0
    }

    pub fn integration_window_s(&self) -> f64 {
        self.integration_window_ms / 1000.0
    }
}
