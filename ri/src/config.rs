//! rxinspect configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::events::DEFAULT_LOG_FILE;

/// Main rxinspect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Event log read by the CLI and written by the file logger
    #[serde(rename = "log-file")]
    pub log_file: PathBuf,

    /// Instrumentation policies
    pub instrumentation: InstrumentationConfig,

    /// Rendering defaults
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            instrumentation: InstrumentationConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

/// Project-local config file, relative to the working directory
pub const LOCAL_CONFIG_FILE: &str = ".rxinspect.yml";

impl Config {
    /// Config files consulted when no explicit path is given, highest priority first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("rxinspect").join("rxinspect.yml"));
        }
        paths
    }

    /// Load the explicit config, or the first usable file on the search path
    ///
    /// Only an explicit path is allowed to fail; a broken file found by the
    /// search is skipped.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "Config::load: called");
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::load_first(&Self::search_paths())),
        }
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_first(candidates: &[PathBuf]) -> Self {
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => warn!(path = %path.display(), error = %e, "Config::load: skipping unusable config"),
            }
        }
        info!("Config::load: no config file found, using defaults");
        Self::default()
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context(format!("Failed to read config {}", path.display()))?;
        let config = serde_yaml::from_str(&content).context(format!("Failed to parse config {}", path.display()))?;
        info!(path = %path.display(), "Config::load_from_file: loaded");
        Ok(config)
    }
}

/// Instrumentation policies
///
/// Sampling and redaction are independent and can be combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Emit nothing when false
    pub enabled: bool,

    /// Fraction of `next` events to keep (1.0 = all, 0.1 = 10%)
    #[serde(rename = "sample-rate")]
    pub sample_rate: f64,

    /// Replace emitted values and errors with "<redacted>"
    #[serde(rename = "exclude-values")]
    pub exclude_values: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 1.0,
            exclude_values: false,
        }
    }
}

/// Rendering defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Timeline tick width in milliseconds
    #[serde(rename = "tick-width-ms")]
    pub tick_width_ms: u64,

    /// Timeline tick count; later events collapse into the last tick
    #[serde(rename = "max-ticks")]
    pub max_ticks: u64,

    /// Marble resolution in characters per second
    #[serde(rename = "marble-scale")]
    pub marble_scale: u32,

    /// Labels treated as noise in the tree view (case-insensitive)
    #[serde(rename = "generic-labels")]
    pub generic_labels: Vec<String>,

    /// Longest value rendered before truncation
    #[serde(rename = "value-width")]
    pub value_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tick_width_ms: 100,
            max_ticks: 8,
            marble_scale: 50,
            generic_labels: ["", "unknown", "observable", "function"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            value_width: 40,
        }
    }
}

impl RenderConfig {
    /// Is this label in the configured noise set?
    pub fn is_generic(&self, label: &str) -> bool {
        let label = label.trim();
        self.generic_labels.iter().any(|g| g.trim().eq_ignore_ascii_case(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log_file, PathBuf::from("rxinspect.ndjson"));
        assert!(config.instrumentation.enabled);
        assert_eq!(config.instrumentation.sample_rate, 1.0);
        assert_eq!(config.render.tick_width_ms, 100);
        assert_eq!(config.render.max_ticks, 8);
        assert_eq!(config.render.marble_scale, 50);
    }

    #[test]
    fn test_is_generic_ignores_case() {
        let render = RenderConfig::default();
        assert!(render.is_generic("Observable"));
        assert!(render.is_generic("UNKNOWN"));
        assert!(render.is_generic(""));
        assert!(!render.is_generic("map"));
    }

    #[test]
    fn test_load_explicit_file_with_partial_sections() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rxinspect.yml");
        fs::write(
            &path,
            "log-level: debug\nrender:\n  tick-width-ms: 250\n  generic-labels: [wrapper]\ninstrumentation:\n  exclude-values: true\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.render.tick_width_ms, 250);
        assert_eq!(config.render.max_ticks, 8);
        assert!(config.render.is_generic("Wrapper"));
        assert!(!config.render.is_generic("unknown"));
        assert!(config.instrumentation.exclude_values);
        assert!(config.instrumentation.enabled);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let path = PathBuf::from("/no/such/rxinspect.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_log_level() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rxinspect.yml");
        fs::write(&path, "log-level: WARN\n").unwrap();
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("WARN"));
    }

    #[test]
    fn test_search_prefers_first_usable_file() {
        let temp = tempdir().unwrap();
        let broken = temp.path().join("broken.yml");
        let missing = temp.path().join("missing.yml");
        let good = temp.path().join("good.yml");
        fs::write(&broken, "render: [not, a, mapping]\n").unwrap();
        fs::write(&good, "log-file: picked.ndjson\n").unwrap();

        let config = Config::load_first(&[missing, broken, good]);
        assert_eq!(config.log_file, PathBuf::from("picked.ndjson"));
    }

    #[test]
    fn test_search_without_files_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = Config::load_first(&[temp.path().join("nope.yml")]);
        assert_eq!(config.log_file, PathBuf::from(DEFAULT_LOG_FILE));
    }

    #[test]
    fn test_search_paths_start_with_local_file() {
        assert_eq!(Config::search_paths()[0], PathBuf::from(LOCAL_CONFIG_FILE));
    }
}
